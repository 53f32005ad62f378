use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod codec;
mod controller;
mod domain;
mod images;
mod pager;
mod presenter;
mod store;
mod ui;

use controller::Controller;
use domain::{ColumnConfig, FixConfig, FixError, Message};
use presenter::{Presenter, Status};
use ui::{ConsolePrompter, ConsoleRenderer};

/// Review and correct OCR transcription labels from the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Label file to open (.csv or .tsv)
    file: Option<String>,

    /// Records shown per page
    #[arg(long, default_value_t = 4)]
    page_size: usize,

    /// Column holding the image paths
    #[arg(long, default_value = "path")]
    path_column: String,

    /// Column holding the transcriptions
    #[arg(long, default_value = "text")]
    text_column: String,

    /// Log debug information to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "ocrfix=debug" } else { "ocrfix=warn" })
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(ErrorLayer::default())
        .init();

    match run(cli) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: Cli) -> Result<(), FixError> {
    let config = FixConfig {
        columns: ColumnConfig {
            path_column: cli.path_column,
            text_column: cli.text_column,
        },
        page_size: cli.page_size,
    };

    let mut presenter = Presenter::new(config, ConsoleRenderer, ConsolePrompter)?;
    info!("Started ocrfix");

    if let Some(file) = cli.file {
        let expanded = shellexpand::full(&file)
            .map_err(|e| FixError::InvalidArgument(e.to_string()))?;
        presenter.update(Message::OpenFile(Some(PathBuf::from(expanded.as_ref()))));
    }

    let controller = Controller::new();
    let stdin = io::stdin();
    while presenter.status() != Status::Quitting {
        print!("> ");
        io::Write::flush(&mut io::stdout())?;
        match controller.next_message(&mut stdin.lock())? {
            Some(message) => presenter.update(message),
            None => break,
        }
    }

    info!(
        "Exiting on page {}/{} with {} records",
        presenter.pager().current_page(),
        presenter.pager().total_pages(),
        presenter.store().row_count()
    );
    Ok(())
}
