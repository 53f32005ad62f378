use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::trace;

use crate::domain::FixError;
use crate::images;

/// One record of the current page, handed to the rendering layer. The image
/// is decoded by the presenter; a per-record failure (usually a missing file)
/// travels along instead of aborting the page.
pub struct RowView {
    pub index: usize,
    pub path: PathBuf,
    pub image: Result<DynamicImage, FixError>,
    pub text: String,
}

/// Rendering capability consumed by the presenter. The presenter only ever
/// supplies data; it never formats pixels or builds widgets itself.
pub trait Renderer {
    fn display_rows(&mut self, rows: &[RowView]);
}

/// Dialog capability consumed by the presenter. Every prompt can be declined,
/// which aborts the operation cleanly.
pub trait Prompter {
    fn prompt_for_file(&mut self) -> Option<PathBuf>;
    fn prompt_for_save_path(&mut self, suggested: &Path) -> Option<PathBuf>;
    fn prompt_column_selection(&mut self, column_names: &[String]) -> Option<(String, String)>;
    fn confirm(&mut self, question: &str) -> bool;
    fn notify(&mut self, message: &str);
}

// Character cells are roughly twice as tall as wide, so the preview box is
// short and wide.
const PREVIEW_WIDTH: u32 = 48;
const PREVIEW_HEIGHT: u32 = 12;
const LUMA_RAMP: &[u8] = b" .:-=+*#%@";

/// Line oriented renderer: one block per record, with a coarse luminance
/// preview of the decoded image.
#[derive(Default)]
pub struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn display_rows(&mut self, rows: &[RowView]) {
        if rows.is_empty() {
            println!("(no records)");
            return;
        }
        for row in rows {
            match &row.image {
                Ok(image) => {
                    println!(
                        "#{}  {}  ({}x{})",
                        row.index,
                        row.path.display(),
                        image.width(),
                        image.height()
                    );
                    for line in preview_lines(image) {
                        println!("     {line}");
                    }
                }
                Err(err) => {
                    println!("#{}  {}  [{}]", row.index, row.path.display(), err);
                }
            }
            println!("     text: {:?}", row.text);
        }
    }
}

fn preview_lines(image: &DynamicImage) -> Vec<String> {
    let fitted = images::fit(image, (PREVIEW_WIDTH, PREVIEW_HEIGHT));
    let gray = fitted.to_luma8();
    let mut lines = Vec::with_capacity(gray.height() as usize);
    for y in 0..gray.height() {
        let mut line = String::with_capacity(gray.width() as usize);
        for x in 0..gray.width() {
            let luma = gray.get_pixel(x, y).0[0] as usize;
            let step = luma * (LUMA_RAMP.len() - 1) / 255;
            line.push(LUMA_RAMP[step] as char);
        }
        lines.push(line);
    }
    lines
}

/// Stdin/stdout prompter backing the console front end.
#[derive(Default)]
pub struct ConsolePrompter;

impl ConsolePrompter {
    fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line).ok()?;
        if read == 0 {
            return None; // EOF
        }
        Some(line.trim().to_string())
    }
}

impl Prompter for ConsolePrompter {
    fn prompt_for_file(&mut self) -> Option<PathBuf> {
        let line = self.read_line("label file: ")?;
        if line.is_empty() {
            return None;
        }
        Some(PathBuf::from(line))
    }

    fn prompt_for_save_path(&mut self, suggested: &Path) -> Option<PathBuf> {
        let line = self.read_line(&format!("save to [{}]: ", suggested.display()))?;
        match line.as_str() {
            "" => Some(suggested.to_path_buf()),
            "-" => None,
            other => Some(PathBuf::from(other)),
        }
    }

    fn prompt_column_selection(&mut self, column_names: &[String]) -> Option<(String, String)> {
        println!("columns: {}", column_names.join(", "));
        let line = self.read_line("path and text column [keep current]: ")?;
        if line.is_empty() {
            return None;
        }
        let mut parts = line.split_whitespace();
        let path = parts.next()?.to_string();
        let text = parts.next()?.to_string();
        trace!("Selected columns {:?}/{:?}", path, text);
        Some((path, text))
    }

    fn confirm(&mut self, question: &str) -> bool {
        match self.read_line(&format!("{question} [y/N]: ")) {
            Some(answer) => matches!(answer.as_str(), "y" | "Y" | "yes"),
            None => false,
        }
    }

    fn notify(&mut self, message: &str) {
        println!("* {message}");
    }
}
