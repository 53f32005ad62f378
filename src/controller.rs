use std::io::BufRead;
use std::path::PathBuf;

use tracing::trace;

use crate::domain::{FixError, Message};

/// Maps console input lines to messages for the presenter.
pub struct Controller;

impl Controller {
    pub fn new() -> Self {
        Controller
    }

    /// Read the next line from `input` and map it to a message. `None` means
    /// end of input (the caller should quit); unrecognized lines ask for help.
    pub fn next_message(&self, input: &mut impl BufRead) -> Result<Option<Message>, FixError> {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let message = Self::parse(line.trim()).unwrap_or(Message::Help);
        trace!("Mapped {:?} => {:?}", line.trim(), message);
        Ok(Some(message))
    }

    pub fn parse(line: &str) -> Option<Message> {
        let mut parts = line.splitn(3, char::is_whitespace);
        let command = parts.next()?;
        let arg = parts.next();
        let rest = parts.next();

        let message = match command {
            "" => Message::Refresh,
            "n" | "next" => Message::NextPage,
            "p" | "prev" => Message::PrevPage,
            "g" => Message::GoToPage(arg?.parse().ok()?),
            "i" => Message::GoToRecord(arg?.parse().ok()?),
            "k" => Message::SetPageSize(arg?.parse().ok()?),
            "e" => {
                let index = arg?.parse().ok()?;
                Message::EditText(index, rest?.to_string())
            }
            "d" => Message::DeleteRecord(arg?.parse().ok()?),
            "r" => Message::RotateImage(arg?.parse().ok()?),
            "sort" => {
                let column = arg?.to_string();
                let descending = rest == Some("desc");
                Message::SortBy(column, !descending)
            }
            "cols" => Message::SelectColumns,
            "o" | "open" => Message::OpenFile(expand_path(arg)),
            "w" | "write" => Message::SaveFile(expand_path(arg)),
            "l" | "list" => Message::Refresh,
            "h" | "help" | "?" => Message::Help,
            "q" | "quit" => Message::Quit,
            _ => return None,
        };
        Some(message)
    }
}

// Paths typed at the prompt get tilde/variable expansion, like the CLI
// argument does.
fn expand_path(arg: Option<&str>) -> Option<PathBuf> {
    let raw = arg?;
    match shellexpand::full(raw) {
        Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
        Err(_) => Some(PathBuf::from(raw)),
    }
}
