use std::io;
use std::path::PathBuf;

use polars::error::PolarsError;
use thiserror::Error;

/// Crate wide error type. The presenter is the only place where these are
/// turned into user visible notifications; every other layer passes them up.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("could not parse label file: {0}")]
    Parse(#[from] PolarsError),
    #[error("{0}")]
    Validation(String),
    #[error("unsupported file extension {0:?}, expected csv or tsv")]
    UnsupportedFormat(String),
    #[error("record {index} out of range, table has {len} rows")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Which columns of the label table hold the image path and the
/// transcription text. Checked against the loaded schema at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    pub path_column: String,
    pub text_column: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            path_column: "path".to_string(),
            text_column: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixConfig {
    pub columns: ColumnConfig,
    pub page_size: usize,
}

impl Default for FixConfig {
    fn default() -> Self {
        FixConfig {
            columns: ColumnConfig::default(),
            page_size: 4,
        }
    }
}

/// User intents, produced by the controller and consumed by the presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    OpenFile(Option<PathBuf>),
    SaveFile(Option<PathBuf>),
    NextPage,
    PrevPage,
    GoToPage(usize),
    GoToRecord(usize),
    SetPageSize(usize),
    EditText(usize, String),
    DeleteRecord(usize),
    RotateImage(usize),
    SortBy(String, bool),
    SelectColumns,
    Refresh,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
Commands:
  n / p           next / previous page
  g <page>        go to page (1-based)
  i <record>      go to the page containing record (0-based)
  e <record> <new text>
                  replace the transcription of a record
  d <record>      delete a record (asks for confirmation)
  r <record>      rotate the record's image by 90 degrees and save it
  k <n>           set records per page
  sort <column> [desc]
                  sort records by a column
  cols            re-select the path/text columns
  o [file]        open a label file (.csv or .tsv)
  w [file]        write the table (suggests a timestamped name)
  l               redraw the current page
  h               show this help
  q               quit";
