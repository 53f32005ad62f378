use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use polars::prelude::*;
use tracing::{debug, info};

use crate::domain::FixError;

/// Field delimiter of a label file. The mapping from extension to delimiter
/// is closed; content is never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
}

impl Delimiter {
    pub fn from_extension(extension: &str) -> Result<Self, FixError> {
        match extension.to_lowercase().as_str() {
            "csv" => Ok(Delimiter::Comma),
            "tsv" => Ok(Delimiter::Tab),
            other => Err(FixError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, FixError> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .ok_or_else(|| FixError::UnsupportedFormat(String::new()))?;
        Delimiter::from_extension(extension)
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

/// Read the label table at `path`. All columns are loaded as strings so the
/// table can be written back without schema-induced reformatting.
pub fn load(path: &Path) -> Result<DataFrame, FixError> {
    let delimiter = Delimiter::from_path(path)?;

    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FixError::NotFound(path.to_path_buf()),
        _ => FixError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(FixError::Validation(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    debug!(
        "Loading {} ({} bytes) with delimiter {:?}",
        path.display(),
        metadata.len(),
        delimiter
    );

    let frame = LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_separator(delimiter.as_byte())
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    info!(
        "Loaded {} rows, {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );
    Ok(frame)
}

/// Write `frame` to `path` with the delimiter inferred from the extension.
/// Column order and the header row are preserved.
pub fn save(frame: &mut DataFrame, path: &Path) -> Result<(), FixError> {
    let delimiter = Delimiter::from_path(path)?;
    let mut file = fs::File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(delimiter.as_byte())
        .finish(frame)?;
    info!("Wrote {} rows to {}", frame.height(), path.display());
    Ok(())
}

/// Suggested save target next to `original`: `<basename>_<YYYYMMDD_HHMM>.<ext>`.
/// The caller may override the result before anything is written.
pub fn default_save_name(original: &Path) -> Result<PathBuf, FixError> {
    save_name_at(original, Local::now())
}

fn save_name_at(original: &Path, at: DateTime<Local>) -> Result<PathBuf, FixError> {
    let extension = original
        .extension()
        .and_then(OsStr::to_str)
        .ok_or_else(|| FixError::UnsupportedFormat(String::new()))?;
    Delimiter::from_extension(extension)?;
    let stem = original
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(|| {
            FixError::InvalidArgument(format!("no file name in {}", original.display()))
        })?;
    let name = format!("{stem}_{}.{extension}", at.format("%Y%m%d_%H%M"));
    Ok(original.with_file_name(name))
}
