use std::path::{Component, Path, PathBuf};

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::codec;
use crate::domain::{ColumnConfig, FixError};

/// One column of the label table, fully materialized as text.
pub struct Column {
    pub name: String,
    pub values: Vec<String>,
}

/// Positions of the bound path/text columns inside `RecordStore::columns`.
/// Resolved once at bind time, not on every read.
#[derive(Debug, Clone, Copy)]
struct Binding {
    path: usize,
    text: usize,
}

/// Owns the record table and the column configuration. Rows are identified by
/// their position; deleting a row renumbers everything behind it.
pub struct RecordStore {
    columns: Vec<Column>,
    config: ColumnConfig,
    binding: Option<Binding>,
    source: Option<PathBuf>,
}

impl RecordStore {
    pub fn new(config: ColumnConfig) -> Self {
        RecordStore {
            columns: Vec::new(),
            config,
            binding: None,
            source: None,
        }
    }

    /// Replace the table with the contents of `frame`, binding `config`
    /// against the new schema. On any error the previous table, binding and
    /// source stay untouched.
    pub fn load(
        &mut self,
        frame: &DataFrame,
        source: &Path,
        config: &ColumnConfig,
    ) -> Result<usize, FixError> {
        let columns = Self::materialize(frame)?;
        let binding = Self::bind(&columns, config)?;

        self.columns = columns;
        self.config = config.clone();
        self.binding = Some(binding);
        self.source = Some(source.to_path_buf());

        let rows = self.row_count();
        info!(
            "Record store holds {} rows, path column {:?}, text column {:?}",
            rows, self.config.path_column, self.config.text_column
        );
        Ok(rows)
    }

    // Columns are cast to strings in parallel; empty cells come back as "".
    fn materialize(frame: &DataFrame) -> Result<Vec<Column>, FixError> {
        let columns: Result<Vec<Column>, PolarsError> = frame
            .get_column_names()
            .par_iter()
            .map(|name| Self::materialize_column(frame, name.as_str()))
            .collect();
        let columns = columns?;
        for c in columns.iter() {
            trace!("Column {:?} with {} values", c.name, c.values.len());
        }
        Ok(columns)
    }

    fn materialize_column(frame: &DataFrame, name: &str) -> Result<Column, PolarsError> {
        let col = frame.column(name)?.cast(&DataType::String)?;
        let series = col.str()?;
        let mut values = Vec::with_capacity(series.len());
        for value in series.into_iter() {
            values.push(value.map(str::to_string).unwrap_or_default());
        }
        Ok(Column {
            name: name.to_string(),
            values,
        })
    }

    fn bind(columns: &[Column], config: &ColumnConfig) -> Result<Binding, FixError> {
        let find = |wanted: &str| columns.iter().position(|c| c.name == wanted);
        let path = find(&config.path_column).ok_or_else(|| {
            FixError::Validation(format!(
                "path column {:?} not found in table",
                config.path_column
            ))
        })?;
        let text = find(&config.text_column).ok_or_else(|| {
            FixError::Validation(format!(
                "text column {:?} not found in table",
                config.text_column
            ))
        })?;
        Ok(Binding { path, text })
    }

    pub fn set_path_column(&mut self, name: &str) -> Result<(), FixError> {
        let config = ColumnConfig {
            path_column: name.to_string(),
            text_column: self.config.text_column.clone(),
        };
        self.rebind(config)
    }

    pub fn set_text_column(&mut self, name: &str) -> Result<(), FixError> {
        let config = ColumnConfig {
            path_column: self.config.path_column.clone(),
            text_column: name.to_string(),
        };
        self.rebind(config)
    }

    fn rebind(&mut self, config: ColumnConfig) -> Result<(), FixError> {
        if self.is_loaded() {
            self.binding = Some(Self::bind(&self.columns, &config)?);
        }
        debug!(
            "Column binding changed to path {:?}, text {:?}",
            config.path_column, config.text_column
        );
        self.config = config;
        Ok(())
    }

    /// Rewrite every path value to a normalized path relative to `base`.
    /// Applying the same base twice is a no-op: absolute paths pass through.
    pub fn normalize_paths(&mut self, base: &Path) -> Result<(), FixError> {
        let binding = self.require_binding()?;
        let column = &mut self.columns[binding.path];
        for value in column.values.iter_mut() {
            let raw = Path::new(value.as_str());
            let joined = if raw.is_absolute() {
                raw.to_path_buf()
            } else {
                base.join(raw)
            };
            *value = normalize(&joined).to_string_lossy().into_owned();
        }
        debug!(
            "Normalized {} paths against {}",
            column.values.len(),
            base.display()
        );
        Ok(())
    }

    pub fn get_path(&self, index: usize) -> Result<PathBuf, FixError> {
        self.check_index(index)?;
        let binding = self.require_binding()?;
        Ok(PathBuf::from(&self.columns[binding.path].values[index]))
    }

    pub fn get_text(&self, index: usize) -> Result<&str, FixError> {
        self.check_index(index)?;
        let binding = self.require_binding()?;
        Ok(&self.columns[binding.text].values[index])
    }

    pub fn change_text(&mut self, index: usize, text: String) -> Result<(), FixError> {
        self.check_index(index)?;
        let binding = self.require_binding()?;
        self.columns[binding.text].values[index] = text;
        Ok(())
    }

    /// Remove the row at `index`; every row behind it shifts down by one.
    pub fn delete(&mut self, index: usize) -> Result<(), FixError> {
        self.check_index(index)?;
        for column in self.columns.iter_mut() {
            column.values.remove(index);
        }
        debug!("Deleted row {}, {} rows remain", index, self.row_count());
        Ok(())
    }

    /// Stable reorder of all rows by the string values of `column`.
    pub fn sort_by(&mut self, column: &str, ascending: bool) -> Result<(), FixError> {
        let keys = self
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| FixError::Validation(format!("column {column:?} not found in table")))?;

        let key_values = &self.columns[keys].values;
        let mut order: Vec<usize> = (0..self.row_count()).collect();
        if ascending {
            order.sort_by(|&a, &b| key_values[a].cmp(&key_values[b]));
        } else {
            order.sort_by(|&a, &b| key_values[b].cmp(&key_values[a]));
        }

        for col in self.columns.iter_mut() {
            col.values = order.iter().map(|&i| col.values[i].clone()).collect();
        }
        debug!("Sorted {} rows by {:?}", self.row_count(), column);
        Ok(())
    }

    /// Indices of records whose path does not exist on disk. Informational:
    /// a missing image fails the affected record, not the table.
    pub fn missing_paths(&self) -> Result<Vec<usize>, FixError> {
        let binding = self.require_binding()?;
        let missing = self.columns[binding.path]
            .values
            .iter()
            .enumerate()
            .filter(|(_, value)| !Path::new(value.as_str()).exists())
            .map(|(index, _)| index)
            .collect();
        Ok(missing)
    }

    /// Serialize the current in-memory table to `path`. Does not touch the
    /// in-memory state and does not require `path` to equal the load path.
    pub fn save(&self, path: &Path) -> Result<(), FixError> {
        self.require_binding()?;
        let mut frame = self.to_frame()?;
        codec::save(&mut frame, path)
    }

    fn to_frame(&self) -> Result<DataFrame, FixError> {
        let columns: Vec<_> = self
            .columns
            .iter()
            .map(|c| Series::new(c.name.as_str().into(), c.values.as_slice()).into_column())
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn config(&self) -> &ColumnConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.binding.is_some()
    }

    fn check_index(&self, index: usize) -> Result<(), FixError> {
        let len = self.row_count();
        if index >= len {
            return Err(FixError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    fn require_binding(&self) -> Result<Binding, FixError> {
        self.binding
            .ok_or_else(|| FixError::Validation("no label file loaded".to_string()))
    }
}

// Lexical cleanup: drops `.` segments and resolves `..` without touching the
// filesystem, so missing files still get a well-formed path.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
