//! CSV export of claims in the fixed column order.

use std::path::{Path, PathBuf};

use atlas_core::{columns, Feature};
use tracing::info;

/// A rendered export, ready to be written as a download file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDocument {
    filename: String,
    text: String,
    rows: usize,
}

impl CsvDocument {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Data rows, excluding the header.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Write the document. A directory target receives it under the default filename.
    pub fn save(&self, target: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let target = target.as_ref();
        let path = if target.is_dir() { target.join(&self.filename) } else { target.to_path_buf() };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &self.text)?;
        info!(path = %path.display(), rows = self.rows, "csv exported");
        Ok(path)
    }
}

/// Every value is quoted; embedded quotes are doubled.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Header line, then one line per feature in the given order, joined by `\n`.
/// An empty input yields the header alone.
pub fn export_csv<'a>(features: impl IntoIterator<Item = &'a Feature>, filename: &str) -> CsvDocument {
    let mut text = columns::export_header();
    let mut rows = 0;
    for f in features {
        let line = columns::EXPORT_COLUMNS.iter().map(|c| quote(&f.display(c.key))).collect::<Vec<_>>().join(",");
        text.push('\n');
        text.push_str(&line);
        rows += 1;
    }
    CsvDocument { filename: filename.to_string(), text, rows }
}
