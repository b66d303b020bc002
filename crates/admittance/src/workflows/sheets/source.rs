use std::path::{Path, PathBuf};

use tracing::debug;

use super::binding::ColumnBinding;
use super::ImportError;

/// One named table: a header row followed by data rows of possibly uneven length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }
}

/// Read access to the sheets of one opening.
pub trait TabularSource {
    /// Returns `None` when no sheet with that name exists.
    fn sheet(&self, name: &str) -> Result<Option<Sheet>, ImportError>;

    /// A previously saved column binding for the given record kind, if any.
    fn stored_binding(&self, _kind: &str) -> Result<Option<ColumnBinding>, ImportError> {
        Ok(None)
    }

    fn require_sheet(&self, name: &str) -> Result<Sheet, ImportError> {
        self.sheet(name)?
            .ok_or_else(|| ImportError::MissingSheet(name.to_string()))
    }
}

/// Reads `<root>/<name>.csv` files and `<root>/<kind>_bindings.json` bindings.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    root: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }
}

impl TabularSource for CsvDirectorySource {
    fn sheet(&self, name: &str) -> Result<Option<Sheet>, ImportError> {
        let path = self.sheet_path(name);
        if !path.is_file() {
            debug!(sheet = name, path = %path.display(), "sheet not found");
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&path)?;

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!(sheet = name, rows = rows.len(), "sheet read");
        Ok(Some(Sheet::new(name, headers, rows)))
    }

    fn stored_binding(&self, kind: &str) -> Result<Option<ColumnBinding>, ImportError> {
        let path = self.root.join(format!("{kind}_bindings.json"));
        if !path.is_file() {
            return Ok(None);
        }
        ColumnBinding::from_json_path(&path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_trimmed_uneven_rows() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("banned.csv"),
            "Name , Email\n Jon Doe ,jon@x.com\nLone Name\n",
        )
        .expect("write sheet");
        let source = CsvDirectorySource::new(dir.path());

        let sheet = source.sheet("banned").expect("readable").expect("present");

        assert_eq!(sheet.headers, vec!["Name", "Email"]);
        assert_eq!(sheet.rows[0], vec!["Jon Doe", "jon@x.com"]);
        assert_eq!(sheet.rows[1], vec!["Lone Name"]);
    }

    #[test]
    fn absent_sheet_is_none_and_required_sheet_errors() {
        let dir = TempDir::new().expect("tempdir");
        let source = CsvDirectorySource::new(dir.path());

        assert!(source.sheet("banned").expect("readable").is_none());
        assert!(matches!(
            source.require_sheet("Responses"),
            Err(ImportError::MissingSheet(_))
        ));
    }

    #[test]
    fn malformed_binding_file_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("person_bindings.json"), "{not json").expect("write");
        let source = CsvDirectorySource::new(dir.path());

        let err = source.stored_binding("person").expect_err("malformed");

        assert!(matches!(err, ImportError::Binding { .. }));
    }
}
