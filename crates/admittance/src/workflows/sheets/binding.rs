use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::normalizer::header_key;
use super::ImportError;

pub const REGISTRATION_FIELDS: [&str; 4] = ["name", "email", "timestamp", "timeslots"];
pub const PERSON_FIELDS: [&str; 2] = ["name", "email"];
pub const TIMESLOT_FIELDS: [&str; 3] = ["name", "capacity", "unlimited"];

/// Maps record fields to column indices. Stored bindings are flat `{"field": index}` objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ColumnBinding {
    columns: BTreeMap<String, usize>,
}

impl ColumnBinding {
    /// Binds each field to the first header whose snake-cased text equals it.
    /// Fields without a matching header are left unbound.
    pub fn from_headers(headers: &[String], fields: &[&str]) -> Self {
        let keys: Vec<String> = headers.iter().map(|header| header_key(header)).collect();
        let columns = fields
            .iter()
            .filter_map(|field| {
                keys.iter()
                    .position(|key| key == field)
                    .map(|index| (field.to_string(), index))
            })
            .collect();
        Self { columns }
    }

    pub fn from_json_path(path: &Path) -> Result<Self, ImportError> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|source| ImportError::Binding {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn bind(mut self, field: impl Into<String>, index: usize) -> Self {
        self.columns.insert(field.into(), index);
        self
    }

    pub fn index(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// True when the bound fields are exactly `fields`.
    pub fn verify(&self, fields: &[&str]) -> bool {
        self.columns.len() == fields.len()
            && fields.iter().all(|field| self.columns.contains_key(*field))
    }

    /// True when every bound index points inside a row of `width` columns.
    pub fn fits(&self, width: usize) -> bool {
        self.columns.values().all(|index| *index < width)
    }

    pub fn missing(&self, fields: &[&str]) -> Vec<String> {
        fields
            .iter()
            .filter(|field| !self.columns.contains_key(**field))
            .map(|field| field.to_string())
            .collect()
    }

    /// The bound cell of `row`; unbound fields and short rows read as empty.
    pub fn value<'r>(&self, row: &'r [String], field: &str) -> &'r str {
        self.index(field)
            .and_then(|index| row.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }
}
