//! Spreadsheet-shaped input and output for an opening.
//!
//! Sheets are read through [`TabularSource`] and bound to domain fields by header name or
//! by a stored column binding. Results go back out through [`TabularSink`].

mod binding;
mod export;
mod normalizer;
mod parser;
mod source;

use indexmap::IndexSet;
use tracing::info;

use crate::config::SheetsConfig;
use crate::workflows::admittance::{Person, ReferenceSets, Registration, TimeslotSpec};

pub use binding::{ColumnBinding, PERSON_FIELDS, REGISTRATION_FIELDS, TIMESLOT_FIELDS};
pub use export::{
    export_marks, export_rosters, export_waiting_list, CsvDirectorySink, ExportError,
    TabularSink, MARKED_SECTION, MARK_HEADERS, REGISTRATION_HEADERS, WAITING_LIST_SECTION,
};
pub use parser::{
    parse_people, parse_registrations, parse_requested_timeslots, parse_timeslots,
    parse_timestamp, TIMESTAMP_FORMAT,
};
pub use source::{CsvDirectorySource, Sheet, TabularSource};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read sheet data: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("unreadable column binding {path}: {source}")]
    Binding {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("required sheet '{0}' is missing")]
    MissingSheet(String),
    #[error("sheet '{sheet}' has no column for {fields}")]
    UnboundFields { sheet: String, fields: String },
    #[error("sheet '{sheet}' line {line}: unreadable timestamp '{value}'")]
    InvalidTimestamp {
        sheet: String,
        line: usize,
        value: String,
    },
    #[error("sheet '{sheet}' line {line}: capacity '{value}' is not a non-negative integer")]
    InvalidCapacity {
        sheet: String,
        line: usize,
        value: String,
    },
}

/// Everything needed to configure and run one opening.
#[derive(Debug, Clone, Default)]
pub struct OpeningWorkbook {
    pub registrations: Vec<Registration>,
    pub timeslots: Vec<TimeslotSpec>,
    pub references: ReferenceSets,
}

impl OpeningWorkbook {
    /// Reads every sheet named in `sheets`. The ban and down-priority sheets may be
    /// absent; the others are required.
    pub fn load<S>(source: &S, sheets: &SheetsConfig) -> Result<Self, ImportError>
    where
        S: TabularSource + ?Sized,
    {
        let registrations = {
            let sheet = source.require_sheet(&sheets.registrations)?;
            let binding = bind(source, &sheet, "registration", &REGISTRATION_FIELDS)?;
            parse_registrations(&sheet, &binding)?
        };

        let timeslots = {
            let sheet = source.require_sheet(&sheets.timeslots)?;
            let binding = bind(source, &sheet, "timeslot", &TIMESLOT_FIELDS)?;
            parse_timeslots(&sheet, &binding)?
        };

        let references = ReferenceSets {
            banned: load_people(source, &sheets.banned, false)?,
            confirmed_duplicates: load_people(source, &sheets.confirmed_duplicates, true)?,
            confirmed_nonworking_emails: load_people(source, &sheets.nonworking_emails, true)?,
            down_prioritized: load_people(source, &sheets.down_prioritized, false)?,
        };

        info!(
            registrations = registrations.len(),
            timeslots = timeslots.len(),
            banned = references.banned.len(),
            confirmed_duplicates = references.confirmed_duplicates.len(),
            confirmed_nonworking_emails = references.confirmed_nonworking_emails.len(),
            down_prioritized = references.down_prioritized.len(),
            "workbook loaded"
        );

        Ok(Self {
            registrations,
            timeslots,
            references,
        })
    }
}

fn load_people<S>(source: &S, name: &str, required: bool) -> Result<IndexSet<Person>, ImportError>
where
    S: TabularSource + ?Sized,
{
    let sheet = match source.sheet(name)? {
        Some(sheet) => sheet,
        None if required => return Err(ImportError::MissingSheet(name.to_string())),
        None => return Ok(IndexSet::new()),
    };

    let binding = bind(source, &sheet, "person", &PERSON_FIELDS)?;
    Ok(parse_people(&sheet, &binding))
}

/// Prefers a stored binding that still covers exactly `fields`, else binds by header.
fn bind<S>(
    source: &S,
    sheet: &Sheet,
    kind: &str,
    fields: &[&str],
) -> Result<ColumnBinding, ImportError>
where
    S: TabularSource + ?Sized,
{
    if let Some(stored) = source.stored_binding(kind)? {
        if stored.verify(fields) && stored.fits(sheet.headers.len()) {
            return Ok(stored);
        }
        info!(sheet = %sheet.name, kind, "stored column binding ignored, binding by header");
    }

    let binding = ColumnBinding::from_headers(&sheet.headers, fields);
    let missing = binding.missing(fields);
    if missing.is_empty() {
        Ok(binding)
    } else {
        Err(ImportError::UnboundFields {
            sheet: sheet.name.clone(),
            fields: missing.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(format!("{name}.csv")), contents).expect("write sheet");
    }

    fn minimal_workbook(dir: &TempDir) {
        write(
            dir,
            "Responses",
            "Timestamp,Name,Email,Timeslots\n19/08/2024 09:01:00,Ola Nordmann,ola@example.com,\"10:00, 12:00\"\n",
        );
        write(dir, "Timeslot Details", "Name,Capacity,Unlimited\n10:00,2,false\n12:00,,true\n");
        write(dir, "confirmed duplicates", "Name,Email\n");
        write(dir, "non-working emails", "Name,Email\nPer Olsen,per@example.con\n");
    }

    #[test]
    fn loads_required_and_optional_sheets() {
        let dir = TempDir::new().expect("tempdir");
        minimal_workbook(&dir);
        let source = CsvDirectorySource::new(dir.path());

        let workbook = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect("loads");

        assert_eq!(workbook.registrations.len(), 1);
        assert_eq!(workbook.registrations[0].timeslots(), ["10:00", "12:00"]);
        assert_eq!(workbook.timeslots[1].capacity, None);
        assert!(workbook.references.banned.is_empty());
        assert!(workbook
            .references
            .confirmed_nonworking_emails
            .contains(&Person::new("per olsen", "per@example.con")));
    }

    #[test]
    fn missing_required_reference_sheet_is_fatal() {
        let dir = TempDir::new().expect("tempdir");
        minimal_workbook(&dir);
        fs::remove_file(dir.path().join("confirmed duplicates.csv")).expect("remove");
        let source = CsvDirectorySource::new(dir.path());

        let err = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect_err("missing");

        assert!(matches!(err, ImportError::MissingSheet(ref name) if name == "confirmed duplicates"));
    }

    #[test]
    fn stored_binding_overrides_headers() {
        let dir = TempDir::new().expect("tempdir");
        minimal_workbook(&dir);
        write(
            &dir,
            "Responses",
            "When,Who,Address,Slots\n19/08/2024 09:01:00,Kari Hansen,kari@example.com,12:00\n",
        );
        fs::write(
            dir.path().join("registration_bindings.json"),
            r#"{"timestamp":0,"name":1,"email":2,"timeslots":3}"#,
        )
        .expect("write binding");
        let source = CsvDirectorySource::new(dir.path());

        let workbook = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect("loads");

        assert_eq!(workbook.registrations[0].person().email(), "kari@example.com");
    }

    #[test]
    fn unbound_columns_are_reported() {
        let dir = TempDir::new().expect("tempdir");
        minimal_workbook(&dir);
        write(&dir, "Responses", "Timestamp,Name,Mail,Timeslots\n");
        let source = CsvDirectorySource::new(dir.path());

        let err = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect_err("unbound");

        assert_eq!(err.to_string(), "sheet 'Responses' has no column for email");
    }
}
