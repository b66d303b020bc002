use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;
use tracing::info;

use super::parser::TIMESTAMP_FORMAT;
use crate::workflows::admittance::{MarkLog, Registration, Timeslot};

pub const REGISTRATION_HEADERS: [&str; 4] = ["name", "email", "timestamp", "timeslots"];
pub const MARK_HEADERS: [&str; 3] = ["name", "email", "marked reason"];
pub const WAITING_LIST_SECTION: &str = "waiting_list";
pub const MARKED_SECTION: &str = "marked";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write section: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Write access for run results. Writing a section replaces any previous content.
pub trait TabularSink {
    fn write_section(
        &mut self,
        name: &str,
        headers: &[&str],
        rows: Vec<Vec<String>>,
    ) -> Result<(), ExportError>;
}

/// Writes each section to `<root>/<name>.csv`, with `:` removed from the file name.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    root: PathBuf,
}

impl CsvDirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn section_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.csv", name.replace(':', "")))
    }
}

impl TabularSink for CsvDirectorySink {
    fn write_section(
        &mut self,
        name: &str,
        headers: &[&str],
        rows: Vec<Vec<String>>,
    ) -> Result<(), ExportError> {
        fs::create_dir_all(&self.root)?;
        let path = self.section_path(name);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        info!(section = name, rows = rows.len(), path = %path.display(), "section written");
        Ok(())
    }
}

fn registration_row(registration: &Registration) -> Vec<String> {
    vec![
        registration.person().name().to_string(),
        registration.person().email().to_string(),
        registration.timestamp().format(TIMESTAMP_FORMAT).to_string(),
        registration.timeslots().join(","),
    ]
}

/// One section per configured timeslot. Empty rosters still replace the previous file
/// with a header-only section. Returns the number of sections written.
pub fn export_rosters<S>(
    sink: &mut S,
    timeslots: &IndexMap<String, Timeslot>,
) -> Result<usize, ExportError>
where
    S: TabularSink + ?Sized,
{
    for timeslot in timeslots.values() {
        let rows = timeslot.admitted().iter().map(registration_row).collect();
        sink.write_section(timeslot.name(), &REGISTRATION_HEADERS, rows)?;
    }
    Ok(timeslots.len())
}

/// Always writes the section, so an empty waiting list clears an earlier one.
pub fn export_waiting_list<S>(
    sink: &mut S,
    waiting_list: &[Registration],
) -> Result<(), ExportError>
where
    S: TabularSink + ?Sized,
{
    let rows = waiting_list.iter().map(registration_row).collect();
    sink.write_section(WAITING_LIST_SECTION, &REGISTRATION_HEADERS, rows)
}

/// One row per marked person, reasons rendered `[STATE] text` and newline-joined.
pub fn export_marks<S>(sink: &mut S, marks: &MarkLog) -> Result<(), ExportError>
where
    S: TabularSink + ?Sized,
{
    let rows = marks
        .iter()
        .map(|(person, entries)| {
            vec![
                person.name().to_string(),
                person.email().to_string(),
                entries.iter().join("\n"),
            ]
        })
        .collect();
    sink.write_section(MARKED_SECTION, &MARK_HEADERS, rows)
}
