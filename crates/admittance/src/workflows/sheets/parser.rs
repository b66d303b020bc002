use chrono::{DateTime, NaiveDateTime};
use indexmap::IndexSet;
use tracing::debug;

use super::binding::ColumnBinding;
use super::normalizer::{clean_cell, compact};
use super::source::Sheet;
use super::ImportError;
use crate::workflows::admittance::{Person, Registration, TimeslotSpec};

/// Timestamp layout used by form exports and by exported rosters.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

const FALLBACK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header line is line 1, so the first data row is line 2.
fn line_number(index: usize) -> usize {
    index + 2
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

fn person_from_row(binding: &ColumnBinding, row: &[String]) -> Person {
    Person::new(
        clean_cell(binding.value(row, "name")),
        clean_cell(binding.value(row, "email")),
    )
}

pub fn parse_registrations(
    sheet: &Sheet,
    binding: &ColumnBinding,
) -> Result<Vec<Registration>, ImportError> {
    let mut registrations = Vec::with_capacity(sheet.rows.len());

    for (index, row) in sheet.rows.iter().enumerate() {
        if is_blank(row) {
            continue;
        }

        let raw_timestamp = binding.value(row, "timestamp");
        let timestamp =
            parse_timestamp(raw_timestamp).ok_or_else(|| ImportError::InvalidTimestamp {
                sheet: sheet.name.clone(),
                line: line_number(index),
                value: raw_timestamp.to_string(),
            })?;

        registrations.push(Registration::new(
            person_from_row(binding, row),
            timestamp,
            parse_requested_timeslots(binding.value(row, "timeslots")),
        ));
    }

    debug!(sheet = %sheet.name, registrations = registrations.len(), "registrations parsed");
    Ok(registrations)
}

/// Reference lists: one person per row, duplicates collapsed, blank rows skipped.
pub fn parse_people(sheet: &Sheet, binding: &ColumnBinding) -> IndexSet<Person> {
    sheet
        .rows
        .iter()
        .filter(|row| !is_blank(row))
        .map(|row| person_from_row(binding, row))
        .collect()
}

pub fn parse_timeslots(
    sheet: &Sheet,
    binding: &ColumnBinding,
) -> Result<Vec<TimeslotSpec>, ImportError> {
    let mut timeslots = Vec::with_capacity(sheet.rows.len());

    for (index, row) in sheet.rows.iter().enumerate() {
        if is_blank(row) {
            continue;
        }

        let name = compact(binding.value(row, "name"));
        if is_truthy(binding.value(row, "unlimited")) {
            timeslots.push(TimeslotSpec::unlimited(name));
            continue;
        }

        let raw_capacity = binding.value(row, "capacity").trim();
        let capacity =
            raw_capacity
                .parse::<usize>()
                .map_err(|_| ImportError::InvalidCapacity {
                    sheet: sheet.name.clone(),
                    line: line_number(index),
                    value: raw_capacity.to_string(),
                })?;
        timeslots.push(TimeslotSpec::limited(name, capacity));
    }

    Ok(timeslots)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1"
    )
}

/// Accepts the form export layout, RFC 3339 and `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return Some(timestamp);
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.naive_utc());
    }

    NaiveDateTime::parse_from_str(trimmed, FALLBACK_TIMESTAMP_FORMAT).ok()
}

/// Splits a comma-separated request cell, removing all whitespace from each entry.
pub fn parse_requested_timeslots(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(compact)
        .filter(|timeslot| !timeslot.is_empty())
        .collect()
}
