/// Strips invisible characters spreadsheets leave behind and collapses inner whitespace.
pub(crate) fn clean_cell(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Timeslot names are compared with every whitespace character removed.
pub(crate) fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{feff}' && *c != '\u{200b}')
        .collect()
}

/// Header text as used for column binding: `Marked Reason` becomes `marked_reason`.
pub(crate) fn header_key(value: &str) -> String {
    clean_cell(value).to_lowercase().replace(' ', "_")
}
