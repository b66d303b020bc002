use std::collections::HashMap;
use std::fs;

use admittance::config::SheetsConfig;
use admittance::workflows::admittance::{
    MarkState, MarkingRules, OpeningAdmittance, Person, SimilarityMatcher,
};
use admittance::workflows::sheets::{
    export_marks, export_rosters, export_waiting_list, parse_registrations, ColumnBinding,
    CsvDirectorySink, CsvDirectorySource, ImportError, OpeningWorkbook, Sheet, TabularSource,
    REGISTRATION_FIELDS,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

#[derive(Default)]
struct InMemorySource {
    sheets: HashMap<String, Sheet>,
}

impl InMemorySource {
    fn with(mut self, name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        let sheet = Sheet::new(
            name,
            headers.iter().map(|header| header.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        );
        self.sheets.insert(name.to_string(), sheet);
        self
    }
}

impl TabularSource for InMemorySource {
    fn sheet(&self, name: &str) -> Result<Option<Sheet>, ImportError> {
        Ok(self.sheets.get(name).cloned())
    }
}

fn reference_sheets(source: InMemorySource) -> InMemorySource {
    source
        .with("confirmed duplicates", &["Name", "Email"], &[])
        .with("non-working emails", &["Name", "Email"], &[])
}

#[test]
fn in_memory_workbook_runs_end_to_end() {
    let source = reference_sheets(InMemorySource::default())
        .with(
            "Responses",
            &["Timestamp", "Name", "Email", "Timeslots"],
            &[
                &["19/08/2024 09:01:00", "Ola Nordmann", "ola@example.com", "Mon 10:00"],
                &["19/08/2024 09:02:00", "Kari Hansen", "kari@example.com", "Mon 10:00"],
                &["19/08/2024 09:03:00", "Ola Nordmann", "ola@example.com", "Mon 12:00"],
            ],
        )
        .with(
            "Timeslot Details",
            &["Name", "Capacity", "Unlimited"],
            &[&["Mon 10:00", "1", "false"], &["Mon 12:00", "", "true"]],
        );

    let workbook = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect("loads");
    let mut opening = OpeningAdmittance::new(
        workbook.timeslots,
        workbook.references,
        MarkingRules::default(),
    )
    .expect("valid opening");
    let mut rng = StdRng::seed_from_u64(17);

    let outcome = opening.auto_admit(workbook.registrations, &mut rng);

    let ola = Person::new("ola nordmann", "ola@example.com");
    assert_eq!(outcome.candidates[&ola].timeslots(), ["Mon12:00"]);
    assert_eq!(outcome.marks.marks_for(&ola)[0].state, MarkState::Done);
    assert_eq!(opening.timeslot("Mon10:00").expect("slot").spots_taken(), 1);
    assert_eq!(opening.timeslot("Mon12:00").expect("slot").spots_taken(), 1);
    assert!(outcome.waiting_list.is_empty());
}

#[test]
fn exported_rosters_read_back_as_registrations() {
    let input = TempDir::new().expect("input");
    let output = TempDir::new().expect("output");
    fs::write(
        input.path().join("Responses.csv"),
        "Timestamp,Name,Email,Timeslots\n\
19/08/2024 09:01:00,Ann Berg,ann.berg@example.com,\"10:00, 12:00\"\n\
19/08/2024 09:02:00,Bjorn Dahl,bjorn.dahl@example.com,10:00\n\
19/08/2024 09:03:00,Cecilie Lund,cecilie.lund@example.com,10:00\n",
    )
    .expect("responses");
    fs::write(
        input.path().join("Timeslot Details.csv"),
        "Name,Capacity,Unlimited\n10:00,1,false\n12:00,1,false\n",
    )
    .expect("timeslots");
    fs::write(input.path().join("confirmed duplicates.csv"), "Name,Email\n").expect("dups");
    fs::write(input.path().join("non-working emails.csv"), "Name,Email\n").expect("emails");

    let source = CsvDirectorySource::new(input.path());
    let workbook = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect("loads");
    let registrations = workbook.registrations.clone();
    let mut opening = OpeningAdmittance::new(
        workbook.timeslots,
        workbook.references,
        MarkingRules::default(),
    )
    .expect("valid opening");
    let mut rng = StdRng::seed_from_u64(4);
    let outcome = opening.auto_admit(workbook.registrations, &mut rng);

    let mut sink = CsvDirectorySink::new(output.path());
    let sections = export_rosters(&mut sink, opening.timeslots()).expect("rosters");
    export_waiting_list(&mut sink, &outcome.waiting_list).expect("waiting list");
    export_marks(&mut sink, &outcome.marks).expect("marks");

    let written = CsvDirectorySource::new(output.path());
    let mut reread = Vec::new();
    for name in ["1000", "1200", "waiting_list"] {
        if let Some(sheet) = written.sheet(name).expect("readable") {
            let binding = ColumnBinding::from_headers(&sheet.headers, &REGISTRATION_FIELDS);
            reread.extend(parse_registrations(&sheet, &binding).expect("parses"));
        }
    }

    assert_eq!(sections, 2);
    assert_eq!(reread.len(), registrations.len());
    for registration in &registrations {
        let copy = reread
            .iter()
            .find(|candidate| *candidate == registration)
            .expect("every registration exported once");
        assert_eq!(copy.timestamp(), registration.timestamp());
        assert_eq!(copy.timeslots(), registration.timeslots());
    }
    let marked = written
        .sheet("marked")
        .expect("readable")
        .expect("marked section always written");
    assert!(marked.rows.is_empty());
}

#[test]
fn looser_threshold_flags_more_suspected_duplicates() {
    let registrations = |source: InMemorySource| {
        reference_sheets(source)
            .with(
                "Responses",
                &["Timestamp", "Name", "Email", "Timeslots"],
                &[
                    &["19/08/2024 09:01:00", "Jon Doe", "jon.doe@example.com", "10:00"],
                    &["19/08/2024 09:02:00", "Jon Due", "jdue@another.org", "10:00"],
                ],
            )
            .with(
                "Timeslot Details",
                &["Name", "Capacity", "Unlimited"],
                &[&["10:00", "", "true"]],
            )
    };

    let run = |threshold: f64| {
        let source = registrations(InMemorySource::default());
        let workbook = OpeningWorkbook::load(&source, &SheetsConfig::default()).expect("loads");
        let rules = MarkingRules {
            matcher: SimilarityMatcher::new(threshold),
            ..MarkingRules::default()
        };
        let mut opening =
            OpeningAdmittance::new(workbook.timeslots, workbook.references, rules)
                .expect("valid opening");
        opening
            .preprocess(workbook.registrations)
            .marks
            .needing_confirmation()
            .count()
    };

    assert_eq!(run(0.9), 0);
    assert_eq!(run(0.8), 2);
}
