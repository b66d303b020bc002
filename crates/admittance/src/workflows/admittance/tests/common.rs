use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

use crate::workflows::admittance::domain::{
    Person, ReferenceSets, Registration, Timeslot, TimeslotSpec,
};
use crate::workflows::admittance::marks::MarkState;
use crate::workflows::admittance::preprocess::{
    MarkingPipeline, MarkingRules, PreprocessOutcome,
};

pub(super) fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 8, 19)
        .expect("valid date")
        .and_hms_opt(9, minute, 0)
        .expect("valid time")
}

pub(super) fn person(name: &str, email: &str) -> Person {
    Person::new(name, email)
}

pub(super) fn registration(
    name: &str,
    email: &str,
    minute: u32,
    timeslots: &[&str],
) -> Registration {
    Registration::new(person(name, email), at(minute), timeslots.iter().copied())
}

pub(super) fn specs(slots: &[(&str, Option<usize>)]) -> Vec<TimeslotSpec> {
    slots
        .iter()
        .map(|(name, capacity)| TimeslotSpec {
            name: name.to_string(),
            capacity: *capacity,
        })
        .collect()
}

pub(super) fn timeslots(slots: &[(&str, Option<usize>)]) -> IndexMap<String, Timeslot> {
    specs(slots)
        .into_iter()
        .map(|spec| (spec.name.clone(), Timeslot::from_spec(spec)))
        .collect()
}

pub(super) fn standard_timeslots() -> IndexMap<String, Timeslot> {
    timeslots(&[("10:00", Some(2)), ("12:00", Some(2))])
}

pub(super) fn run_pipeline(
    references: &mut ReferenceSets,
    timeslots: &mut IndexMap<String, Timeslot>,
    registrations: Vec<Registration>,
) -> PreprocessOutcome {
    run_pipeline_with(&MarkingRules::default(), references, timeslots, registrations)
}

pub(super) fn run_pipeline_with(
    rules: &MarkingRules,
    references: &mut ReferenceSets,
    timeslots: &mut IndexMap<String, Timeslot>,
    registrations: Vec<Registration>,
) -> PreprocessOutcome {
    MarkingPipeline::new(rules, references, timeslots).run(registrations)
}

pub(super) fn states(outcome: &PreprocessOutcome, person: &Person) -> Vec<MarkState> {
    outcome
        .marks
        .marks_for(person)
        .iter()
        .map(|mark| mark.state)
        .collect()
}
