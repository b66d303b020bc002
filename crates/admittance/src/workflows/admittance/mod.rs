//! Registration deduplication, eligibility marking and the timeslot lottery.
//!
//! Raw registrations flow through [`OpeningAdmittance::preprocess`], which resolves exact
//! duplicates and marks suspicious identities for an operator, and then through the
//! lottery, which fills each timeslot by uniform random draw and returns a waiting list.

pub mod domain;
mod lottery;
pub mod marks;
mod opening;
mod preprocess;
pub mod similarity;

#[cfg(test)]
mod tests;

pub use domain::{Person, ReferenceSets, Registration, Timeslot, TimeslotSpec};
pub use lottery::allocate;
pub use marks::{Mark, MarkLog, MarkState};
pub use opening::{AdmissionOutcome, AdmissionSummary, OpeningAdmittance, TimeslotSummary};
pub use preprocess::{CandidateMap, MarkingRules, PreprocessOutcome};
pub use similarity::{
    SequenceMatcher, SimilarityMatcher, DEFAULT_SIMILARITY_THRESHOLD, MAX_NAME_PARTS,
};
