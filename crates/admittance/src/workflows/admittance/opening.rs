use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use super::domain::{ReferenceSets, Registration, Timeslot, TimeslotSpec};
use super::lottery;
use super::marks::{MarkLog, MarkState};
use super::preprocess::{CandidateMap, MarkingPipeline, MarkingRules, PreprocessOutcome};
use crate::config::ConfigError;

/// One opening: its timeslots, the operator's reference sets and the marking rules.
///
/// Rosters are only filled by [`auto_admit`](Self::auto_admit), which starts every draw
/// from empty rosters.
#[derive(Debug, Clone)]
pub struct OpeningAdmittance {
    timeslots: IndexMap<String, Timeslot>,
    references: ReferenceSets,
    rules: MarkingRules,
}

impl OpeningAdmittance {
    /// Configures the opening, copying `references.down_prioritized` into the exclusion
    /// set of every timeslot.
    pub fn new<I>(
        specs: I,
        references: ReferenceSets,
        rules: MarkingRules,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = TimeslotSpec>,
    {
        let mut timeslots = IndexMap::new();
        for spec in specs {
            if timeslots.contains_key(&spec.name) {
                return Err(ConfigError::DuplicateTimeslot(spec.name));
            }

            let mut timeslot = Timeslot::from_spec(spec);
            for person in &references.down_prioritized {
                timeslot.exclude(person.clone());
            }
            timeslots.insert(timeslot.name().to_string(), timeslot);
        }

        if timeslots.is_empty() {
            return Err(ConfigError::NoTimeslots);
        }

        info!(
            timeslots = timeslots.len(),
            banned = references.banned.len(),
            confirmed_duplicates = references.confirmed_duplicates.len(),
            confirmed_nonworking_emails = references.confirmed_nonworking_emails.len(),
            down_prioritized = references.down_prioritized.len(),
            "opening configured"
        );

        Ok(Self {
            timeslots,
            references,
            rules,
        })
    }

    pub fn timeslots(&self) -> &IndexMap<String, Timeslot> {
        &self.timeslots
    }

    pub fn timeslot(&self, name: &str) -> Option<&Timeslot> {
        self.timeslots.get(name)
    }

    pub fn references(&self) -> &ReferenceSets {
        &self.references
    }

    pub fn rules(&self) -> &MarkingRules {
        &self.rules
    }

    /// Deduplicates and marks the registrations without touching any roster.
    ///
    /// Confirmed ban and down-priority matches still propagate into the reference sets
    /// and exclusion sets.
    pub fn preprocess<I>(&mut self, registrations: I) -> PreprocessOutcome
    where
        I: IntoIterator<Item = Registration>,
    {
        MarkingPipeline::new(&self.rules, &mut self.references, &mut self.timeslots)
            .run(registrations)
    }

    /// Preprocesses, then runs the lottery over the surviving candidates.
    ///
    /// Rosters left by an earlier call are cleared first. Exclusions propagated by earlier
    /// calls are kept.
    pub fn auto_admit<I, R>(&mut self, registrations: I, rng: &mut R) -> AdmissionOutcome
    where
        I: IntoIterator<Item = Registration>,
        R: Rng,
    {
        for timeslot in self.timeslots.values_mut() {
            timeslot.clear_roster();
        }

        let PreprocessOutcome { candidates, marks } = self.preprocess(registrations);
        let waiting_list = lottery::allocate(&candidates, &mut self.timeslots, rng);

        AdmissionOutcome {
            candidates,
            marks,
            waiting_list,
        }
    }

    pub fn summarize(
        &self,
        candidates: &CandidateMap,
        marks: &MarkLog,
        waiting_list: &[Registration],
    ) -> AdmissionSummary {
        let timeslots = self
            .timeslots
            .values()
            .map(|timeslot| TimeslotSummary {
                name: timeslot.name().to_string(),
                capacity: timeslot.capacity(),
                admitted: timeslot.spots_taken(),
                excluded: timeslot.excluded().len(),
            })
            .collect();

        AdmissionSummary {
            timeslots,
            candidates: candidates.len(),
            waiting_list: waiting_list.len(),
            marked_people: marks.len(),
            done_marks: marks.count_in_state(MarkState::Done),
            unconfirmed_marks: marks.count_in_state(MarkState::Unconfirmed),
            need_confirmation: marks.needing_confirmation().count(),
            banned: self.references.banned.len(),
        }
    }
}

/// Everything a full admission run produces besides the filled rosters.
#[derive(Debug, Clone, Default)]
pub struct AdmissionOutcome {
    pub candidates: CandidateMap,
    pub marks: MarkLog,
    pub waiting_list: Vec<Registration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeslotSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    pub admitted: usize,
    pub excluded: usize,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionSummary {
    pub timeslots: Vec<TimeslotSummary>,
    pub candidates: usize,
    pub waiting_list: usize,
    pub marked_people: usize,
    pub done_marks: usize,
    pub unconfirmed_marks: usize,
    /// People with at least one unresolved suspicion.
    pub need_confirmation: usize,
    pub banned: usize,
}
