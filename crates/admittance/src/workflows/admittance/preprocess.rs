use indexmap::IndexMap;
use tracing::{info, warn};

use super::domain::{Person, ReferenceSets, Registration, Timeslot};
use super::marks::{MarkLog, MarkState};
use super::similarity::{SimilarityMatcher, MAX_NAME_PARTS};

/// Deduplicated registrations that remain eligible for the lottery, in acceptance order.
pub type CandidateMap = IndexMap<Person, Registration>;

const DEFAULT_BAD_EMAIL_ENDINGS: [&str; 2] = [".con", "@ntnu.no"];

/// Heuristics applied while marking registrations.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkingRules {
    pub matcher: SimilarityMatcher,
    /// Email suffixes that usually indicate an address that bounces.
    pub bad_email_endings: Vec<String>,
}

impl Default for MarkingRules {
    fn default() -> Self {
        Self {
            matcher: SimilarityMatcher::default(),
            bad_email_endings: DEFAULT_BAD_EMAIL_ENDINGS
                .iter()
                .map(|ending| ending.to_string())
                .collect(),
        }
    }
}

/// Result of a single marking pass.
#[derive(Debug, Clone, Default)]
pub struct PreprocessOutcome {
    pub candidates: CandidateMap,
    pub marks: MarkLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Keep,
    Skip,
}

type Step<'a> = fn(&mut MarkingPipeline<'a>, &Registration) -> Decision;

/// Single pass over the raw registrations.
///
/// Confirmed bans and confirmed down-priority matches are written back into the
/// reference sets and timeslot exclusion sets it borrows, so later registrations in the
/// same pass see them.
pub(crate) struct MarkingPipeline<'a> {
    rules: &'a MarkingRules,
    references: &'a mut ReferenceSets,
    timeslots: &'a mut IndexMap<String, Timeslot>,
    candidates: CandidateMap,
    marks: MarkLog,
}

impl<'a> MarkingPipeline<'a> {
    pub(crate) fn new(
        rules: &'a MarkingRules,
        references: &'a mut ReferenceSets,
        timeslots: &'a mut IndexMap<String, Timeslot>,
    ) -> Self {
        Self {
            rules,
            references,
            timeslots,
            candidates: CandidateMap::new(),
            marks: MarkLog::new(),
        }
    }

    pub(crate) fn run<I>(mut self, registrations: I) -> PreprocessOutcome
    where
        I: IntoIterator<Item = Registration>,
    {
        let mut processed = 0usize;
        for registration in registrations {
            processed += 1;
            self.warn_on_unknown_timeslots(&registration);

            if self.evaluate(&registration) == Decision::Keep {
                self.candidates
                    .insert(registration.person().clone(), registration);
            }
        }

        info!(
            processed,
            candidates = self.candidates.len(),
            marked = self.marks.len(),
            need_confirmation = self.marks.needing_confirmation().count(),
            "registrations preprocessed"
        );

        PreprocessOutcome {
            candidates: self.candidates,
            marks: self.marks,
        }
    }

    fn evaluate(&mut self, registration: &Registration) -> Decision {
        let steps: [Step<'a>; 7] = [
            Self::check_ban,
            Self::check_bad_email,
            Self::check_name_length,
            Self::check_down_prioritized_everywhere,
            Self::check_timeslot_down_priority,
            Self::resolve_identity,
            Self::check_nonworking_email,
        ];

        for step in steps {
            if step(self, registration) == Decision::Skip {
                return Decision::Skip;
            }
        }
        Decision::Keep
    }

    fn warn_on_unknown_timeslots(&self, registration: &Registration) {
        for requested in registration.timeslots() {
            if !self.timeslots.contains_key(requested) {
                warn!(
                    person = %registration.person(),
                    timeslot = %requested,
                    "registration requests a timeslot that is not configured"
                );
            }
        }
    }

    fn is_confirmed_duplicate(&self, person: &Person) -> bool {
        self.references.confirmed_duplicates.contains(person)
    }

    fn check_ban(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();
        if self.references.banned.contains(person) {
            self.marks
                .record(person, MarkState::Done, "Banned from attending, see ban list");
            return Decision::Skip;
        }

        let matcher = self.rules.matcher;
        let suspected = self
            .references
            .banned
            .iter()
            .find(|banned| matcher.similar(banned, person))
            .cloned();
        let Some(banned_person) = suspected else {
            return Decision::Keep;
        };

        if self.is_confirmed_duplicate(person) {
            self.marks.record(
                person,
                MarkState::Done,
                format!("Confirmed ban, same person as {banned_person} on the ban list"),
            );
            self.references.banned.insert(person.clone());
            Decision::Skip
        } else {
            self.marks.record(
                person,
                MarkState::NeedConfirmation,
                format!("Suspected ban, might be {banned_person} from the ban list"),
            );
            Decision::Keep
        }
    }

    fn check_bad_email(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();
        let rules = self.rules;
        for ending in &rules.bad_email_endings {
            if person.email().ends_with(ending.as_str()) {
                self.marks.record(
                    person,
                    MarkState::Unconfirmed,
                    format!("Likely a non-working email, it ends with '{ending}'"),
                );
            }
        }
        Decision::Keep
    }

    fn check_name_length(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();
        let parts = person.name().split_whitespace().count();
        if parts > MAX_NAME_PARTS {
            self.marks.record(
                person,
                MarkState::Unconfirmed,
                format!(
                    "Name has {parts} parts, duplicate checks only compare it in the order given"
                ),
            );
        }
        Decision::Keep
    }

    fn check_down_prioritized_everywhere(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();
        if self.timeslots.is_empty()
            || !self
                .timeslots
                .values()
                .all(|timeslot| timeslot.is_excluded(person))
        {
            return Decision::Keep;
        }

        self.marks.record(
            person,
            MarkState::Done,
            "Down-prioritized from every timeslot, attended a previous opening in a preferred slot",
        );
        Decision::Skip
    }

    fn check_timeslot_down_priority(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();
        let matcher = self.rules.matcher;
        let confirmed = self.is_confirmed_duplicate(person);

        for (name, timeslot) in self.timeslots.iter_mut() {
            if !registration.requests(name) {
                continue;
            }

            if timeslot.is_excluded(person) {
                self.marks.record(
                    person,
                    MarkState::Done,
                    format!(
                        "Down-prioritized from {name}, attended a previous opening in a preferred slot"
                    ),
                );
                break;
            }

            let suspected = timeslot
                .excluded()
                .iter()
                .find(|excluded| matcher.similar(excluded, person))
                .cloned();
            let Some(excluded_person) = suspected else {
                continue;
            };

            if confirmed {
                self.marks.record(
                    person,
                    MarkState::Done,
                    format!(
                        "Down-prioritized from {name}, confirmed duplicate of {excluded_person} on the down-priority list"
                    ),
                );
                timeslot.exclude(person.clone());
            } else {
                self.marks.record(
                    person,
                    MarkState::NeedConfirmation,
                    format!(
                        "May be down-prioritized from {name}, suspected to be {excluded_person} from the down-priority list"
                    ),
                );
            }
        }

        Decision::Keep
    }

    fn resolve_identity(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();

        if let Some(existing) = self.candidates.get(person) {
            if existing.same_requests(registration) {
                self.marks.record(
                    person,
                    MarkState::Done,
                    format!(
                        "Duplicate registration with unchanged timeslots, keeping the submission from {}",
                        existing.timestamp()
                    ),
                );
                return Decision::Skip;
            }

            self.marks.record(
                person,
                MarkState::Done,
                format!(
                    "Duplicate registration overwritten, timestamp changed from {} to {}, timeslots changed from [{}] to [{}]",
                    existing.timestamp(),
                    registration.timestamp(),
                    existing.timeslots().join(", "),
                    registration.timeslots().join(", ")
                ),
            );
            return Decision::Keep;
        }

        let matcher = self.rules.matcher;
        let confirmed = self.is_confirmed_duplicate(person);
        let mut superseded = Vec::new();

        for (accepted_person, accepted) in &self.candidates {
            if !matcher.similar(person, accepted_person) {
                continue;
            }

            if confirmed {
                self.marks.record(
                    accepted_person,
                    MarkState::Done,
                    format!(
                        "Confirmed duplicate, {person} is the same as {accepted_person}, replacing {accepted} with {registration}"
                    ),
                );
                self.marks.record(
                    person,
                    MarkState::Done,
                    format!("Confirmed duplicate of {accepted_person}, replaces the earlier registration"),
                );
                superseded.push(accepted_person.clone());
            } else {
                self.marks.record(
                    accepted_person,
                    MarkState::NeedConfirmation,
                    format!("Suspected duplicate of {registration}"),
                );
                self.marks.record(
                    person,
                    MarkState::NeedConfirmation,
                    format!("Suspected duplicate of {accepted}"),
                );
                break;
            }
        }

        for accepted_person in &superseded {
            self.candidates.shift_remove(accepted_person);
        }

        Decision::Keep
    }

    fn check_nonworking_email(&mut self, registration: &Registration) -> Decision {
        let person = registration.person();
        if !self.references.confirmed_nonworking_emails.contains(person) {
            return Decision::Keep;
        }

        self.marks
            .record(person, MarkState::Done, "Confirmed non-working email");
        Decision::Skip
    }
}
