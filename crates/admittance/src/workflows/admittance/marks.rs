use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::domain::Person;

/// Resolution state attached to every mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkState {
    /// Resolved automatically from prior operator decisions.
    Done,
    /// An operator has to confirm or reject the suspicion.
    NeedConfirmation,
    /// Informational only.
    Unconfirmed,
}

impl MarkState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Done => "DONE",
            Self::NeedConfirmation => "NEED_CONFIRMATION",
            Self::Unconfirmed => "UNCONFIRMED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mark {
    pub state: MarkState,
    pub reason: String,
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.state.label(), self.reason)
    }
}

/// Append-only annotations keyed by person, in the order people were first marked.
#[derive(Debug, Clone, Default)]
pub struct MarkLog {
    entries: IndexMap<Person, Vec<Mark>>,
}

impl MarkLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, person: &Person, state: MarkState, reason: impl Into<String>) {
        let reason = reason.into();
        match state {
            MarkState::NeedConfirmation => {
                warn!(person = %person, %reason, "registration needs manual confirmation")
            }
            _ => debug!(person = %person, state = state.label(), %reason, "registration marked"),
        }

        self.entries
            .entry(person.clone())
            .or_default()
            .push(Mark { state, reason });
    }

    pub fn marks_for(&self, person: &Person) -> &[Mark] {
        self.entries.get(person).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Person, &[Mark])> {
        self.entries
            .iter()
            .map(|(person, marks)| (person, marks.as_slice()))
    }

    /// Number of marked people.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_in_state(&self, state: MarkState) -> usize {
        self.entries
            .values()
            .flatten()
            .filter(|mark| mark.state == state)
            .count()
    }

    /// People carrying at least one mark an operator still has to resolve.
    pub fn needing_confirmation(&self) -> impl Iterator<Item = &Person> {
        self.entries
            .iter()
            .filter(|(_, marks)| {
                marks
                    .iter()
                    .any(|mark| mark.state == MarkState::NeedConfirmation)
            })
            .map(|(person, _)| person)
    }
}
