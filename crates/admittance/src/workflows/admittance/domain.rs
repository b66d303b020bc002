use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use indexmap::IndexSet;
use serde::Serialize;

use super::similarity::SimilarityMatcher;

fn normalize_field(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Identity of a single applicant as submitted on the registration form.
///
/// Both fields are lower-cased and trimmed on construction, so equality and hashing
/// operate on the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Person {
    name: String,
    email: String,
}

impl Person {
    pub fn new(name: impl AsRef<str>, email: impl AsRef<str>) -> Self {
        Self {
            name: normalize_field(name.as_ref()),
            email: normalize_field(email.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Fuzzy identity check using the default threshold.
    pub fn similar(&self, other: &Person) -> bool {
        SimilarityMatcher::default().similar(self, other)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A time-stamped submission of the registration form.
///
/// Two registrations compare equal when they belong to the same [`Person`], regardless of
/// when they were submitted or which timeslots they ask for.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    person: Person,
    timestamp: NaiveDateTime,
    timeslots: Vec<String>,
}

impl Registration {
    /// Builds a registration, collapsing repeated timeslot requests while keeping the
    /// order in which they were first listed.
    pub fn new<I, S>(person: Person, timestamp: NaiveDateTime, timeslots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut requested: Vec<String> = Vec::new();
        for timeslot in timeslots {
            let timeslot = timeslot.into();
            if !requested.contains(&timeslot) {
                requested.push(timeslot);
            }
        }

        Self {
            person,
            timestamp,
            timeslots: requested,
        }
    }

    pub fn person(&self) -> &Person {
        &self.person
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn timeslots(&self) -> &[String] {
        &self.timeslots
    }

    pub fn requests(&self, timeslot: &str) -> bool {
        self.timeslots.iter().any(|requested| requested == timeslot)
    }

    /// Compares the requested timeslots as sets.
    pub fn same_requests(&self, other: &Registration) -> bool {
        self.timeslots.len() == other.timeslots.len()
            && self.timeslots.iter().all(|timeslot| other.requests(timeslot))
    }
}

impl PartialEq for Registration {
    fn eq(&self, other: &Self) -> bool {
        self.person == other.person
    }
}

impl Eq for Registration {}

impl Hash for Registration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.person.hash(state);
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} for [{}]",
            self.person,
            self.timestamp,
            self.timeslots.join(", ")
        )
    }
}

/// Configuration record for one timeslot; `capacity: None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeslotSpec {
    pub name: String,
    pub capacity: Option<usize>,
}

impl TimeslotSpec {
    pub fn limited(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: Some(capacity),
        }
    }

    pub fn unlimited(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
        }
    }
}

/// Admission pool for one scheduled period of the opening.
///
/// `admit` and `remove` are the only roster mutators. People in the exclusion set are
/// never admitted directly.
#[derive(Debug, Clone)]
pub struct Timeslot {
    name: String,
    capacity: Option<usize>,
    admitted: Vec<Registration>,
    excluded: IndexSet<Person>,
}

impl Timeslot {
    pub fn limited(name: impl Into<String>, capacity: usize) -> Self {
        Self::from_spec(TimeslotSpec::limited(name, capacity))
    }

    pub fn unlimited(name: impl Into<String>) -> Self {
        Self::from_spec(TimeslotSpec::unlimited(name))
    }

    pub fn from_spec(spec: TimeslotSpec) -> Self {
        Self {
            name: spec.name,
            capacity: spec.capacity,
            admitted: Vec::new(),
            excluded: IndexSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_unlimited(&self) -> bool {
        self.capacity.is_none()
    }

    pub fn admitted(&self) -> &[Registration] {
        &self.admitted
    }

    pub fn excluded(&self) -> &IndexSet<Person> {
        &self.excluded
    }

    pub fn spots_taken(&self) -> usize {
        self.admitted.len()
    }

    /// Remaining places, or `None` for an unlimited timeslot.
    pub fn spots_available(&self) -> Option<usize> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.admitted.len()))
    }

    pub fn is_full(&self) -> bool {
        self.spots_available() == Some(0)
    }

    pub fn is_excluded(&self, person: &Person) -> bool {
        self.excluded.contains(person)
    }

    /// Adds a person to the precedence exclusion set. Returns `false` if already present.
    pub fn exclude(&mut self, person: Person) -> bool {
        self.excluded.insert(person)
    }

    pub fn admit(&mut self, registration: &Registration) -> bool {
        if self.is_excluded(registration.person()) || self.is_full() {
            return false;
        }

        self.admitted.push(registration.clone());
        true
    }

    pub fn remove(&mut self, registration: &Registration) -> bool {
        match self
            .admitted
            .iter()
            .position(|admitted| admitted == registration)
        {
            Some(index) => {
                self.admitted.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empties the roster. Exclusions are kept.
    pub fn clear_roster(&mut self) {
        self.admitted.clear();
    }
}

/// Prior operator decisions consulted during preprocessing.
///
/// `banned` grows while a run propagates confirmed bans; the other sets are read-only to
/// the engine. `down_prioritized` is copied into every timeslot's exclusion set when an
/// opening is configured.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSets {
    pub banned: IndexSet<Person>,
    pub confirmed_duplicates: IndexSet<Person>,
    pub confirmed_nonworking_emails: IndexSet<Person>,
    pub down_prioritized: IndexSet<Person>,
}
