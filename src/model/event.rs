use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{candidate::Candidate, mongodb::Id};

/// Core event data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCore {
    pub name: String,
    /// Candidates in ballot order. Empty until the ballot has been attached.
    pub candidate_refs: Vec<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// An event without an ID.
pub type NewEvent = EventCore;

impl EventCore {
    /// A new event with no candidates, stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidate_refs: Vec::new(),
            created_at: now(),
        }
    }
}

/// An event from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: EventCore,
}

impl Deref for Event {
    type Target = EventCore;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl DerefMut for Event {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.event
    }
}

/// An event with its candidate references expanded into full records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWithCandidates {
    pub event: Event,
    /// Ordered as `event.candidate_refs`.
    pub candidates: Vec<Candidate>,
}

impl EventWithCandidates {
    /// Pair an event with the candidates resolved for it, restoring reference order.
    ///
    /// Lookups do not preserve the order of the reference array, so the
    /// resolved records are re-sorted here. References that resolved to
    /// nothing are dropped.
    pub fn from_lookup(event: Event, resolved: Vec<Candidate>) -> Self {
        let mut by_id = resolved
            .into_iter()
            .map(|candidate| (candidate.id, candidate))
            .collect::<HashMap<_, _>>();
        let candidates = event
            .candidate_refs
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        Self { event, candidates }
    }
}

impl Deref for EventWithCandidates {
    type Target = Event;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

/// Current time at the precision a BSON datetime can hold, so that values
/// survive a round trip through the database unchanged.
fn now() -> DateTime<Utc> {
    mongodb::bson::DateTime::now().to_chrono()
}
