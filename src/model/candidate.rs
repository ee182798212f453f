use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    /// 1-based position on the ballot, unique within the event.
    pub ballot_index: u32,
    pub vote_count: u32,
    /// The event this candidate stands in.
    pub event_ref: Id,
}

/// A candidate not yet written to the database.
pub type NewCandidate = CandidateCore;

impl CandidateCore {
    /// A fresh candidate with no votes.
    pub fn new(name: impl Into<String>, ballot_index: u32, event_ref: Id) -> Self {
        Self {
            name: name.into(),
            ballot_index,
            vote_count: 0,
            event_ref,
        }
    }

    /// Build the ballot for an event: one candidate per name, numbered from 1 in input order.
    pub fn ballot<I, S>(event_ref: Id, names: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .zip(1..)
            .map(|(name, ballot_index)| Self::new(name, ballot_index, event_ref))
            .collect()
    }
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    /// Assign a client-side ID to a new candidate.
    pub fn with_new_id(candidate: NewCandidate) -> Self {
        Self {
            id: Id::new(),
            candidate,
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
