//! View models handed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{candidate::Candidate, event::EventWithCandidates};

/// Status reported for every election. There is no election lifecycle yet.
pub const ELECTION_STATUS: &str = "En Curso";

/// A candidate as listed in the election overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub name: String,
    pub ballot_index: u32,
}

/// An entry in the list of elections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub candidates: Vec<CandidateSummary>,
}

impl From<EventWithCandidates> for ElectionSummary {
    fn from(expanded: EventWithCandidates) -> Self {
        let EventWithCandidates { event, candidates } = expanded;
        Self {
            id: event.id.into(),
            name: event.event.name,
            created_at: event.event.created_at,
            candidates: candidates
                .into_iter()
                .map(|candidate| CandidateSummary {
                    name: candidate.candidate.name,
                    ballot_index: candidate.candidate.ballot_index,
                })
                .collect(),
        }
    }
}

/// A candidate as shown on the page of a single election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDetail {
    pub name: String,
    pub ballot_index: u32,
    pub vote_count: u32,
}

impl From<Candidate> for CandidateDetail {
    fn from(candidate: Candidate) -> Self {
        Self {
            name: candidate.candidate.name,
            ballot_index: candidate.candidate.ballot_index,
            vote_count: candidate.candidate.vote_count,
        }
    }
}

/// A single election with its full ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDetail {
    pub name: String,
    pub status: String,
    pub candidates: Vec<CandidateDetail>,
    pub created_at: DateTime<Utc>,
}

impl From<EventWithCandidates> for ElectionDetail {
    fn from(expanded: EventWithCandidates) -> Self {
        let EventWithCandidates { event, candidates } = expanded;
        Self {
            name: event.event.name,
            status: ELECTION_STATUS.to_string(),
            candidates: candidates.into_iter().map(Into::into).collect(),
            created_at: event.event.created_at,
        }
    }
}

/// Request body for creating an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub name: String,
    /// Candidate names in ballot order.
    pub candidates: Vec<String>,
}

/// Request body for casting a vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteRequest {
    pub ballot_index: u32,
}

/// Acknowledgement of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub event_id: String,
    pub ballot_index: u32,
    pub candidate: String,
}

impl From<Candidate> for VoteReceipt {
    fn from(candidate: Candidate) -> Self {
        Self {
            event_id: candidate.event_ref.into(),
            ballot_index: candidate.ballot_index,
            candidate: candidate.candidate.name,
        }
    }
}
