use std::sync::Arc;

use log::{error, info, warn};

use crate::error::Result;
use crate::model::{
    candidate::{Candidate, CandidateCore},
    election::{ElectionDetail, ElectionSummary},
    event::Event,
    mongodb::Id,
};
use crate::repository::{CandidateRepository, EventRepository};

/// Builds the election views and runs the multi-step election creation.
#[derive(Clone)]
pub struct ElectionService {
    events: Arc<dyn EventRepository>,
    candidates: Arc<dyn CandidateRepository>,
}

impl ElectionService {
    pub fn new(events: Arc<dyn EventRepository>, candidates: Arc<dyn CandidateRepository>) -> Self {
        Self { events, candidates }
    }

    /// Every election with its ballot.
    ///
    /// A failed read is logged and yields an empty list, so callers cannot
    /// tell "no elections" apart from "store unavailable".
    pub async fn list_elections(&self) -> Vec<ElectionSummary> {
        match self.events.find_all_with_candidates().await {
            Ok(events) => events.into_iter().map(ElectionSummary::from).collect(),
            Err(err) => {
                error!("Failed to load elections: {err}");
                Vec::new()
            }
        }
    }

    /// A single election. Fails with `NotFound` if there is no such event.
    pub async fn get_election(&self, event_id: Id) -> Result<ElectionDetail> {
        let expanded = self.events.find_by_id_with_candidates(event_id).await?;
        Ok(expanded.into())
    }

    /// Create an event and its ballot, numbering candidates from 1 in the given order.
    ///
    /// There is no rollback: if a later step fails, the event stays behind
    /// with no candidates, or with only some of them stored but unattached.
    pub async fn create_election(&self, name: &str, candidate_names: Vec<String>) -> Result<Event> {
        let opened = OpenedEvent::open(self.events.as_ref(), name).await?;
        let event_id = opened.event.id;
        let linked = async {
            opened
                .enlist(self.candidates.as_ref(), candidate_names)
                .await?
                .link(self.events.as_ref())
                .await
        }
        .await;
        match linked {
            Ok(event) => {
                info!(
                    "Created election {} with {} candidates",
                    event.id,
                    event.candidate_refs.len()
                );
                Ok(event)
            }
            Err(err) => {
                warn!("Election {event_id} left incomplete: {err}");
                Err(err)
            }
        }
    }

    /// Add one vote for the candidate at `ballot_index` in the given election.
    pub async fn cast_vote(&self, event_id: Id, ballot_index: u32) -> Result<Candidate> {
        self.candidates.record_vote(event_id, ballot_index).await
    }
}

/// An event that has been stored but has no ballot yet.
struct OpenedEvent {
    event: Event,
}

impl OpenedEvent {
    async fn open(events: &dyn EventRepository, name: &str) -> Result<Self> {
        let event = events.create(name).await?;
        Ok(Self { event })
    }

    /// Store the candidates, each pointing back at this event.
    async fn enlist(
        self,
        candidates: &dyn CandidateRepository,
        names: Vec<String>,
    ) -> Result<EnlistedEvent> {
        let ballot = CandidateCore::ballot(self.event.id, names);
        let candidate_refs = candidates.create_many(ballot).await?;
        Ok(EnlistedEvent {
            event: self.event,
            candidate_refs,
        })
    }
}

/// An event whose candidates are stored but not yet referenced from the event.
struct EnlistedEvent {
    event: Event,
    candidate_refs: Vec<Id>,
}

impl EnlistedEvent {
    async fn link(self, events: &dyn EventRepository) -> Result<Event> {
        events
            .attach_candidates(self.event.id, self.candidate_refs)
            .await
    }
}
