use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::error::{Error, Result, StorageError};
use crate::model::{
    admin::{Admin, NewAdmin},
    candidate::{Candidate, NewCandidate},
    event::{Event, EventCore, EventWithCandidates},
    mongodb::Id,
};

use super::{AdminRepository, CandidateRepository, EventRepository};

/// An in-process document store implementing every repository.
///
/// Clones share the same data. Reads and writes can be made to fail on
/// demand, to exercise the error paths of the services.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    admins: Vec<Admin>,
    candidates: Vec<Candidate>,
    events: Vec<Event>,
    fail_reads: bool,
    /// Number of further documents that may be written, if limited.
    write_budget: Option<usize>,
}

impl Inner {
    fn check_read(&self) -> std::result::Result<(), StorageError> {
        if self.fail_reads {
            Err(StorageError::Unavailable("reads are disabled".to_string()))
        } else {
            Ok(())
        }
    }

    /// Spend one write from the budget.
    fn check_write(&mut self) -> std::result::Result<(), StorageError> {
        match self.write_budget {
            Some(0) => Err(StorageError::Unavailable("writes are disabled".to_string())),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn expand(&self, event: &Event) -> EventWithCandidates {
        let resolved = self
            .candidates
            .iter()
            .filter(|candidate| event.candidate_refs.contains(&candidate.id))
            .cloned()
            .collect();
        EventWithCandidates::from_lookup(event.clone(), resolved)
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the vectors half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent read fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Allow only `budget` more documents to be written; `None` lifts the limit.
    pub fn limit_writes(&self, budget: Option<usize>) {
        self.lock().write_budget = budget;
    }

    /// Every stored candidate, in insertion order.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.lock().candidates.clone()
    }

    /// Every stored event, unexpanded, in insertion order.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }
}

#[rocket::async_trait]
impl AdminRepository for MemoryStore {
    async fn register(&self, admin: NewAdmin) -> Result<Admin> {
        let mut inner = self.lock();
        inner.check_write()?;
        let admin = Admin { id: Id::new(), admin };
        inner.admins.push(admin.clone());
        Ok(admin)
    }

    async fn find_by_credentials(
        &self,
        national_id: &str,
        credential_secret: &str,
    ) -> Result<Option<Admin>> {
        let inner = self.lock();
        inner.check_read()?;
        Ok(inner
            .admins
            .iter()
            .find(|admin| {
                admin.national_id == national_id && admin.credential_secret == credential_secret
            })
            .cloned())
    }
}

#[rocket::async_trait]
impl CandidateRepository for MemoryStore {
    async fn create_many(&self, candidates: Vec<NewCandidate>) -> Result<Vec<Id>> {
        let requested = candidates.len();
        let mut inner = self.lock();
        let mut inserted = Vec::with_capacity(requested);
        for candidate in candidates {
            if let Err(err) = inner.check_write() {
                if inserted.is_empty() {
                    return Err(err.into());
                }
                return Err(StorageError::PartialInsert {
                    inserted,
                    requested,
                    source: Box::new(err),
                }
                .into());
            }
            let candidate = Candidate::with_new_id(candidate);
            inserted.push(candidate.id);
            inner.candidates.push(candidate);
        }
        Ok(inserted)
    }

    async fn record_vote(&self, event_id: Id, ballot_index: u32) -> Result<Candidate> {
        let mut inner = self.lock();
        inner.check_write()?;
        let candidate = inner
            .candidates
            .iter_mut()
            .find(|c| c.event_ref == event_id && c.ballot_index == ballot_index)
            .ok_or_else(|| {
                Error::not_found(format!("Candidate {ballot_index} in event {event_id}"))
            })?;
        candidate.vote_count += 1;
        Ok(candidate.clone())
    }
}

#[rocket::async_trait]
impl EventRepository for MemoryStore {
    async fn create(&self, name: &str) -> Result<Event> {
        let mut inner = self.lock();
        inner.check_write()?;
        let event = Event {
            id: Id::new(),
            event: EventCore::new(name),
        };
        inner.events.push(event.clone());
        debug!("Created event {} in memory", event.id);
        Ok(event)
    }

    async fn attach_candidates(&self, event_id: Id, candidate_refs: Vec<Id>) -> Result<Event> {
        let mut inner = self.lock();
        inner.check_write()?;
        let event = inner
            .events
            .iter_mut()
            .find(|event| event.id == event_id)
            .ok_or_else(|| Error::not_found(format!("Event {event_id}")))?;
        event.candidate_refs = candidate_refs;
        Ok(event.clone())
    }

    async fn find_by_id_with_candidates(&self, event_id: Id) -> Result<EventWithCandidates> {
        let inner = self.lock();
        inner.check_read()?;
        inner
            .events
            .iter()
            .find(|event| event.id == event_id)
            .map(|event| inner.expand(event))
            .ok_or_else(|| Error::not_found(format!("Event {event_id}")))
    }

    async fn find_all_with_candidates(&self) -> Result<Vec<EventWithCandidates>> {
        let inner = self.lock();
        inner.check_read()?;
        Ok(inner.events.iter().map(|event| inner.expand(event)).collect())
    }
}
