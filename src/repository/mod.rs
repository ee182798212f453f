//! Persistence for administrators, candidates and events.
//!
//! Each repository is a trait so the services can run against MongoDB in
//! production and against [`MemoryStore`] in tests. No operation is
//! transactional: every call is an independent round trip to the store.

use std::sync::Arc;

use mongodb::Database;

use crate::error::Result;
use crate::model::{
    admin::{Admin, NewAdmin},
    candidate::{Candidate, NewCandidate},
    event::{Event, EventWithCandidates},
    mongodb::Id,
};
use crate::service::{AdminService, ElectionService};

pub use memory::MemoryStore;
pub use mongo::{MongoAdmins, MongoCandidates, MongoEvents};

mod memory;
mod mongo;

#[rocket::async_trait]
pub trait AdminRepository: Send + Sync {
    /// Store a new administrator. Duplicates are not checked for.
    async fn register(&self, admin: NewAdmin) -> Result<Admin>;

    /// Find the first administrator whose national ID and secret both match exactly.
    async fn find_by_credentials(
        &self,
        national_id: &str,
        credential_secret: &str,
    ) -> Result<Option<Admin>>;
}

#[rocket::async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Insert the candidates in order, returning their IDs in the same order.
    ///
    /// If the store fails part way, the error is a
    /// [`StorageError::PartialInsert`](crate::error::StorageError::PartialInsert)
    /// naming the candidates that were written.
    async fn create_many(&self, candidates: Vec<NewCandidate>) -> Result<Vec<Id>>;

    /// Add one vote to the candidate at `ballot_index` in the given event.
    async fn record_vote(&self, event_id: Id, ballot_index: u32) -> Result<Candidate>;
}

#[rocket::async_trait]
pub trait EventRepository: Send + Sync {
    /// Store a new event with no candidates.
    async fn create(&self, name: &str) -> Result<Event>;

    /// Overwrite the candidate references of an existing event.
    async fn attach_candidates(&self, event_id: Id, candidate_refs: Vec<Id>) -> Result<Event>;

    /// Fetch one event with its candidates expanded. Fails with `NotFound` if absent.
    async fn find_by_id_with_candidates(&self, event_id: Id) -> Result<EventWithCandidates>;

    /// Fetch every event with its candidates expanded, in insertion order.
    async fn find_all_with_candidates(&self) -> Result<Vec<EventWithCandidates>>;
}

/// The set of repositories backing the application, placed in managed state.
#[derive(Clone)]
pub struct Repositories {
    pub admins: Arc<dyn AdminRepository>,
    pub candidates: Arc<dyn CandidateRepository>,
    pub events: Arc<dyn EventRepository>,
}

impl Repositories {
    /// Repositories backed by the given MongoDB database.
    pub fn mongo(db: &Database) -> Self {
        Self {
            admins: Arc::new(MongoAdmins::from_db(db)),
            candidates: Arc::new(MongoCandidates::from_db(db)),
            events: Arc::new(MongoEvents::from_db(db)),
        }
    }

    /// Repositories sharing one in-memory store.
    pub fn memory(store: MemoryStore) -> Self {
        Self {
            admins: Arc::new(store.clone()),
            candidates: Arc::new(store.clone()),
            events: Arc::new(store),
        }
    }

    pub fn elections(&self) -> ElectionService {
        ElectionService::new(self.events.clone(), self.candidates.clone())
    }

    pub fn administrators(&self) -> AdminService {
        AdminService::new(self.admins.clone())
    }
}
