use log::{debug, warn};
use mongodb::{
    bson::{doc, from_bson, from_document, oid::ObjectId, Document},
    error::{Error as DbError, ErrorKind},
    options::{FindOneAndUpdateOptions, InsertManyOptions, ReturnDocument},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result, StorageError};
use crate::model::{
    admin::{Admin, NewAdmin},
    candidate::{Candidate, NewCandidate},
    event::{Event, EventCore, EventWithCandidates},
    mongodb::{Coll, Id, CANDIDATES},
};

use super::{AdminRepository, CandidateRepository, EventRepository};

/// Administrators stored in MongoDB.
#[derive(Clone)]
pub struct MongoAdmins {
    admins: Coll<Admin>,
}

impl MongoAdmins {
    pub fn from_db(db: &Database) -> Self {
        Self {
            admins: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl AdminRepository for MongoAdmins {
    async fn register(&self, admin: NewAdmin) -> Result<Admin> {
        let admin = Admin { id: Id::new(), admin };
        self.admins.insert_one(&admin, None).await?;
        debug!("Registered administrator {}", admin.id);
        Ok(admin)
    }

    async fn find_by_credentials(
        &self,
        national_id: &str,
        credential_secret: &str,
    ) -> Result<Option<Admin>> {
        let filter = doc! {
            "national_id": national_id,
            "credential_secret": credential_secret,
        };
        Ok(self.admins.find_one(filter, None).await?)
    }
}

/// Candidates stored in MongoDB.
#[derive(Clone)]
pub struct MongoCandidates {
    candidates: Coll<Candidate>,
}

impl MongoCandidates {
    pub fn from_db(db: &Database) -> Self {
        Self {
            candidates: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl CandidateRepository for MongoCandidates {
    async fn create_many(&self, candidates: Vec<NewCandidate>) -> Result<Vec<Id>> {
        // The driver refuses an empty batch.
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = candidates
            .into_iter()
            .map(Candidate::with_new_id)
            .collect::<Vec<_>>();
        let ids = candidates.iter().map(|c| c.id).collect::<Vec<_>>();

        // Ordered, so a failure at index `i` means exactly `0..i` were written.
        let options = InsertManyOptions::builder().ordered(true).build();
        match self.candidates.insert_many(&candidates, options).await {
            Ok(_) => Ok(ids),
            Err(err) => Err(partial_insert(err, ids).into()),
        }
    }

    async fn record_vote(&self, event_id: Id, ballot_index: u32) -> Result<Candidate> {
        let filter = doc! {
            "event_ref": *event_id,
            "ballot_index": i64::from(ballot_index),
        };
        let update = doc! {
            "$inc": { "vote_count": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.candidates
            .find_one_and_update(filter, update, options)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("Candidate {ballot_index} in event {event_id}"))
            })
    }
}

/// Work out how much of an ordered bulk insert landed before it failed.
fn partial_insert(err: DbError, ids: Vec<Id>) -> StorageError {
    let written = match *err.kind {
        ErrorKind::BulkWrite(ref failure) => failure
            .write_errors
            .as_ref()
            .and_then(|errors| errors.iter().map(|e| e.index).min()),
        _ => None,
    };
    match written {
        Some(count) if count > 0 => {
            let requested = ids.len();
            let mut inserted = ids;
            inserted.truncate(count);
            warn!("Bulk insert stopped after {count} of {requested} documents");
            StorageError::PartialInsert {
                inserted,
                requested,
                source: Box::new(err.into()),
            }
        }
        _ => err.into(),
    }
}

/// Events stored in MongoDB.
#[derive(Clone)]
pub struct MongoEvents {
    events: Coll<Event>,
}

impl MongoEvents {
    pub fn from_db(db: &Database) -> Self {
        Self {
            events: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl EventRepository for MongoEvents {
    async fn create(&self, name: &str) -> Result<Event> {
        let event = Event {
            id: Id::new(),
            event: EventCore::new(name),
        };
        self.events.insert_one(&event, None).await?;
        debug!("Created event {}", event.id);
        Ok(event)
    }

    async fn attach_candidates(&self, event_id: Id, candidate_refs: Vec<Id>) -> Result<Event> {
        let refs = candidate_refs
            .into_iter()
            .map(ObjectId::from)
            .collect::<Vec<_>>();
        let update = doc! {
            "$set": { "candidate_refs": refs }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.events
            .find_one_and_update(event_id.as_doc(), update, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Event {event_id}")))
    }

    async fn find_by_id_with_candidates(&self, event_id: Id) -> Result<EventWithCandidates> {
        let document = self
            .events
            .aggregate(expand_candidates(event_id.as_doc()), None)
            .await?
            .try_next()
            .await?
            .ok_or_else(|| Error::not_found(format!("Event {event_id}")))?;
        decode_expanded(document)
    }

    async fn find_all_with_candidates(&self) -> Result<Vec<EventWithCandidates>> {
        let documents: Vec<Document> = self
            .events
            .aggregate(expand_candidates(doc! {}), None)
            .await?
            .try_collect()
            .await?;
        documents.into_iter().map(decode_expanded).collect()
    }
}

/// Pipeline selecting events by `filter` in insertion order, joining each
/// candidate reference into a `candidates` array.
fn expand_candidates(filter: Document) -> Vec<Document> {
    vec![
        doc! { "$match": filter },
        doc! { "$sort": { "created_at": 1, "_id": 1 } },
        doc! {
            "$lookup": {
                "from": CANDIDATES,
                "localField": "candidate_refs",
                "foreignField": "_id",
                "as": "candidates",
            }
        },
    ]
}

fn decode_expanded(mut document: Document) -> Result<EventWithCandidates> {
    let resolved = match document.remove("candidates") {
        Some(candidates) => from_bson::<Vec<Candidate>>(candidates)?,
        None => Vec::new(),
    };
    let event = from_document::<Event>(document)?;
    Ok(EventWithCandidates::from_lookup(event, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    use crate::model::candidate::CandidateCore;

    #[test]
    fn pipeline_joins_candidates_after_sorting() {
        let pipeline = expand_candidates(doc! {});
        let stages = pipeline
            .iter()
            .filter_map(|stage| stage.keys().next().cloned())
            .collect::<Vec<_>>();
        assert_eq!(stages, vec!["$match", "$sort", "$lookup"]);
        let lookup = pipeline[2].get_document("$lookup").unwrap();
        assert_eq!(lookup.get_str("from").unwrap(), CANDIDATES);
    }

    #[test]
    fn decodes_lookup_output_in_reference_order() {
        let event_id = Id::new();
        let ballot = CandidateCore::ballot(event_id, ["Ana", "Luis"])
            .into_iter()
            .map(Candidate::with_new_id)
            .collect::<Vec<_>>();
        let mut event = Event {
            id: event_id,
            event: EventCore::new("Mesa 1"),
        };
        event.candidate_refs = ballot.iter().map(|c| c.id).collect();

        let mut document = mongodb::bson::to_document(&event).unwrap();
        let reversed = ballot.iter().rev().collect::<Vec<_>>();
        document.insert("candidates", mongodb::bson::to_bson(&reversed).unwrap());

        let expanded = decode_expanded(document).unwrap();
        assert_eq!(expanded.event, event);
        assert_eq!(expanded.candidates, ballot);
    }

    #[backend_test(mongo)]
    async fn admin_lookup_requires_both_fields(db: Database) {
        let admins = MongoAdmins::from_db(&db);
        let juan = admins.register(NewAdmin::example()).await.unwrap();

        let found = admins
            .find_by_credentials("11111111-1", "pw1")
            .await
            .unwrap();
        assert_eq!(found, Some(juan));

        for (national_id, secret) in [("11111111-1", "wrong"), ("11111111", "pw1"), ("", "")] {
            let found = admins.find_by_credentials(national_id, secret).await.unwrap();
            assert_eq!(found, None);
        }
    }

    #[backend_test(mongo)]
    async fn two_phase_create_round_trip(db: Database) {
        let events = MongoEvents::from_db(&db);
        let candidates = MongoCandidates::from_db(&db);

        let event = events.create("Mesa 1").await.unwrap();

        // Between phases the event is readable with an empty ballot.
        let pending = events.find_by_id_with_candidates(event.id).await.unwrap();
        assert!(pending.candidates.is_empty());

        let ids = candidates
            .create_many(CandidateCore::ballot(event.id, ["Ana", "Luis"]))
            .await
            .unwrap();
        let linked = events.attach_candidates(event.id, ids.clone()).await.unwrap();
        assert_eq!(linked.candidate_refs, ids);

        let expanded = events.find_by_id_with_candidates(event.id).await.unwrap();
        let ballot = expanded
            .candidates
            .iter()
            .map(|c| (c.name.as_str(), c.ballot_index, c.vote_count))
            .collect::<Vec<_>>();
        assert_eq!(ballot, vec![("Ana", 1, 0), ("Luis", 2, 0)]);
        assert_eq!(expanded.created_at, event.created_at);
    }

    #[backend_test(mongo)]
    async fn find_all_keeps_insertion_order(db: Database) {
        let events = MongoEvents::from_db(&db);
        let mut created = Vec::new();
        for name in ["Mesa 1", "Mesa 2", "Mesa 3"] {
            created.push(events.create(name).await.unwrap().id);
        }

        let all = events.find_all_with_candidates().await.unwrap();
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), created);
    }

    #[backend_test(mongo)]
    async fn missing_event_is_not_found(db: Database) {
        let events = MongoEvents::from_db(&db);
        assert!(matches!(
            events.find_by_id_with_candidates(Id::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            events.attach_candidates(Id::new(), vec![]).await,
            Err(Error::NotFound(_))
        ));
    }

    #[backend_test(mongo)]
    async fn duplicate_ballot_index_reports_partial_insert(db: Database) {
        crate::model::mongodb::ensure_indexes_exist(&db).await.unwrap();
        let candidates = MongoCandidates::from_db(&db);
        let event_id = Id::new();

        let ballot = vec![
            CandidateCore::new("Ana", 1, event_id),
            CandidateCore::new("Luis", 2, event_id),
            CandidateCore::new("Luis otra vez", 2, event_id),
        ];
        match candidates.create_many(ballot).await {
            Err(Error::Storage(StorageError::PartialInsert {
                inserted,
                requested,
                ..
            })) => {
                assert_eq!(inserted.len(), 2);
                assert_eq!(requested, 3);
            }
            other => panic!("Expected a partial insert, got {other:?}"),
        }
    }

    #[backend_test(mongo)]
    async fn vote_increments_count(db: Database) {
        let candidates = MongoCandidates::from_db(&db);
        let event_id = Id::new();
        candidates
            .create_many(CandidateCore::ballot(event_id, ["Ana", "Luis"]))
            .await
            .unwrap();

        candidates.record_vote(event_id, 2).await.unwrap();
        let luis = candidates.record_vote(event_id, 2).await.unwrap();
        assert_eq!(luis.vote_count, 2);

        assert!(matches!(
            candidates.record_vote(event_id, 3).await,
            Err(Error::NotFound(_))
        ));
    }
}
