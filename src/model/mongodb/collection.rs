use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{admin::Admin, candidate::Candidate, event::Event};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Documents get their IDs client-side, so only the full types are stored.

pub const ADMINISTRATORS: &str = "administrators";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINISTRATORS;
}

pub const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

pub const EVENTS: &str = "events";
impl MongoCollection for Event {
    const NAME: &'static str = EVENTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Candidate collection: ballot positions are unique within an event.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"event_ref": 1, "ballot_index": 1})
        .options(IndexOptions::builder().unique(true).build())
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(ballot_index, None)
        .await?;

    // Administrator collection. Not unique: repeated registrations are accepted.
    let credentials_index = IndexModel::builder()
        .keys(doc! {"national_id": 1, "credential_secret": 1})
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(credentials_index, None)
        .await?;

    Ok(())
}
