use log::{debug, error};
use mongodb::{bson::de::Error as BsonDecodeError, error::Error as DbError};
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        Self::Storage(err.into())
    }
}

impl From<BsonDecodeError> for Error {
    fn from(err: BsonDecodeError) -> Self {
        Self::Storage(err.into())
    }
}

/// Failures of the underlying document store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Malformed document: {0}")]
    Decode(#[from] BsonDecodeError),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// A bulk insert stopped part way. `inserted` lists the documents that
    /// were written, in input order.
    #[error("Inserted {} of {requested} documents before failing: {source}", .inserted.len())]
    PartialInsert {
        inserted: Vec<Id>,
        requested: usize,
        source: Box<StorageError>,
    },
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match self {
            Self::Storage(ref err) => {
                error!("{err}");
                Status::InternalServerError
            }
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
        };
        if status != Status::InternalServerError {
            debug!("{self}");
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_insert_reports_progress() {
        let err = StorageError::PartialInsert {
            inserted: vec![Id::new(), Id::new()],
            requested: 3,
            source: Box::new(StorageError::Unavailable("write refused".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Inserted 2 of 3 documents before failing: Store unavailable: write refused"
        );
    }
}
