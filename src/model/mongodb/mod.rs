mod bson;
mod collection;

pub use bson::Id;
pub use collection::{
    ensure_indexes_exist, Coll, MongoCollection, ADMINISTRATORS, CANDIDATES, EVENTS,
};
