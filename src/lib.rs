#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::repository::Repositories;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod repository;
pub mod service;

pub use config::Config;

/// Build the server, backed by the MongoDB database named in the configuration.
pub fn build() -> Rocket<Build> {
    base().attach(DatabaseFairing)
}

/// Build the server around an existing set of repositories.
pub fn rocket_for_repositories(repositories: Repositories) -> Rocket<Build> {
    base().manage(repositories)
}

fn base() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
}

/// Connect to the database named by `db_uri`, for tests that need a real server.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database with `db_uri` {db_uri:?}: {e}"))
}
