//! Domain types, their database representation, and the view models built from them.

pub mod admin;
pub mod candidate;
pub mod election;
pub mod event;
pub mod mongodb;
