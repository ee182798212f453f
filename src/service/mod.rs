//! Operations composed from the repositories, producing the view models the API serves.

mod admin;
mod election;

pub use admin::AdminService;
pub use election::ElectionService;
