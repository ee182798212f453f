use rocket::Route;

pub mod admin;
pub mod election;
pub mod session;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(election::routes());
    routes
}
