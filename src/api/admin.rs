use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    api::session::AdminSession,
    error::{Error, Result},
    model::admin::{AdminCredentials, AdminIdentity, NewAdmin},
    repository::Repositories,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![home, register, authenticate, logout]
}

/// Who is signed in. The name is empty when nobody is.
#[get("/")]
pub async fn home(session: Option<AdminSession>) -> Json<AdminIdentity> {
    let full_name = session
        .map(|AdminSession(identity)| identity.full_name)
        .unwrap_or_default();
    Json(AdminIdentity { full_name })
}

#[post("/admins", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<NewAdmin>,
    repositories: &State<Repositories>,
) -> Result<Status> {
    repositories
        .administrators()
        .register(registration.into_inner())
        .await?;
    Ok(Status::Created)
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    repositories: &State<Repositories>,
    config: &State<Config>,
) -> Result<Json<AdminIdentity>> {
    let identity = repositories
        .administrators()
        .authenticate(&credentials.national_id, &credentials.credential_secret)
        .await?
        .ok_or_else(|| Error::Unauthorized("Credenciales incorrectas".to_string()))?;

    AdminSession::start(&identity, cookies, config);
    Ok(Json(identity))
}

#[post("/auth/logout")]
pub async fn logout(cookies: &CookieJar<'_>) -> Status {
    AdminSession::end(cookies);
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType, local::asynchronous::Client, serde::json::serde_json::json,
    };

    use crate::api::session::ADMIN_COOKIE;
    use crate::repository::{AdminRepository, MemoryStore};

    use super::*;

    #[backend_test]
    async fn register_then_sign_in(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(NewAdmin::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        assert!(store
            .find_by_credentials("11111111-1", "pw1")
            .await
            .unwrap()
            .is_some());

        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get_private(ADMIN_COOKIE).is_some());

        let identity = response.into_json::<AdminIdentity>().await.unwrap();
        assert_eq!(identity.full_name, "Juan Pérez");
    }

    #[backend_test]
    async fn wrong_secret_is_rejected(client: Client, store: MemoryStore) {
        store.register(NewAdmin::example()).await.unwrap();

        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::wrong_secret()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get_private(ADMIN_COOKIE));
    }

    #[backend_test]
    async fn home_is_anonymous_by_default(client: Client) {
        let response = client.get(uri!(home)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let identity = response.into_json::<AdminIdentity>().await.unwrap();
        assert_eq!(identity.full_name, "");
    }

    #[backend_test(admin)]
    async fn home_greets_signed_in_admin(client: Client) {
        let identity = client
            .get(uri!(home))
            .dispatch()
            .await
            .into_json::<AdminIdentity>()
            .await
            .unwrap();
        assert_eq!(identity.full_name, "Juan Pérez");
    }

    #[backend_test(admin)]
    async fn logout_ends_session(client: Client) {
        let response = client.post(uri!(logout)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get_private(ADMIN_COOKIE));

        let identity = client
            .get(uri!(home))
            .dispatch()
            .await
            .into_json::<AdminIdentity>()
            .await
            .unwrap();
        assert_eq!(identity.full_name, "");
    }

    #[backend_test]
    async fn registration_failure_is_server_error(client: Client, store: MemoryStore) {
        store.limit_writes(Some(0));
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(NewAdmin::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::InternalServerError, response.status());
    }
}
