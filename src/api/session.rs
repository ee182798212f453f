use rocket::{
    http::{Cookie, CookieJar, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};

use crate::{model::admin::AdminIdentity, Config};

/// Name of the private cookie holding the signed-in administrator's name.
pub const ADMIN_COOKIE: &str = "admin_name";

/// A signed-in administrator, recovered from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession(pub AdminIdentity);

impl AdminSession {
    /// Store the identity in the session.
    pub fn start(identity: &AdminIdentity, cookies: &CookieJar<'_>, config: &Config) {
        let cookie = Cookie::build(ADMIN_COOKIE, identity.full_name.clone())
            .max_age(Duration::seconds(config.session_ttl().into()))
            .finish();
        cookies.add_private(cookie);
    }

    /// Forget whoever is signed in.
    pub fn end(cookies: &CookieJar<'_>) {
        cookies.remove_private(Cookie::named(ADMIN_COOKIE));
    }

    /// The identity in the session, if any.
    pub fn current(cookies: &CookieJar<'_>) -> Option<Self> {
        cookies.get_private(ADMIN_COOKIE).map(|cookie| {
            Self(AdminIdentity {
                full_name: cookie.value().to_string(),
            })
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match Self::current(req.cookies()) {
            Some(session) => Outcome::Success(session),
            None => Outcome::Failure((Status::Unauthorized, ())),
        }
    }
}
