use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core administrator data, as stored in the database.
///
/// The credential secret is kept and compared in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub full_name: String,
    pub national_id: String,
    pub credential_secret: String,
}

/// An administrator without an ID. Also the body of a registration request.
pub type NewAdmin = AdminCore;

/// An administrator from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Admin {
    /// The identity handed to the session once this administrator has signed in.
    pub fn identity(&self) -> AdminIdentity {
        AdminIdentity {
            full_name: self.full_name.clone(),
        }
    }
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Sign-in credentials, received from a user.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub national_id: String,
    pub credential_secret: String,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub full_name: String,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCore {
        pub fn example() -> Self {
            Self {
                full_name: "Juan Pérez".to_string(),
                national_id: "11111111-1".to_string(),
                credential_secret: "pw1".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                full_name: "María González".to_string(),
                national_id: "22222222-2".to_string(),
                credential_secret: "pw2".to_string(),
            }
        }
    }

    impl AdminCredentials {
        pub fn example() -> Self {
            Self {
                national_id: "11111111-1".into(),
                credential_secret: "pw1".into(),
            }
        }

        pub fn wrong_secret() -> Self {
            Self {
                national_id: "11111111-1".into(),
                credential_secret: "wrong".into(),
            }
        }
    }
}
