use std::sync::Arc;

use log::info;

use crate::error::Result;
use crate::model::admin::{Admin, AdminIdentity, NewAdmin};
use crate::repository::AdminRepository;

/// Registration and sign-in of administrators.
///
/// Secrets are stored and compared in plaintext.
#[derive(Clone)]
pub struct AdminService {
    admins: Arc<dyn AdminRepository>,
}

impl AdminService {
    pub fn new(admins: Arc<dyn AdminRepository>) -> Self {
        Self { admins }
    }

    pub async fn register(&self, admin: NewAdmin) -> Result<Admin> {
        let admin = self.admins.register(admin).await?;
        info!("Registered administrator {}", admin.id);
        Ok(admin)
    }

    /// The identity to keep in the session, or `None` if the credentials match nobody.
    pub async fn authenticate(
        &self,
        national_id: &str,
        credential_secret: &str,
    ) -> Result<Option<AdminIdentity>> {
        let admin = self
            .admins
            .find_by_credentials(national_id, credential_secret)
            .await?;
        Ok(admin.as_ref().map(Admin::identity))
    }
}
