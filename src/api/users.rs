use tracing::{info, warn};

use super::models::{Listing, ManagedUser, PasswordReset, UserUpdate};
use super::sub_path;
use crate::gateway::{ApiRequest, AuthGateway};
use crate::Result;

/// Admin user management.
pub struct UsersApi<'a> {
    gateway: &'a AuthGateway,
    base: &'a str,
}

impl<'a> UsersApi<'a> {
    pub fn new(gateway: &'a AuthGateway, base: &'a str) -> Self {
        Self { gateway, base }
    }

    pub async fn list(&self) -> Result<Vec<ManagedUser>> {
        let listing: Listing<ManagedUser> = self.gateway.fetch(ApiRequest::get(self.base)).await?;
        Ok(listing.into_vec())
    }

    /// Applies `update`. When an admin changes their own role the session
    /// profile is reloaded so the new role takes effect immediately.
    pub async fn update(&self, user_id: i64, update: &UserUpdate) -> Result<ManagedUser> {
        let request = ApiRequest::patch(sub_path(self.base, user_id)).json(update)?;
        let user: ManagedUser = self.gateway.fetch(request).await?;
        info!(user_id, "User updated");

        let session = self.gateway.session();
        let is_self = session
            .profile()
            .await
            .map_or(false, |profile| profile.id == Some(user_id));
        if is_self && update.role.is_some() {
            if let Err(e) = session.refresh_profile().await {
                warn!(error = %e, "Own role changed but the profile could not be reloaded");
            }
        }

        Ok(user)
    }

    pub async fn delete(&self, user_id: i64) -> Result<()> {
        self.gateway
            .execute(ApiRequest::delete(sub_path(self.base, user_id)))
            .await?;
        info!(user_id, "User deleted");
        Ok(())
    }

    /// Sets a new password for `user_id`. Both fields must be present and
    /// equal; this is checked before anything is sent.
    pub async fn reset_password(&self, user_id: i64, reset: &PasswordReset) -> Result<()> {
        reset.validate()?;
        let request =
            ApiRequest::post(sub_path(self.base, format!("{}/reset-password", user_id))).json(reset)?;
        self.gateway.execute(request).await?;
        info!(user_id, "User password reset");
        Ok(())
    }
}
