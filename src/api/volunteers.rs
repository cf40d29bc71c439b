use serde_json::json;
use tracing::info;

use super::models::{
    ApplicationStatus, Listing, NewTimeLog, TimeLog, VolunteerApplication, VolunteerProfile,
    VolunteerProfileUpdate,
};
use super::sub_path;
use crate::gateway::{ApiRequest, AuthGateway};
use crate::Result;

pub struct VolunteersApi<'a> {
    gateway: &'a AuthGateway,
    base: &'a str,
}

impl<'a> VolunteersApi<'a> {
    pub fn new(gateway: &'a AuthGateway, base: &'a str) -> Self {
        Self { gateway, base }
    }

    pub async fn apply(&self, application: &VolunteerApplication) -> Result<VolunteerProfile> {
        let profile = self
            .gateway
            .fetch(ApiRequest::post(sub_path(self.base, "apply")).json(application)?)
            .await?;
        info!("Volunteer application submitted");
        Ok(profile)
    }

    pub async fn profile(&self) -> Result<VolunteerProfile> {
        self.gateway
            .fetch(ApiRequest::get(sub_path(self.base, "profile")))
            .await
    }

    pub async fn update_profile(&self, update: &VolunteerProfileUpdate) -> Result<VolunteerProfile> {
        self.gateway
            .fetch(ApiRequest::patch(sub_path(self.base, "profile")).json(update)?)
            .await
    }

    pub async fn time_logs(&self) -> Result<Vec<TimeLog>> {
        let listing: Listing<TimeLog> = self
            .gateway
            .fetch(ApiRequest::get(sub_path(self.base, "time-logs")))
            .await?;
        Ok(listing.into_vec())
    }

    /// Records worked hours. Rejected locally when the end precedes the start.
    pub async fn log_time(&self, entry: &NewTimeLog) -> Result<TimeLog> {
        entry.validate()?;
        self.gateway
            .fetch(ApiRequest::post(sub_path(self.base, "time-logs")).json(entry)?)
            .await
    }

    /// Applications awaiting review (or already decided), for managers.
    pub async fn list_applications(&self, status: ApplicationStatus) -> Result<Vec<VolunteerProfile>> {
        let request = ApiRequest::get(sub_path(self.base, "admin/list")).query("status", status.as_str());
        let listing: Listing<VolunteerProfile> = self.gateway.fetch(request).await?;
        Ok(listing.into_vec())
    }

    pub async fn set_application_status(&self, volunteer_id: i64, status: ApplicationStatus) -> Result<()> {
        let request = ApiRequest::patch(sub_path(self.base, format!("admin/{}", volunteer_id)))
            .body(json!({ "application_status": status }));
        self.gateway.execute(request).await?;
        info!(volunteer_id, status = status.as_str(), "Volunteer application status changed");
        Ok(())
    }
}
