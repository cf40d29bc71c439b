use tracing::info;

use super::models::{Campaign, CampaignDraft, CampaignStatus, Listing};
use super::sub_path;
use crate::gateway::{ApiRequest, AuthGateway};
use crate::Result;

pub struct CampaignsApi<'a> {
    gateway: &'a AuthGateway,
    base: &'a str,
}

impl<'a> CampaignsApi<'a> {
    pub fn new(gateway: &'a AuthGateway, base: &'a str) -> Self {
        Self { gateway, base }
    }

    /// All campaigns, or only those in `status`.
    pub async fn list(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        let mut request = ApiRequest::get(self.base);
        if let Some(status) = status {
            request = request.query("status", status.as_str());
        }
        let listing: Listing<Campaign> = self.gateway.fetch(request).await?;
        Ok(listing.into_vec())
    }

    pub async fn get(&self, slug: &str) -> Result<Campaign> {
        self.gateway
            .fetch(ApiRequest::get(sub_path(self.base, slug)))
            .await
    }

    pub async fn create(&self, draft: &CampaignDraft) -> Result<Campaign> {
        let campaign: Campaign = self
            .gateway
            .fetch(ApiRequest::post(self.base).json(draft)?)
            .await?;
        info!(slug = %campaign.slug, "Campaign created");
        Ok(campaign)
    }

    pub async fn update(&self, slug: &str, draft: &CampaignDraft) -> Result<Campaign> {
        let campaign = self
            .gateway
            .fetch(ApiRequest::put(sub_path(self.base, slug)).json(draft)?)
            .await?;
        info!(%slug, "Campaign updated");
        Ok(campaign)
    }

    pub async fn delete(&self, slug: &str) -> Result<()> {
        self.gateway
            .execute(ApiRequest::delete(sub_path(self.base, slug)))
            .await?;
        info!(%slug, "Campaign deleted");
        Ok(())
    }
}
