use super::models::{Donation, Listing};
use crate::gateway::{ApiRequest, AuthGateway};
use crate::Result;

pub struct DonationsApi<'a> {
    gateway: &'a AuthGateway,
    mine: &'a str,
}

impl<'a> DonationsApi<'a> {
    pub fn new(gateway: &'a AuthGateway, mine: &'a str) -> Self {
        Self { gateway, mine }
    }

    /// Donations made by the signed-in user.
    pub async fn mine(&self) -> Result<Vec<Donation>> {
        let listing: Listing<Donation> = self.gateway.fetch(ApiRequest::get(self.mine)).await?;
        Ok(listing.into_vec())
    }
}
