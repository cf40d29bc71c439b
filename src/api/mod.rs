//! Typed access to the NGOConnect resources
//!
//! Every call here goes through the [`AuthGateway`](crate::gateway::AuthGateway),
//! so it carries the current access token and survives token expiry.

mod campaigns;
mod donations;
pub mod models;
mod users;
mod volunteers;

pub use campaigns::CampaignsApi;
pub use donations::DonationsApi;
pub use models::*;
pub use users::UsersApi;
pub use volunteers::VolunteersApi;

/// `base` joined with a relative segment, keeping the trailing slash the
/// backend routes expect.
pub(crate) fn sub_path(base: &str, segment: impl std::fmt::Display) -> String {
    format!("{}/{}/", base.trim_end_matches('/'), segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_path() {
        assert_eq!(sub_path("/api/projects/campaigns/", "clean-water"), "/api/projects/campaigns/clean-water/");
        assert_eq!(sub_path("/api/user/admin/users", 42), "/api/user/admin/users/42/");
        assert_eq!(sub_path("/api/volunteer/", "admin/list"), "/api/volunteer/admin/list/");
    }
}
