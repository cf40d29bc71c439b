//! HTTP plumbing
//!
//! `Backend` is the raw transport and the single place backend responses
//! become typed errors. `AuthGateway` layers credentials and token refresh
//! on top of it.

mod backend;
mod secure;

pub use backend::{ApiRequest, ApiResponse, Backend};
pub use secure::AuthGateway;
