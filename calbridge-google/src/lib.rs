//! Google implementations of the calbridge backend traits.
//!
//! - `GoogleCalendarApi`: events insert/list/delete over the Calendar v3 REST API
//! - `GoogleTokenSource`: refresh-token and service-account (JWT bearer) grants
//! - `BootstrapKey`: service-account keys and OAuth client secrets

pub mod api;
pub mod keys;
pub mod token;

pub use api::{DEFAULT_API_BASE, DEFAULT_CALENDAR_ID, GoogleCalendarApi};
pub use keys::{BootstrapKey, OAuthClient, ServiceAccountKey};
pub use token::GoogleTokenSource;
