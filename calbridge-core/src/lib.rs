//! Core types for calbridge.
//!
//! - `credential`, `store`, `manager`: the credential lifecycle (load from a
//!   backing, refresh on expiry, write back to the same backing)
//! - `calendar`: calendar operations over a pluggable backend
//! - `protocol`: tool request/response envelopes

pub mod calendar;
pub mod credential;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod store;

pub use calendar::{CalendarBackend, CalendarClient, CreatedEvent, EventSummary, ListQuery, NewEvent};
pub use credential::{Backing, CredentialRecord, GrantKind, TokenGrant};
pub use error::{
    BackendError, CalBridgeError, CalBridgeResult, ConfigError, CredentialError, StoreError,
    ValidationError,
};
pub use manager::{CredentialManager, TokenSource};
pub use protocol::{ToolRequest, ToolResponse};
pub use store::{CredentialStore, EnvStore, FileStore};
