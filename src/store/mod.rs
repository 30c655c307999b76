//! Token storage and lifecycle for the authenticated WHOOP identity.

pub mod credentials;
pub mod lifecycle;
pub mod refresh;

pub use credentials::{CredentialStatus, CredentialStore, TokenRecord, DEFAULT_IDENTITY};
pub use lifecycle::{TokenManager, DEFAULT_SKEW};
pub use refresh::spawn_refresh_daemon;
