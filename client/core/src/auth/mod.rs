//! Credential Lifecycle
//!
//! Keeps a short-lived access credential valid for outgoing requests.
//!
//! - [`CredentialManager`]: owns the credential, renews on demand, single-flight
//! - [`CredentialRenewer`]: one renewal call ([`HttpCredentialRenewer`] in production)
//! - [`CredentialStore`]: host persistence, treated as an opaque get/set pair
//! - [`Clock`]: time source for expiry checks

mod credential;
mod manager;
mod renewer;

pub use credential::{
    Clock, Credential, CredentialStore, ManualClock, MemoryCredentialStore, SystemClock,
};
pub use manager::{CredentialManager, DEFAULT_RENEWAL_BUFFER};
pub use renewer::{CredentialRenewer, HttpCredentialRenewer, RenewedCredential};
