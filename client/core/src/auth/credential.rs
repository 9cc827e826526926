//! Credential value, clock, and host storage

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A short-lived access credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token value
    pub value: String,
    /// Absolute expiry (Unix timestamp ms)
    pub expires_at_ms: u64,
}

impl Credential {
    /// Create a credential that expires `ttl` after `now_ms`
    #[must_use]
    pub fn with_ttl(value: impl Into<String>, now_ms: u64, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at_ms: now_ms.saturating_add(duration_ms(ttl)),
        }
    }

    /// Whether the credential can still be attached to a new request
    ///
    /// Usable only while `now < expires_at - buffer`, so a request that starts
    /// with it has time to complete before the server rejects it.
    #[must_use]
    pub fn is_usable(&self, now_ms: u64, buffer: Duration) -> bool {
        now_ms < self.expires_at_ms.saturating_sub(duration_ms(buffer))
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`
fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// Token values stay out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    /// Current Unix time in milliseconds
    fn now_ms(&self) -> u64;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        crate::messages::now_ms()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `now_ms`
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(duration_ms(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Host-owned persistence for the credential
///
/// An opaque get/set pair; the manager mirrors every change into it and
/// seeds itself from it on construction.
pub trait CredentialStore: Send + Sync {
    /// Load the persisted credential, if any
    fn load(&self) -> Option<Credential>;
    /// Persist a credential
    fn save(&self, credential: &Credential);
    /// Remove the persisted credential
    fn clear(&self);
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.slot.lock().clone()
    }

    fn save(&self, credential: &Credential) {
        *self.slot.lock() = Some(credential.clone());
    }

    fn clear(&self) {
        self.slot.lock().take();
    }
}
