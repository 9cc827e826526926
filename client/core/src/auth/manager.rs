//! Credential Lifecycle Manager
//!
//! Owns the current credential and its expiry and hands out copies of it.
//! When no usable credential exists it renews, and concurrent callers share
//! a single renewal.
//!
//! # Single-flight
//!
//! ```text
//!   caller A ──┐                          ┌──> Ok(cred) / Err(e)
//!   caller B ──┼──> in_flight: Shared ────┼──> Ok(cred) / Err(e)
//!   caller C ──┘    (one renewer call)    └──> Ok(cred) / Err(e)
//! ```
//!
//! The credential and the in-flight renewal live under one lock, so a caller
//! can never see "nothing usable and nothing in flight" while a renewal is
//! publishing its result.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::credential::{Clock, Credential, CredentialStore, SystemClock};
use super::renewer::CredentialRenewer;
use crate::error::RenewalError;

/// Default time before expiry at which a credential stops being usable
pub const DEFAULT_RENEWAL_BUFFER: Duration = Duration::from_secs(300);

type RenewalFuture = Shared<BoxFuture<'static, Result<Credential, RenewalError>>>;

/// State guarded by a single lock
#[derive(Default)]
struct AuthState {
    /// Current credential, usable or not
    credential: Option<Credential>,
    /// Renewal in flight, shared by every waiter
    in_flight: Option<RenewalFuture>,
    /// Bumped on every save/clear so a stale renewal cannot overwrite them
    epoch: u64,
}

struct Inner {
    renewer: Arc<dyn CredentialRenewer>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    renewal_buffer: Duration,
    state: Mutex<AuthState>,
}

/// Owns the access credential and coalesces renewals
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

impl CredentialManager {
    /// Create a manager, seeding the credential from the host store
    pub fn new(renewer: Arc<dyn CredentialRenewer>, store: Arc<dyn CredentialStore>) -> Self {
        Self::with_clock(renewer, store, Arc::new(SystemClock), DEFAULT_RENEWAL_BUFFER)
    }

    /// Create a manager with an explicit clock and renewal buffer
    pub fn with_clock(
        renewer: Arc<dyn CredentialRenewer>,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        renewal_buffer: Duration,
    ) -> Self {
        let credential = store.load();
        Self {
            inner: Arc::new(Inner {
                renewer,
                store,
                clock,
                renewal_buffer,
                state: Mutex::new(AuthState {
                    credential,
                    in_flight: None,
                    epoch: 0,
                }),
            }),
        }
    }

    /// Snapshot of the current credential, usable or not
    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.inner.state.lock().credential.clone()
    }

    /// Whether a renewal is currently running
    #[must_use]
    pub fn is_renewing(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    /// Store a new credential valid for `ttl_seconds`
    pub fn save(&self, value: impl Into<String>, ttl_seconds: u64) -> Credential {
        let credential = Credential::with_ttl(
            value,
            self.inner.clock.now_ms(),
            Duration::from_secs(ttl_seconds),
        );
        {
            let mut state = self.inner.state.lock();
            state.credential = Some(credential.clone());
            state.epoch += 1;
        }
        self.inner.store.save(&credential);
        tracing::debug!(expires_at_ms = credential.expires_at_ms, "Credential saved");
        credential
    }

    /// Discard the credential (logout or unrecoverable failure)
    pub fn clear(&self) {
        {
            let mut state = self.inner.state.lock();
            state.credential = None;
            state.epoch += 1;
        }
        self.inner.store.clear();
        tracing::debug!("Credential cleared");
    }

    /// Return a usable credential, renewing if necessary
    ///
    /// `None` means renewal failed; the caller decides whether to continue
    /// unauthenticated or send the user back to sign in.
    pub async fn get_valid_credential(&self) -> Option<Credential> {
        match self.renew_if_needed(false).await {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::warn!(error = %e, "Credential renewal failed");
                None
            }
        }
    }

    /// Renew now, joining any renewal already in flight
    ///
    /// # Errors
    ///
    /// Returns the renewal error shared by every caller of this attempt.
    pub async fn renew(&self) -> Result<Credential, RenewalError> {
        self.renew_if_needed(true).await
    }

    async fn renew_if_needed(&self, force: bool) -> Result<Credential, RenewalError> {
        let flight = {
            let mut state = self.inner.state.lock();

            if !force {
                let now = self.inner.clock.now_ms();
                if let Some(ref credential) = state.credential {
                    if credential.is_usable(now, self.inner.renewal_buffer) {
                        return Ok(credential.clone());
                    }
                }
            }

            if let Some(ref flight) = state.in_flight {
                tracing::trace!("Joining renewal in flight");
                flight.clone()
            } else {
                let flight = Self::start_renewal(Arc::clone(&self.inner), state.epoch);
                state.in_flight = Some(flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Build the shared renewal future
    ///
    /// The future publishes its own outcome and clears `in_flight`, so the
    /// bookkeeping runs exactly once no matter how many callers await it.
    fn start_renewal(inner: Arc<Inner>, epoch: u64) -> RenewalFuture {
        async move {
            tracing::debug!("Renewing credential");
            let result = inner.renewer.renew().await;
            let now = inner.clock.now_ms();

            let mut state = inner.state.lock();
            state.in_flight = None;

            match result {
                Ok(renewed) => {
                    let credential = Credential::with_ttl(
                        renewed.access_token,
                        now,
                        Duration::from_secs(renewed.expires_in),
                    );
                    if state.epoch == epoch {
                        state.credential = Some(credential.clone());
                        state.epoch += 1;
                        drop(state);
                        inner.store.save(&credential);
                    }
                    tracing::debug!(
                        expires_at_ms = credential.expires_at_ms,
                        "Credential renewed"
                    );
                    Ok(credential)
                }
                Err(e) => {
                    if state.epoch == epoch {
                        state.credential = None;
                        state.epoch += 1;
                        drop(state);
                        inner.store.clear();
                    }
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CredentialManager")
            .field("credential", &state.credential)
            .field("renewing", &state.in_flight.is_some())
            .field("renewal_buffer", &self.inner.renewal_buffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::auth::credential::{ManualClock, MemoryCredentialStore};
    use crate::auth::renewer::RenewedCredential;

    const NOW: u64 = 1_700_000_000_000;

    /// Renewer that blocks until released and counts calls
    struct GatedRenewer {
        calls: AtomicUsize,
        gate: Notify,
        fail: bool,
    }

    impl GatedRenewer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                fail,
            })
        }
    }

    #[async_trait]
    impl CredentialRenewer for GatedRenewer {
        async fn renew(&self) -> Result<RenewedCredential, RenewalError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.gate.notified().await;
            if self.fail {
                Err(RenewalError::Rejected { status: 401 })
            } else {
                Ok(RenewedCredential {
                    access_token: format!("token-{call}"),
                    expires_in: 1800,
                    refresh_token: None,
                })
            }
        }
    }

    fn manager(renewer: Arc<GatedRenewer>) -> (CredentialManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let manager = CredentialManager::with_clock(
            renewer,
            Arc::new(MemoryCredentialStore::new()),
            clock.clone(),
            DEFAULT_RENEWAL_BUFFER,
        );
        (manager, clock)
    }

    #[tokio::test]
    async fn test_usable_credential_returned_without_renewal() {
        let renewer = GatedRenewer::new(false);
        let (manager, _) = manager(renewer.clone());

        manager.save("fresh", 1800);
        let credential = manager.get_valid_credential().await.unwrap();

        assert_eq!(credential.value, "fresh");
        assert_eq!(credential.expires_at_ms, NOW + 1_800_000);
        assert_eq!(renewer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_credential_inside_buffer_triggers_renewal() {
        let renewer = GatedRenewer::new(false);
        let (manager, _) = manager(renewer.clone());

        // Expires in 60s, buffer is 300s
        manager.save("stale", 60);

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.get_valid_credential().await }
        });
        while renewer.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        renewer.gate.notify_one();

        let credential = pending.await.unwrap().unwrap();
        assert_eq!(credential.value, "token-1");
        assert_eq!(manager.current().unwrap().value, "token-1");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_renewal() {
        let renewer = GatedRenewer::new(false);
        let (manager, _) = manager(renewer.clone());

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_valid_credential().await })
            })
            .collect();

        // Let every caller reach the in-flight renewal
        while renewer.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert!(manager.is_renewing());
        renewer.gate.notify_one();

        for caller in callers {
            let credential = caller.await.unwrap().unwrap();
            assert_eq!(credential.value, "token-1");
        }
        assert_eq!(renewer.calls.load(Ordering::SeqCst), 1);
        assert!(!manager.is_renewing());
    }

    #[tokio::test]
    async fn test_renewal_failure_shared_and_clears_credential() {
        let renewer = GatedRenewer::new(true);
        let (manager, clock) = manager(renewer.clone());

        manager.save("old", 600);
        clock.advance(Duration::from_secs(400));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.renew_if_needed(false).await }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.renew_if_needed(false).await }
        });

        while renewer.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        renewer.gate.notify_one();

        let expected = RenewalError::Rejected { status: 401 };
        assert_eq!(first.await.unwrap().unwrap_err(), expected);
        assert_eq!(second.await.unwrap().unwrap_err(), expected);
        assert_eq!(renewer.calls.load(Ordering::SeqCst), 1);
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn test_next_call_after_failure_starts_new_attempt() {
        let renewer = GatedRenewer::new(true);
        let (manager, _) = manager(renewer.clone());

        for attempt in 1..=2 {
            let pending = tokio::spawn({
                let manager = manager.clone();
                async move { manager.get_valid_credential().await }
            });
            while renewer.calls.load(Ordering::SeqCst) < attempt {
                tokio::task::yield_now().await;
            }
            renewer.gate.notify_one();
            assert!(pending.await.unwrap().is_none());
        }
        assert_eq!(renewer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_during_renewal_wins() {
        let renewer = GatedRenewer::new(false);
        let (manager, _) = manager(renewer.clone());

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.renew().await }
        });
        while renewer.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Logout while the renewal is on the wire
        manager.clear();
        renewer.gate.notify_one();

        assert!(pending.await.unwrap().is_ok());
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_seeded_from_store() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.save(&Credential::with_ttl("persisted", NOW, Duration::from_secs(60)));

        let manager = CredentialManager::new(GatedRenewer::new(false), store.clone());
        assert_eq!(manager.current().unwrap().value, "persisted");

        manager.clear();
        assert!(store.load().is_none());
    }
}
