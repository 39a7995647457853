//! Session lifecycle: hydration, login, logout, and token renewal.
//!
//! `SessionManager` is the only writer of the session state and of the token
//! store. Every mutation commits inside one critical section, so readers
//! (through a [`SessionHandle`]) always see a state whose credentials and
//! claims come from the same exchange.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::backend::AuthBackend;
use super::codec::{self, Claims};
use super::error::AuthError;
use super::session::{CredentialPair, SessionState};
use super::store::TokenStore;
use crate::api::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default interval between background renewals.
/// Access tokens from the backend live for several minutes longer than this.
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(4 * 60);

/// Shown when registration fails without a usable message from the server
const REGISTRATION_FALLBACK_MESSAGE: &str = "Registration failed! Username may exist.";

/// Lifecycle settings for a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub renewal_interval: Duration,
    /// Renew once right after hydration instead of waiting for the first tick
    pub renew_on_start: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            renew_on_start: true,
        }
    }
}

/// Outcome of a renewal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    Renewed,
    LoggedOut,
    /// Another operation changed the session while the exchange was in flight;
    /// its result stands and the renewal result was discarded.
    Superseded,
    /// The session has not been hydrated yet; nothing was exchanged or written.
    Skipped,
}

// ============================================================================
// Session Handle
// ============================================================================

/// Read-only subscription to the session state.
/// Clone is cheap; every clone observes the same manager.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Copy of the current state
    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Run `f` against the current state without cloning it.
    /// Do not hold on to anything across an await inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.rx.borrow())
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    /// Wait for the next state change. Returns `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until hydration has finished
    pub async fn ready(&mut self) -> Option<SessionState> {
        self.rx
            .wait_for(|state| !state.is_initializing())
            .await
            .ok()
            .map(|state| state.clone())
    }
}

// ============================================================================
// Session Manager
// ============================================================================

struct Shared {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<SessionState>,
    /// Mutation lock. The counter is bumped by every commit so an operation
    /// that exchanged outside the lock can tell whether it was overtaken.
    epoch: tokio::sync::Mutex<u64>,
    /// Serializes renewals
    renewing: tokio::sync::Mutex<()>,
}

struct RenewalTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct SessionManager {
    shared: Arc<Shared>,
    renewal: Mutex<Option<RenewalTask>>,
}

impl SessionManager {
    /// Create a manager in the `Initializing` state. Nothing is loaded and
    /// no background task runs until [`hydrate`](Self::hydrate) and
    /// [`start_renewal`](Self::start_renewal), or use [`init`](Self::init).
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            shared: Arc::new(Shared {
                backend,
                store,
                state,
                epoch: tokio::sync::Mutex::new(0),
                renewing: tokio::sync::Mutex::new(()),
            }),
            renewal: Mutex::new(None),
        }
    }

    /// Create a manager, restore the stored session, and start background
    /// renewal. Must be called from within a Tokio runtime.
    pub async fn init(
        settings: SessionSettings,
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let manager = Self::new(backend, store);
        let state = manager.hydrate().await;
        if settings.renew_on_start && state.is_authenticated() {
            let outcome = manager.renew().await;
            debug!(?outcome, "Startup renewal finished");
        }
        manager.start_renewal(settings.renewal_interval);
        manager
    }

    pub fn subscribe(&self) -> SessionHandle {
        SessionHandle {
            rx: self.shared.state.subscribe(),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Restore the session from the token store.
    pub async fn hydrate(&self) -> SessionState {
        self.shared.hydrate().await
    }

    /// Exchange a username and password for a new session.
    ///
    /// On failure nothing is stored and an existing session is left as it
    /// was; the error carries a user-facing message.
    pub async fn login(&self, username: &str, password: &str) -> Result<Claims, AuthError> {
        self.shared.login(username, password).await
    }

    /// Create an account, then log into it.
    pub async fn register(&self, username: &str, password: &str) -> Result<Claims, AuthError> {
        if let Err(e) = self.shared.backend.create_user(username, password).await {
            warn!(error = %e, "Registration failed");
            return Err(AuthError::Registration(registration_message(&e)));
        }
        info!(username = %username, "Account created");
        self.login(username, password).await
    }

    /// Clear stored tokens and end the session. Safe to call at any time.
    pub async fn logout(&self) {
        self.shared.logout().await
    }

    /// Exchange the refresh token for a new access token. Any failure ends
    /// the session. Does nothing before [`hydrate`](Self::hydrate) or after
    /// the session has already ended.
    pub async fn renew(&self) -> Renewal {
        self.shared.renew().await
    }

    /// Start the background renewal task, replacing one already running.
    pub fn start_renewal(&self, period: Duration) {
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_renewal(Arc::clone(&self.shared), period, stop_rx));
        let previous = self
            .renewal
            .lock()
            .ok()
            .and_then(|mut slot| slot.replace(RenewalTask { stop, handle }));
        if let Some(task) = previous {
            task.handle.abort();
        }
        debug!(period_secs = period.as_secs(), "Background renewal started");
    }

    /// Stop background renewal and wait for the task to finish. No renewal
    /// fires after this returns.
    pub async fn teardown(&self) {
        let task = self.renewal.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            let _ = task.stop.send(());
            let _ = task.handle.await;
            debug!("Background renewal stopped");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.renewal.lock() {
            if let Some(task) = slot.take() {
                task.handle.abort();
            }
        }
    }
}

impl Shared {
    fn commit(&self, epoch: &mut u64, next: SessionState) {
        *epoch += 1;
        debug!(state = next.label(), epoch = *epoch, "Session state changed");
        self.state.send_replace(next);
    }

    /// Storage failures here are logged and otherwise ignored: the in-memory
    /// state is already moving to `Unauthenticated`.
    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear token store");
        }
    }

    fn logout_locked(&self, epoch: &mut u64) {
        self.clear_store();
        self.commit(epoch, SessionState::Unauthenticated);
    }

    async fn hydrate(&self) -> SessionState {
        let mut epoch = self.epoch.lock().await;
        let next = match self.store.load() {
            Ok(None) => {
                debug!("No stored session");
                SessionState::Unauthenticated
            }
            Ok(Some(credentials)) => match codec::decode(&credentials.access) {
                Ok(claims) => {
                    info!(subject = %claims.subject, expires_at = %claims.expires_at, "Session restored");
                    SessionState::Authenticated {
                        credentials,
                        claims,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Stored access token is invalid, discarding session");
                    self.clear_store();
                    SessionState::Unauthenticated
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to load stored session, discarding it");
                self.clear_store();
                SessionState::Unauthenticated
            }
        };
        self.commit(&mut epoch, next.clone());
        next
    }

    async fn login(&self, username: &str, password: &str) -> Result<Claims, AuthError> {
        let exchanged = self.obtain(username, password).await;

        let mut epoch = self.epoch.lock().await;
        match exchanged {
            Ok((credentials, claims)) => {
                if let Err(e) = self.store.save(&credentials) {
                    error!(error = %e, "Failed to save session");
                    self.logout_locked(&mut epoch);
                    return Err(AuthError::Storage(e));
                }
                info!(subject = %claims.subject, "Login successful");
                self.commit(
                    &mut epoch,
                    SessionState::Authenticated {
                        credentials,
                        claims: claims.clone(),
                    },
                );
                Ok(claims)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                if self.state.borrow().is_initializing() {
                    self.commit(&mut epoch, SessionState::Unauthenticated);
                }
                Err(e)
            }
        }
    }

    async fn obtain(&self, username: &str, password: &str) -> Result<(CredentialPair, Claims), AuthError> {
        let response = self.backend.obtain_pair(username, password).await?;
        let access = response
            .access
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTokens("access"))?;
        let refresh = response
            .refresh
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTokens("refresh"))?;
        let claims = codec::decode(&access)?;
        Ok((CredentialPair { access, refresh }, claims))
    }

    async fn logout(&self) {
        let mut epoch = self.epoch.lock().await;
        self.logout_locked(&mut epoch);
        info!("Logged out");
    }

    async fn renew(&self) -> Renewal {
        let _renewing = self.renewing.lock().await;

        let (current, started_at) = {
            let mut epoch = self.epoch.lock().await;
            let current = match &*self.state.borrow() {
                SessionState::Initializing => {
                    debug!("Session not restored yet, skipping renewal");
                    return Renewal::Skipped;
                }
                // Already logged out: storage is empty and subscribers know
                SessionState::Unauthenticated => return Renewal::LoggedOut,
                SessionState::Authenticated { credentials, .. } if !credentials.refresh.is_empty() => {
                    Some(credentials.clone())
                }
                SessionState::Authenticated { .. } => None,
            };
            match current {
                Some(credentials) => (credentials, *epoch),
                None => {
                    warn!("No refresh token found, logging out");
                    self.logout_locked(&mut epoch);
                    return Renewal::LoggedOut;
                }
            }
        };

        let exchanged = self.refresh(&current).await;

        // Nothing below awaits: once the lock is held the commit cannot be
        // interrupted, even if this future is dropped by a cancelled task.
        let mut epoch = self.epoch.lock().await;
        if *epoch != started_at {
            debug!("Session changed during renewal, discarding result");
            return Renewal::Superseded;
        }

        let failure = match exchanged {
            Ok((credentials, claims)) => match self.store.save(&credentials) {
                Ok(()) => {
                    debug!(expires_at = %claims.expires_at, "Session renewed");
                    self.commit(
                        &mut epoch,
                        SessionState::Authenticated {
                            credentials,
                            claims,
                        },
                    );
                    return Renewal::Renewed;
                }
                Err(e) => AuthError::Storage(e),
            },
            Err(e) => e,
        };

        warn!(error = %failure, "Refresh failed, logging out");
        self.logout_locked(&mut epoch);
        Renewal::LoggedOut
    }

    async fn refresh(&self, current: &CredentialPair) -> Result<(CredentialPair, Claims), AuthError> {
        let response = self.backend.refresh_access(&current.refresh).await?;
        let access = response
            .access
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTokens("access"))?;
        let claims = codec::decode(&access)?;
        Ok((current.renewed(access, response.refresh), claims))
    }
}

async fn run_renewal(shared: Arc<Shared>, period: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        if !shared.state.borrow().is_authenticated() {
            continue;
        }

        tokio::select! {
            biased;
            _ = &mut stop => break,
            outcome = shared.renew() => debug!(?outcome, "Scheduled renewal finished"),
        }
    }
}

fn registration_message(error: &ApiError) -> String {
    match error {
        ApiError::NetworkError(_) => "Registration failed! Please try again.".to_string(),
        ApiError::BadRequest(message)
        | ApiError::AccessDenied(message)
        | ApiError::ServerError(message)
            if !message.trim().is_empty() =>
        {
            message.clone()
        }
        _ => REGISTRATION_FALLBACK_MESSAGE.to_string(),
    }
}
