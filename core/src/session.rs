//! Session state machine.
//!
//! All session mutation happens in [`SessionCell`] under one lock, with the credential vault
//! updated inside the same critical section. Async operations capture a generation when they
//! begin and commit only if no other transition happened while they were suspended.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use verifier_config::ResolvedSettings;
use verifier_gateway::{
    ClientBuildError, CredentialStore, CredentialVault, ErrorKind, ExpiryListener,
    FileCredentialStore, GatewayClient, GatewayConfig, GatewayError, MemoryCredentialStore,
};
use verifier_types::{Credential, Mode, SessionState, UserProfile};

use crate::fallback::DemoFallback;
use crate::notice::{SessionNotice, login_failure_message};

const SIMULATED_REGISTRATION_MESSAGE: &str = "Demo Mode: registration simulated, no account was created.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("login superseded by a later session change")]
    Superseded,
}

impl LoginError {
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Gateway(error) => Some(error.kind()),
            Self::Superseded => None,
        }
    }

    /// Whether the failing condition is the one that Demo Mode works around.
    #[must_use]
    pub fn offers_simulated_mode(&self) -> bool {
        self.kind() == Some(ErrorKind::NetworkUnreachable)
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(error) => login_failure_message(error),
            Self::Superseded => "Login cancelled.".to_string(),
        }
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub mode: Mode,
    /// Present only while authenticated.
    pub profile: Option<UserProfile>,
    pub notice: Option<SessionNotice>,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    mode: Mode,
    profile: Option<UserProfile>,
    notice: Option<SessionNotice>,
    /// Bumped on every transition; guards async commits.
    generation: u64,
    /// Bumped whenever a session ends or a new one replaces it; scopes the job registry.
    epoch: u64,
}

pub(crate) struct SessionCell {
    vault: Arc<CredentialVault>,
    inner: Mutex<SessionInner>,
}

impl SessionCell {
    pub(crate) fn new(vault: Arc<CredentialVault>) -> Self {
        Self {
            vault,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state,
            mode: inner.mode,
            profile: inner.profile.clone(),
            notice: inner.notice.clone(),
        }
    }

    pub(crate) fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub(crate) fn state(&self) -> SessionState {
        self.lock().state
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Enter `Authenticating` and return the generation the caller must commit against.
    pub(crate) fn begin_authenticating(&self, clear_credential: bool) -> u64 {
        let mut inner = self.lock();
        if inner.state == SessionState::Authenticated {
            inner.epoch += 1;
        }
        if clear_credential {
            self.vault.clear();
        }
        inner.state = SessionState::Authenticating;
        inner.profile = None;
        inner.notice = None;
        inner.generation += 1;
        inner.generation
    }

    /// Declare `Authenticated`, installing `credential` if given. No-op if superseded.
    pub(crate) fn commit(
        &self,
        generation: u64,
        profile: UserProfile,
        credential: Option<Credential>,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        if let Some(credential) = credential {
            self.vault.install(credential);
        }
        inner.state = SessionState::Authenticated;
        inner.profile = Some(profile);
        inner.notice = None;
        inner.generation += 1;
        true
    }

    /// Roll a failed authentication back to `Anonymous`. No-op if superseded.
    pub(crate) fn abort(&self, generation: u64, notice: SessionNotice) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        self.end_locked(&mut inner, Some(notice));
        true
    }

    /// Logout transition. Returns whether anything was active.
    pub(crate) fn end_session(&self, notice: Option<SessionNotice>) -> bool {
        let mut inner = self.lock();
        self.end_locked(&mut inner, notice)
    }

    /// Switch to a simulated session, ending any live one first. Returns whether it changed.
    pub(crate) fn enter_simulated(&self, profile: UserProfile) -> bool {
        let mut inner = self.lock();
        if inner.mode.is_simulated() {
            inner.notice = None;
            return false;
        }
        if inner.state != SessionState::Anonymous {
            debug!(state = %inner.state, "Ending live session before entering demo mode");
            self.end_locked(&mut inner, None);
        }
        self.vault.install(Credential::simulated());
        inner.mode = Mode::Simulated;
        inner.state = SessionState::Authenticated;
        inner.profile = Some(profile);
        inner.notice = None;
        inner.generation += 1;
        inner.epoch += 1;
        true
    }

    fn end_locked(&self, inner: &mut SessionInner, notice: Option<SessionNotice>) -> bool {
        self.vault.clear();
        let was_active = inner.state != SessionState::Anonymous || inner.mode.is_simulated();
        if was_active {
            inner.generation += 1;
            inner.epoch += 1;
        }
        inner.state = SessionState::Anonymous;
        inner.mode = Mode::Live;
        inner.profile = None;
        inner.notice = notice;
        was_active
    }
}

impl ExpiryListener for SessionCell {
    fn session_expired(&self) {
        let mut inner = self.lock();
        // An in-flight authentication owns its own rollback; a newer credential means this
        // rejection belongs to a session that is already gone.
        if inner.state != SessionState::Authenticated
            || inner.mode.is_simulated()
            || self.vault.is_present()
        {
            debug!(state = %inner.state, "Ignoring session-expired signal");
            return;
        }
        info!("Session expired; returning to anonymous");
        self.end_locked(&mut inner, Some(SessionNotice::session_expired()));
    }
}

/// Owns the session lifecycle: login, logout, startup restore.
pub struct SessionManager {
    cell: Arc<SessionCell>,
    gateway: Arc<GatewayClient>,
    fallback: DemoFallback,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.cell.snapshot())
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
        simulated_latency: Duration,
    ) -> Result<Self, ClientBuildError> {
        let vault = Arc::new(CredentialVault::new(store));
        let cell = Arc::new(SessionCell::new(Arc::clone(&vault)));
        let listener: Arc<dyn ExpiryListener> = cell.clone();
        let gateway = Arc::new(GatewayClient::new(config, vault, listener)?);
        let fallback = DemoFallback::new(cell.clone(), gateway.clone(), simulated_latency);
        Ok(Self {
            cell,
            gateway,
            fallback,
        })
    }

    /// Build from resolved settings. Without a credential path the session is not persisted.
    pub fn from_settings(settings: &ResolvedSettings) -> Result<Self, ClientBuildError> {
        let store: Arc<dyn CredentialStore> = match &settings.credential_path {
            Some(path) => Arc::new(FileCredentialStore::new(path.clone())),
            None => {
                warn!("No credential path available; session will not persist across restarts");
                Arc::new(MemoryCredentialStore::new())
            }
        };
        let config = GatewayConfig::new(settings.base_url.clone())
            .with_connect_timeout(settings.connect_timeout);
        Self::new(config, store, settings.simulated_latency)
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<GatewayClient> {
        &self.gateway
    }

    #[must_use]
    pub fn fallback(&self) -> &DemoFallback {
        &self.fallback
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.cell.epoch()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.cell.state()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.cell.mode()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.cell.snapshot()
    }

    /// The profile, only while authenticated.
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        let snapshot = self.cell.snapshot();
        if snapshot.state == SessionState::Authenticated {
            snapshot.profile
        } else {
            None
        }
    }

    #[must_use]
    pub fn last_notice(&self) -> Option<SessionNotice> {
        self.cell.snapshot().notice
    }

    /// Two-step login: credential exchange, then profile fetch.
    ///
    /// Nothing is installed or persisted until both steps succeed. Any failure rolls the
    /// session back to `Anonymous`.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, LoginError> {
        if self.fallback.is_simulated() {
            return self.login_simulated(username).await;
        }

        let generation = self.cell.begin_authenticating(true);
        info!(username, "Logging in");

        let outcome = async {
            let credential = self.gateway.login(username, password).await?;
            let profile = self.gateway.fetch_profile_as(&credential).await?;
            Ok::<_, GatewayError>((credential, profile))
        }
        .await;

        match outcome {
            Ok((credential, profile)) => {
                if self
                    .cell
                    .commit(generation, profile.clone(), Some(credential))
                {
                    info!(username = %profile.username, plan = %profile.plan, "Authenticated");
                    Ok(profile)
                } else {
                    warn!("Discarding login result superseded by a later session change");
                    Err(LoginError::Superseded)
                }
            }
            Err(error) => {
                info!(kind = ?error.kind(), "Login failed");
                if !self
                    .cell
                    .abort(generation, SessionNotice::for_login_failure(&error))
                {
                    debug!("Login failure arrived after the session had already changed");
                }
                Err(error.into())
            }
        }
    }

    async fn login_simulated(&self, username: &str) -> Result<UserProfile, LoginError> {
        let generation = self.cell.begin_authenticating(false);
        self.fallback.delay().await;
        let profile = UserProfile::simulated(Some(username));
        if self.cell.commit(generation, profile.clone(), None) {
            info!(username = %profile.username, "Authenticated in demo mode");
            Ok(profile)
        } else {
            Err(LoginError::Superseded)
        }
    }

    /// Validate a persisted credential on startup.
    ///
    /// Returns `Ok(None)` when nothing is persisted. A credential that fails validation is
    /// discarded; there is no retry.
    pub async fn restore(&self) -> Result<Option<UserProfile>, LoginError> {
        if self.cell.state() != SessionState::Anonymous {
            return Ok(self.profile());
        }
        let Some(credential) = self.cell.vault().restore() else {
            debug!("No persisted credential");
            return Ok(None);
        };

        let generation = self.cell.begin_authenticating(false);
        info!("Validating persisted credential");

        match self.gateway.fetch_profile_as(&credential).await {
            Ok(profile) => {
                if self.cell.commit(generation, profile.clone(), None) {
                    info!(username = %profile.username, "Restored session");
                    Ok(Some(profile))
                } else {
                    Err(LoginError::Superseded)
                }
            }
            Err(error) => {
                info!(kind = ?error.kind(), "Persisted credential rejected; discarding");
                self.cell
                    .abort(generation, SessionNotice::for_restore_failure(&error));
                Err(error.into())
            }
        }
    }

    /// Clear credential and profile. Safe to call repeatedly; ends demo mode too.
    pub fn logout(&self) {
        if self.cell.end_session(None) {
            info!("Logged out");
        }
    }

    /// Create an account. Does not log in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<String, GatewayError> {
        if self.fallback.is_simulated() {
            self.fallback.delay().await;
            return Ok(SIMULATED_REGISTRATION_MESSAGE.to_string());
        }
        let message = self.gateway.register(username, password, email).await?;
        info!(username, "Registered account");
        Ok(message)
    }
}
