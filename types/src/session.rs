//! Session-level domain types: credential, profile, state machine states, mode.

use serde::{Deserialize, Serialize};

use crate::{EmptyStringError, NonEmptyString};

const SIMULATED_CREDENTIAL: &str = "simulated-session";

/// Opaque bearer token proving an authenticated session to the backend.
///
/// Note: `Debug` is manually implemented to redact the token value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(NonEmptyString);

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_simulated() {
            write!(f, "Credential(<simulated>)")
        } else {
            write!(f, "Credential(<redacted>)")
        }
    }
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self, EmptyStringError> {
        let token = token.into();
        NonEmptyString::new(token.trim().to_string()).map(Self)
    }

    /// Sentinel credential for a simulated session. Never persisted, never sent.
    #[must_use]
    pub fn simulated() -> Self {
        Self(NonEmptyString(SIMULATED_CREDENTIAL.to_string()))
    }

    #[must_use]
    pub fn is_simulated(&self) -> bool {
        self.0.as_str() == SIMULATED_CREDENTIAL
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }
}

/// Authenticated user's profile as returned by `GET /api/auth/me/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
}

impl UserProfile {
    /// Synthetic profile used while the session is simulated.
    #[must_use]
    pub fn simulated(username: Option<&str>) -> Self {
        let username = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("demo_user");
        Self {
            username: username.to_string(),
            plan: "Demo".to_string(),
            email: None,
            credits: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether backend calls go over the network or resolve locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Live,
    Simulated,
}

impl Mode {
    #[must_use]
    pub const fn is_simulated(self) -> bool {
        matches!(self, Self::Simulated)
    }
}
