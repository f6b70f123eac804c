//! User-facing failure text.
//!
//! Messages are chosen from the structured [`ErrorKind`], so the unreachable case stays
//! detectable without looking at the text.

use verifier_gateway::{ErrorKind, GatewayError};

pub const UNREACHABLE_LOGIN_MESSAGE: &str =
    "Backend unreachable. Switch to Demo Mode to work offline.";
pub const UNREACHABLE_UPLOAD_MESSAGE: &str = "Upload failed: Backend unreachable.";
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
const REJECTED_LOGIN_FALLBACK: &str = "Invalid username or password.";
const REJECTED_UPLOAD_FALLBACK: &str = "Upload rejected. Please log in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Transport failure. The one case where Demo Mode is offered.
    BackendUnreachable,
    /// The backend refused the request and said why.
    Rejected,
    /// Server fault or anything unclassified.
    Unexpected,
    SessionExpired,
}

/// The last session-level failure, kept for display until the next successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl SessionNotice {
    #[must_use]
    pub fn session_expired() -> Self {
        Self {
            kind: NoticeKind::SessionExpired,
            message: SESSION_EXPIRED_MESSAGE.to_string(),
        }
    }

    #[must_use]
    pub fn for_login_failure(error: &GatewayError) -> Self {
        Self {
            kind: notice_kind(error),
            message: login_failure_message(error),
        }
    }

    /// A stored credential that fails validation reads as an expired session.
    #[must_use]
    pub fn for_restore_failure(error: &GatewayError) -> Self {
        if error.kind() == ErrorKind::Unauthorized {
            Self::session_expired()
        } else {
            Self::for_login_failure(error)
        }
    }

    #[must_use]
    pub fn offers_simulated_mode(&self) -> bool {
        self.kind == NoticeKind::BackendUnreachable
    }
}

#[must_use]
pub fn notice_kind(error: &GatewayError) -> NoticeKind {
    match error.kind() {
        ErrorKind::NetworkUnreachable => NoticeKind::BackendUnreachable,
        ErrorKind::Unauthorized | ErrorKind::ValidationFailed => NoticeKind::Rejected,
        ErrorKind::ServerFault => NoticeKind::Unexpected,
    }
}

#[must_use]
pub fn login_failure_message(error: &GatewayError) -> String {
    match error.kind() {
        ErrorKind::NetworkUnreachable => UNREACHABLE_LOGIN_MESSAGE.to_string(),
        ErrorKind::Unauthorized | ErrorKind::ValidationFailed => error
            .backend_message()
            .unwrap_or(REJECTED_LOGIN_FALLBACK)
            .to_string(),
        ErrorKind::ServerFault => GENERIC_FAILURE_MESSAGE.to_string(),
    }
}

#[must_use]
pub fn upload_failure_message(error: &GatewayError) -> String {
    match error.kind() {
        ErrorKind::NetworkUnreachable => UNREACHABLE_UPLOAD_MESSAGE.to_string(),
        ErrorKind::Unauthorized | ErrorKind::ValidationFailed => error
            .backend_message()
            .unwrap_or(REJECTED_UPLOAD_FALLBACK)
            .to_string(),
        ErrorKind::ServerFault => GENERIC_FAILURE_MESSAGE.to_string(),
    }
}
