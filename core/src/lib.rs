//! Session orchestration for the verifier client.
//!
//! [`SessionManager`] owns the Anonymous/Authenticating/Authenticated lifecycle and the gateway
//! it drives. [`DemoFallback`] swaps the backend for local simulation when it cannot be reached.
//! [`JobRegistry`] tracks uploads made during the current session.

mod fallback;
mod jobs;
pub mod notice;
mod session;

pub use fallback::DemoFallback;
pub use jobs::JobRegistry;
pub use notice::{NoticeKind, SessionNotice, login_failure_message, upload_failure_message};
pub use session::{LoginError, SessionManager, SessionSnapshot};

pub use verifier_gateway::{ErrorKind, GatewayError, Reachability};
pub use verifier_types::{
    Credential, JobId, JobRecord, JobStatus, Mode, PreconditionViolation, SessionState,
    UploadFile, UserProfile,
};
