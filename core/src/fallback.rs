//! Demo Mode: a simulated session that never touches the backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use verifier_gateway::{GatewayClient, Reachability};
use verifier_types::{Mode, UserProfile};

use crate::session::SessionCell;

/// Switches the session between live and simulated operation.
///
/// While simulated, callers short-circuit before the gateway and resolve after
/// [`DemoFallback::delay`], so the async contract is the same in both modes.
#[derive(Clone)]
pub struct DemoFallback {
    cell: Arc<SessionCell>,
    gateway: Arc<GatewayClient>,
    latency: Duration,
}

impl std::fmt::Debug for DemoFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoFallback")
            .field("mode", &self.cell.mode())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl DemoFallback {
    pub(crate) fn new(cell: Arc<SessionCell>, gateway: Arc<GatewayClient>, latency: Duration) -> Self {
        Self {
            cell,
            gateway,
            latency,
        }
    }

    /// Start a simulated session. A live session is logged out first.
    ///
    /// Idempotent; clears any pending notice either way.
    pub fn enter_simulated(&self) {
        if self.cell.enter_simulated(UserProfile::simulated(None)) {
            info!("Entered demo mode");
        }
    }

    /// Full logout, back to live mode.
    pub fn exit_simulated(&self) {
        if self.cell.end_session(None) {
            info!("Left demo mode");
        }
    }

    #[must_use]
    pub fn is_simulated(&self) -> bool {
        self.cell.mode().is_simulated()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.cell.mode()
    }

    /// Artificial latency standing in for a network round-trip.
    pub async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Whether the backend answers. Always reachable while simulated.
    pub async fn probe(&self) -> Reachability {
        if self.is_simulated() {
            return Reachability::Reachable;
        }
        self.gateway.health().await
    }
}
