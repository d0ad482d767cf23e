//! # Network Monitor
//!
//! Online/offline signal read by the orchestrator and the review queue.
//!
//! ## Features
//!
//! - **Connectivity Detection**: `Connectivity::is_online`, readable at call
//!   time from any task
//! - **Change Notification**: `subscribe` hands out a `watch` receiver so the
//!   scheduler can drain as soon as connectivity returns
//!
//! Detection itself is external: whatever observes the platform's network
//! state calls `set_status`.

use tokio::sync::watch;
use tracing::info;

/// Boolean "is online" source
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    /// Reachable but degraded; still counts as online
    Limited,
    Offline,
}

impl NetworkStatus {
    pub fn is_online(self) -> bool {
        !matches!(self, NetworkStatus::Offline)
    }
}

#[derive(Debug)]
pub struct NetworkMonitor {
    status: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (status, _) = watch::channel(initial);
        Self { status }
    }

    pub fn get_status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    pub fn set_status(&self, status: NetworkStatus) {
        let previous = self.status.send_replace(status);
        if previous.is_online() != status.is_online() {
            info!(?previous, current = ?status, "Network connectivity changed");
        }
    }

    pub fn set_online(&self, online: bool) {
        self.set_status(if online {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        });
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.get_status().is_online()
    }
}
