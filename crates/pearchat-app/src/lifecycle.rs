//! Gateway lifecycle bookkeeping.
//!
//! Every mount opens a new [`Epoch`]. Gateway calls are tagged with the
//! epoch they were issued under, and a completion is applied only while
//! that epoch is still live. Unmounting closes the epoch, so anything the
//! old gateway reports afterwards is discarded without being cancelled.

use std::fmt;

use serde::Serialize;

/// Lifecycle generation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Epoch(u64);

impl Epoch {
    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GatewayStatus {
    /// Not mounted.
    Stopped,
    /// `start` in flight.
    Starting,
    /// Started and accepting room calls.
    Running,
    /// `start` failed.
    Failed,
}

/// Mount state and current epoch.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    epoch: Epoch,
    mounted: bool,
    status: GatewayStatus,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Unmounted, epoch zero.
    pub fn new() -> Self {
        Self { epoch: Epoch::default(), mounted: false, status: GatewayStatus::Stopped }
    }

    /// Open a new epoch. Returns `None` if already mounted.
    pub fn mount(&mut self) -> Option<Epoch> {
        if self.mounted {
            return None;
        }
        self.epoch = self.epoch.next();
        self.mounted = true;
        self.status = GatewayStatus::Starting;
        Some(self.epoch)
    }

    /// Close the current epoch. Returns `false` if nothing was mounted.
    pub fn unmount(&mut self) -> bool {
        if !self.mounted {
            return false;
        }
        self.epoch = self.epoch.next();
        self.mounted = false;
        self.status = GatewayStatus::Stopped;
        true
    }

    /// True if completions tagged `epoch` may still be applied.
    pub fn is_live(&self, epoch: Epoch) -> bool {
        self.mounted && self.epoch == epoch
    }

    /// Live epoch, if mounted.
    pub fn live_epoch(&self) -> Option<Epoch> {
        self.mounted.then_some(self.epoch)
    }

    /// Current epoch counter, live or not.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// True between mount and unmount.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Backend process status.
    pub fn status(&self) -> GatewayStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: GatewayStatus) {
        self.status = status;
    }
}
