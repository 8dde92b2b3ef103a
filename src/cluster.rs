//! Clustering guard.
//!
//! The sole mechanism for single-instance tasks (migrations, upstream sync,
//! housekeeping). Coordination is deliberately *not* routed through the
//! database or an external lock store — cluster membership is named by the
//! `NODE_APP_INSTANCE` environment variable, and the string `"0"` always
//! identifies the designated worker.

use crate::config::Config;

/// Cheap, `Copy`-able handle answering "am I worker-zero?" without needing
/// to carry the whole `Config` around.
#[derive(Clone, Copy, Debug)]
pub struct NodeIdentity {
    is_worker_zero: bool,
}

impl NodeIdentity {
    pub fn from_config(config: &Config) -> Self {
        Self { is_worker_zero: config.is_worker_zero() }
    }

    /// True on the single process designated to run migrations, the
    /// upstream sync worker, and the housekeeping scheduler.
    pub fn is_worker_zero(&self) -> bool {
        self.is_worker_zero
    }

    #[cfg(test)]
    pub(crate) fn test_worker_zero() -> Self {
        Self { is_worker_zero: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflects_the_configured_instance() {
        let node = NodeIdentity { is_worker_zero: true };
        assert!(node.is_worker_zero());
        let node = NodeIdentity { is_worker_zero: false };
        assert!(!node.is_worker_zero());
    }
}
