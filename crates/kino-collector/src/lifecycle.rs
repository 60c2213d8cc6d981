//! Page lifecycle hooks

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Once-only flag shared by every unload hook of a page
#[derive(Debug, Default)]
pub struct UnloadGuard {
    fired: AtomicBool,
}

impl UnloadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the first caller only
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Receiver of page-unload notifications
#[async_trait]
pub trait LifecycleSink: Send + Sync {
    /// The page is going away. May be called from several hooks; only the
    /// first call has an effect.
    async fn notify_unload(&self);
}
