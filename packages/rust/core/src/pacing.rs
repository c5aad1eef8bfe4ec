//! Pause policies applied between generator calls.

use std::future::Future;
use std::time::Duration;

/// Called by the batch loop after each non-skipped item that has a successor.
pub trait PacingPolicy: Send + Sync {
    fn pause(&self) -> impl Future<Output = ()> + Send;
}

/// Sleep for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl PacingPolicy for FixedDelay {
    fn pause(&self) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(self.0)
    }
}

/// Return immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl PacingPolicy for NoDelay {
    fn pause(&self) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }
}
