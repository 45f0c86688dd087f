//! Stop signal shared by the accept loop and every channel session.

use tokio_util::sync::CancellationToken;

/// One `CancellationToken` fanned out as clones: the serve task selects on
/// it for graceful drain, and each session selects on it to close its
/// socket. Cancelling is the whole shutdown story here; sessions own no
/// state that needs flushing.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// A coordinator with nothing signalled yet.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A clone for a task to select on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal every holder of a token clone to stop. Safe to call more
    /// than once.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// True once [`ShutdownCoordinator::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
