use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::UtilError;

/// Cooperative cancellation flag shared between an operation and its caller.
///
/// Long scans (working-tree walk, pack construction, gc) poll the token
/// between objects and abort with partial temp state discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Bail out with `UtilError::Cancelled` if cancellation was requested.
    pub fn check(&self) -> Result<(), UtilError> {
        if self.is_cancelled() {
            Err(UtilError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(UtilError::Cancelled)));
    }
}
