//! Cooperative cancellation.
//!
//! Long loops call [`CancelToken::check`] once per row and bail out with
//! [`OpsError::Aborted`] once the token is set.

use crate::{OpsError, OpsResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared abort flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns [`OpsError::Aborted`] if cancellation was requested.
    #[inline]
    pub fn check(&self) -> OpsResult<()> {
        if self.is_canceled() {
            Err(OpsError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_canceled());
        assert!(matches!(token.check(), Err(OpsError::Aborted)));
    }
}
