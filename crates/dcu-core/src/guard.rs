//! Reentrancy guard
//!
//! Entry points that move tokens hold the guard for their whole duration.
//! Internal state is settled before the token call, so a collaborator that
//! calls back in sees the post-effect state and is rejected anyway.

use crate::error::{DcuError, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flag lock over a contract's mutating entry points
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, failing with `ReentrantCall` if it is already held
    pub fn enter(&self) -> Result<GuardToken<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| DcuError::ReentrantCall)?;
        Ok(GuardToken { guard: self })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}

/// Held guard, released on drop
#[must_use]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_entry_rejected() {
        let guard = ReentrancyGuard::new();
        let token = guard.enter().unwrap();
        assert!(guard.is_entered());
        assert!(matches!(guard.enter(), Err(DcuError::ReentrantCall)));
        drop(token);
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_released_on_error_path() {
        let guard = ReentrancyGuard::new();
        let run = || -> Result<()> {
            let _lock = guard.enter()?;
            Err(DcuError::InvalidAmount)
        };
        assert!(run().is_err());
        assert!(!guard.is_entered());
    }
}
