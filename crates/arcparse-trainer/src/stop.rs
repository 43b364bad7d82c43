//! Cooperative cancellation for the training loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What an interrupt should do, given how many came before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// First request: finish the current reporting interval, then stop.
    Graceful,
    /// A stop was already pending: quit now.
    Forced,
}

/// Shared flag checked by the training loop at its safe points.
///
/// Clones observe the same flag; hand one to the signal listener and one to
/// [`Trainer::train`](crate::Trainer::train).
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    requested: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop.
    pub fn request(&self) -> StopRequest {
        if self.requested.swap(true, Ordering::SeqCst) {
            StopRequest::Forced
        } else {
            StopRequest::Graceful
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_forces() {
        let token = StopToken::new();
        assert!(!token.is_requested());

        let listener = token.clone();
        assert_eq!(listener.request(), StopRequest::Graceful);
        assert!(token.is_requested());
        assert_eq!(listener.request(), StopRequest::Forced);
    }
}
