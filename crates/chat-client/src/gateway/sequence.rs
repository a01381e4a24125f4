//! Last-received sequence counter
//!
//! Written by the dispatch loop, read by the heartbeat and resume builders.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic last-received sequence number
///
/// Zero means no dispatch has been seen yet; the counter is reset only when
/// the session ID is cleared.
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    /// Create a counter at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current sequence number
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Store the sequence from an inbound dispatch
    pub fn set(&self, seq: u64) {
        self.0.store(seq, Ordering::SeqCst);
    }

    /// Reset to zero alongside clearing the session ID
    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_get_set() {
        let seq = Sequence::new();
        assert_eq!(seq.get(), 0);

        seq.set(42);
        assert_eq!(seq.get(), 42);

        seq.set(43);
        assert_eq!(seq.get(), 43);
    }

    #[test]
    fn test_sequence_reset() {
        let seq = Sequence::new();
        seq.set(100);
        seq.reset();
        assert_eq!(seq.get(), 0);
    }
}
