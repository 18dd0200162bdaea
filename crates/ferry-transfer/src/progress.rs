/// Transfer progress, shared between the transfer loop and its observers.
/// All fields are atomic for lock-free reads from other threads; the
/// cancellation flag is the only way to stop a loop from outside.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use crate::session::TransferState;

pub struct TransferProgress {
    pub chunks_total: AtomicU64,
    pub chunks_done: AtomicU64,
    pub bytes_total: AtomicU64,
    pub retransmits: AtomicU64,
    pub acks_suppressed: AtomicU64,
    state: AtomicU8,
    cancelled: AtomicBool,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress {
    pub fn new() -> Self {
        Self {
            chunks_total: AtomicU64::new(0),
            chunks_done: AtomicU64::new(0),
            bytes_total: AtomicU64::new(0),
            retransmits: AtomicU64::new(0),
            acks_suppressed: AtomicU64::new(0),
            state: AtomicU8::new(TransferState::Idle as u8),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn set_total(&self, chunks: u64, bytes: u64) {
        self.chunks_total.store(chunks, Ordering::Relaxed);
        self.bytes_total.store(bytes, Ordering::Relaxed);
    }

    pub fn state(&self) -> TransferState {
        TransferState::from_u8(self.state.load(Ordering::Relaxed)).unwrap_or(TransferState::Idle)
    }

    pub fn set_state(&self, state: TransferState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Ask the loop to stop at its next iteration.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Progress as a fraction 0.0 - 1.0.
    pub fn fraction(&self) -> f64 {
        let total = self.chunks_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let done = self.chunks_done.load(Ordering::Relaxed);
        (done as f64 / total as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_and_state() {
        let progress = TransferProgress::new();
        assert_eq!(progress.fraction(), 0.0);
        assert_eq!(progress.state(), TransferState::Idle);

        progress.set_total(4, 100);
        progress.chunks_done.store(1, Ordering::Relaxed);
        assert_eq!(progress.fraction(), 0.25);

        progress.set_state(TransferState::AwaitingAcks);
        assert_eq!(progress.state(), TransferState::AwaitingAcks);
    }

    #[test]
    fn cancel_sets_flag() {
        let progress = TransferProgress::new();
        assert!(!progress.is_cancelled());
        progress.cancel();
        assert!(progress.is_cancelled());
    }
}
