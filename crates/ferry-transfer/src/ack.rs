/// Acknowledgment processing for the sender.

use crate::protocol::Ack;
use crate::session::{SendSession, TransferState};

/// What an acknowledgment did to the session. Only `Accepted` changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Accepted,
    Duplicate,
    OutOfRange,
    /// The session already failed or was cancelled.
    Closed,
}

impl AckOutcome {
    pub fn reason(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
            Self::OutOfRange => "out_of_range",
            Self::Closed => "closed",
        }
    }
}

/// Mark the acknowledged chunk as confirmed. Idempotent and order-free.
pub fn on_ack(session: &mut SendSession, ack: Ack) -> AckOutcome {
    if matches!(session.state(), TransferState::Failed | TransferState::Cancelled) {
        return AckOutcome::Closed;
    }
    if ack.sequence >= session.total_chunks() {
        return AckOutcome::OutOfRange;
    }
    if session.mark_acked(ack.sequence) {
        AckOutcome::Accepted
    } else {
        AckOutcome::Duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn session() -> SendSession {
        SendSession::new(Bytes::from_static(b"HELLO WORLD"), 5).unwrap()
    }

    #[test]
    fn repeated_ack_is_idempotent() {
        let mut once = session();
        assert_eq!(on_ack(&mut once, Ack { sequence: 1 }), AckOutcome::Accepted);

        let mut many = session();
        on_ack(&mut many, Ack { sequence: 1 });
        for _ in 0..5 {
            assert_eq!(on_ack(&mut many, Ack { sequence: 1 }), AckOutcome::Duplicate);
        }

        assert_eq!(once.acked_count(), many.acked_count());
        assert_eq!(once.unconfirmed(), many.unconfirmed());
        assert_eq!(once.state(), many.state());
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut s = session();
        assert_eq!(on_ack(&mut s, Ack { sequence: 3 }), AckOutcome::OutOfRange);
        assert_eq!(on_ack(&mut s, Ack { sequence: u32::MAX }), AckOutcome::OutOfRange);
        assert_eq!(s.acked_count(), 0);
    }

    #[test]
    fn any_order_completes() {
        let orders = [[0, 1, 2], [2, 1, 0], [1, 2, 0], [2, 0, 1]];
        for order in orders {
            let mut s = session();
            for seq in order {
                assert_eq!(on_ack(&mut s, Ack { sequence: seq }), AckOutcome::Accepted);
            }
            assert!(s.is_complete());
            assert_eq!(s.state(), TransferState::Complete);
        }
    }

    #[test]
    fn failed_session_ignores_acks() {
        let mut s = session();
        s.set_state(TransferState::Failed);
        assert_eq!(on_ack(&mut s, Ack { sequence: 0 }), AckOutcome::Closed);
        assert!(!s.is_acked(0));
    }
}
