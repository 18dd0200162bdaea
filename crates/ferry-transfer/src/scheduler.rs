/// Transmission scheduling for the sender.
///
/// `start` sends every chunk once. `tick` resends any unacknowledged chunk
/// whose last transmission is older than the retransmission timeout, and
/// fails the session once a chunk has used up its retries. Which attempt an
/// acknowledgment answers is never tracked: a chunk is either confirmed or
/// it is not, and the receiver discards duplicates.

use std::io;
use std::time::{Duration, Instant};

use crate::config::TransferConfig;
use crate::session::{SendSession, TransferState};
use crate::transport::Transport;

/// Result of one scheduler pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was due.
    Idle,
    /// These sequences were resent, ascending.
    Retransmitted(Vec<u32>),
    /// Every chunk is acknowledged.
    Complete,
    /// A chunk ran out of retries; these sequences were never confirmed.
    Failed { unconfirmed: Vec<u32> },
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    timeout: Duration,
    max_retries: u32,
}

impl Scheduler {
    pub fn new(config: &TransferConfig) -> Self {
        Self {
            timeout: config.retransmit_timeout,
            max_retries: config.max_retries,
        }
    }

    /// Send every chunk once, in sequence order, stamping each with `now`.
    pub fn start<T: Transport + ?Sized>(
        &self,
        session: &mut SendSession,
        transport: &mut T,
        now: Instant,
    ) -> io::Result<()> {
        debug_assert_eq!(session.state(), TransferState::Segmented);
        session.set_state(TransferState::Sending);
        for sequence in 0..session.total_chunks() {
            transport.send(session.record(sequence))?;
            session.mark_sent(sequence, now);
        }
        session.set_state(TransferState::AwaitingAcks);
        Ok(())
    }

    /// Resend timed-out chunks, or report that the session is finished.
    pub fn tick<T: Transport + ?Sized>(
        &self,
        session: &mut SendSession,
        transport: &mut T,
        now: Instant,
    ) -> io::Result<TickOutcome> {
        match session.state() {
            TransferState::Complete => return Ok(TickOutcome::Complete),
            TransferState::Failed => {
                return Ok(TickOutcome::Failed {
                    unconfirmed: session.unconfirmed(),
                })
            }
            _ => {}
        }
        if session.is_complete() {
            session.set_state(TransferState::Complete);
            return Ok(TickOutcome::Complete);
        }

        // The in-flight queue is ordered by deadline: stop at the first
        // transmission that has not timed out yet.
        let mut due = Vec::new();
        while let Some((sent, sequence)) = session.oldest_in_flight() {
            if now.saturating_duration_since(sent) <= self.timeout {
                break;
            }
            session.pop_in_flight();
            due.push(sequence);
        }
        due.sort_unstable();

        if due.is_empty() {
            return Ok(TickOutcome::Idle);
        }
        if due.iter().any(|&seq| session.retries(seq) >= self.max_retries) {
            session.set_state(TransferState::Failed);
            return Ok(TickOutcome::Failed {
                unconfirmed: session.unconfirmed(),
            });
        }

        for &sequence in &due {
            transport.send(session.record(sequence))?;
            session.mark_sent(sequence, now);
            session.bump_retries(sequence);
        }
        Ok(TickOutcome::Retransmitted(due))
    }

    /// Earliest instant at which some unacknowledged chunk becomes due.
    pub fn next_deadline(&self, session: &SendSession) -> Option<Instant> {
        if session.state().is_terminal() {
            return None;
        }
        session
            .oldest_unacked_send()
            .map(|sent| sent + self.timeout)
    }
}
