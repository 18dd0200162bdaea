/// Sender-side bookkeeping for one transfer.
///
/// Every collection is indexed by sequence number and allocated once when
/// the payload is segmented. Encoded records are cached so retransmissions
/// never re-encode.
///
/// Transmissions are also queued in send order. Every chunk shares the same
/// timeout, so that queue is ordered by deadline and the scheduler only ever
/// looks at its front.

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;

use crate::bitfield::ChunkBitfield;
use crate::error::TransferError;
use crate::protocol::encode_chunk;
use crate::segmenter::segment;

/// Lifecycle of a transfer. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferState {
    Idle = 0,
    Segmented = 1,
    Sending = 2,
    AwaitingAcks = 3,
    Receiving = 4,
    Complete = 5,
    Failed = 6,
    Cancelled = 7,
}

impl TransferState {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Idle,
            1 => Self::Segmented,
            2 => Self::Sending,
            3 => Self::AwaitingAcks,
            4 => Self::Receiving,
            5 => Self::Complete,
            6 => Self::Failed,
            7 => Self::Cancelled,
            _ => return None,
        })
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// State of one outgoing transfer.
#[derive(Debug)]
pub struct SendSession {
    records: Vec<Bytes>,
    acked: ChunkBitfield,
    last_sent: Vec<Option<Instant>>,
    /// (sent at, sequence), oldest first. Entries for chunks acknowledged or
    /// resent since are stale and skipped.
    in_flight: VecDeque<(Instant, u32)>,
    retries: Vec<u32>,
    state: TransferState,
    payload_len: usize,
}

impl SendSession {
    /// Segment `payload` and prepare the wire records for every chunk.
    pub fn new(payload: Bytes, chunk_size: usize) -> Result<Self, TransferError> {
        let payload_len = payload.len();
        let chunks = segment(payload, chunk_size)?;
        let records = chunks
            .iter()
            .map(|chunk| encode_chunk(chunk, chunk_size))
            .collect::<Result<Vec<_>, _>>()?;
        let total = chunks.len();
        let total_chunks = chunks[0].total_chunks;

        Ok(Self {
            records,
            acked: ChunkBitfield::new(total_chunks),
            last_sent: vec![None; total],
            in_flight: VecDeque::with_capacity(total),
            retries: vec![0; total],
            state: TransferState::Segmented,
            payload_len,
        })
    }

    #[inline]
    pub fn total_chunks(&self) -> u32 {
        self.acked.total()
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// True iff every chunk has been acknowledged.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.acked.is_complete()
    }

    pub fn is_acked(&self, sequence: u32) -> bool {
        self.acked.get(sequence)
    }

    pub fn acked_count(&self) -> u32 {
        self.acked.count()
    }

    /// Retransmissions so far for `sequence` (0 for unknown sequences).
    pub fn retries(&self, sequence: u32) -> u32 {
        self.retries.get(sequence as usize).copied().unwrap_or(0)
    }

    pub fn last_sent(&self, sequence: u32) -> Option<Instant> {
        self.last_sent.get(sequence as usize).copied().flatten()
    }

    /// Sequences still waiting for an acknowledgment, ascending.
    pub fn unconfirmed(&self) -> Vec<u32> {
        self.acked.missing()
    }

    pub(crate) fn record(&self, sequence: u32) -> &Bytes {
        &self.records[sequence as usize]
    }

    /// Record a transmission. Callers pass non-decreasing instants.
    pub(crate) fn mark_sent(&mut self, sequence: u32, now: Instant) {
        self.last_sent[sequence as usize] = Some(now);
        self.in_flight.push_back((now, sequence));
    }

    /// Oldest transmission still awaiting its acknowledgment. Stale entries
    /// in front of it are dropped.
    pub(crate) fn oldest_in_flight(&mut self) -> Option<(Instant, u32)> {
        while let Some(&(sent, sequence)) = self.in_flight.front() {
            if self.is_live(sent, sequence) {
                return Some((sent, sequence));
            }
            self.in_flight.pop_front();
        }
        None
    }

    /// Remove the entry returned by `oldest_in_flight`.
    pub(crate) fn pop_in_flight(&mut self) {
        self.in_flight.pop_front();
    }

    /// Send time of the oldest live transmission.
    pub fn oldest_unacked_send(&self) -> Option<Instant> {
        self.in_flight
            .iter()
            .find(|&&(sent, sequence)| self.is_live(sent, sequence))
            .map(|&(sent, _)| sent)
    }

    fn is_live(&self, sent: Instant, sequence: u32) -> bool {
        !self.acked.get(sequence) && self.last_sent[sequence as usize] == Some(sent)
    }

    #[cfg(test)]
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn bump_retries(&mut self, sequence: u32) -> u32 {
        let retries = &mut self.retries[sequence as usize];
        *retries += 1;
        *retries
    }

    /// Returns true if the sequence was newly acknowledged.
    pub(crate) fn mark_acked(&mut self, sequence: u32) -> bool {
        let fresh = self.acked.set(sequence);
        if fresh && self.acked.is_complete() {
            self.state = TransferState::Complete;
        }
        fresh
    }

    pub(crate) fn set_state(&mut self, state: TransferState) {
        self.state = state;
    }
}
