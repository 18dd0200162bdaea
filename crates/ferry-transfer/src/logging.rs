/// Transfer logging trait for structured protocol events.
///
/// The sender and receiver loops report every protocol decision as a
/// [`TransferEvent`]; a [`TransferLogger`] decides where it goes.

use std::fmt;

/// Structured log entry for a transfer operation.
#[derive(Debug, Clone)]
pub struct TransferLog {
    pub component: &'static str,
    pub event: TransferEvent,
}

/// Transfer events that can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Sender: payload segmented, about to send
    SessionStarted {
        payload_len: usize,
        total_chunks: u32,
        chunk_size: usize,
    },
    /// Receiver: first chunk of a transfer arrived
    SessionOpened { total_chunks: u32 },
    /// Sender: chunk sent for the first time
    ChunkSent { sequence: u32 },
    /// Sender: chunk resent after its timeout
    ChunkRetransmitted { sequence: u32, attempt: u32 },
    /// Sender: acknowledgment marked a chunk confirmed
    AckReceived { sequence: u32, acked: u32, total: u32 },
    /// Sender: acknowledgment changed nothing
    AckIgnored { sequence: u32, reason: &'static str },
    /// Receiver: chunk stored in the reconstruction buffer
    ChunkAccepted { sequence: u32, received: u32, total: u32 },
    /// Receiver: chunk already stored
    DuplicateChunk { sequence: u32 },
    /// Receiver: chunk does not belong to the current transfer
    ChunkDiscarded { sequence: u32, total_chunks: u32 },
    /// Receiver: acknowledgment sent
    AckSent { sequence: u32 },
    /// Receiver: acknowledgment withheld by the loss-simulation policy
    AckSuppressed { sequence: u32 },
    /// Datagram could not be decoded
    BadDatagram { len: usize, error: String },
    /// Datagram of the other role's kind
    UnexpectedMessage { kind: &'static str },
    /// Sender: every chunk acknowledged
    TransferComplete {
        total_bytes: u64,
        duration_ms: u64,
        retransmits: u64,
    },
    /// Receiver: payload reconstructed
    ReceiveComplete {
        total_bytes: u64,
        duration_ms: u64,
        duplicates: u64,
    },
    /// Receiver: first chunk announces a transfer larger than allowed
    SessionRejected {
        total_chunks: u32,
        needed_bytes: u64,
        limit_bytes: u64,
    },
    /// Sender: retry budget exhausted
    TransferFailed { unconfirmed: Vec<u32> },
    /// Loop stopped by external shutdown
    Cancelled,
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionStarted { payload_len, total_chunks, chunk_size } => {
                write!(f, "session_started bytes={} chunks={} chunk_size={}", payload_len, total_chunks, chunk_size)
            }
            Self::SessionOpened { total_chunks } => {
                write!(f, "session_opened chunks={}", total_chunks)
            }
            Self::ChunkSent { sequence } => {
                write!(f, "chunk_sent seq={}", sequence)
            }
            Self::ChunkRetransmitted { sequence, attempt } => {
                write!(f, "chunk_retransmitted seq={} attempt={}", sequence, attempt)
            }
            Self::AckReceived { sequence, acked, total } => {
                write!(f, "ack_received seq={} acked={}/{}", sequence, acked, total)
            }
            Self::AckIgnored { sequence, reason } => {
                write!(f, "ack_ignored seq={} reason={}", sequence, reason)
            }
            Self::ChunkAccepted { sequence, received, total } => {
                write!(f, "chunk_accepted seq={} received={}/{}", sequence, received, total)
            }
            Self::DuplicateChunk { sequence } => {
                write!(f, "duplicate_chunk seq={}", sequence)
            }
            Self::ChunkDiscarded { sequence, total_chunks } => {
                write!(f, "chunk_discarded seq={} total_chunks={}", sequence, total_chunks)
            }
            Self::AckSent { sequence } => {
                write!(f, "ack_sent seq={}", sequence)
            }
            Self::AckSuppressed { sequence } => {
                write!(f, "ack_suppressed seq={}", sequence)
            }
            Self::BadDatagram { len, error } => {
                write!(f, "bad_datagram len={} error={}", len, error)
            }
            Self::UnexpectedMessage { kind } => {
                write!(f, "unexpected_message kind={}", kind)
            }
            Self::TransferComplete { total_bytes, duration_ms, retransmits } => {
                write!(f, "transfer_complete bytes={} duration_ms={} retransmits={}", total_bytes, duration_ms, retransmits)
            }
            Self::ReceiveComplete { total_bytes, duration_ms, duplicates } => {
                write!(f, "receive_complete bytes={} duration_ms={} duplicates={}", total_bytes, duration_ms, duplicates)
            }
            Self::SessionRejected { total_chunks, needed_bytes, limit_bytes } => {
                write!(f, "session_rejected chunks={} needed={} limit={}", total_chunks, needed_bytes, limit_bytes)
            }
            Self::TransferFailed { unconfirmed } => {
                write!(f, "transfer_failed unconfirmed={:?}", unconfirmed)
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Trait for transfer logging. Implementations can write to tracing,
/// collect events for inspection, or discard them.
pub trait TransferLogger: Send + Sync {
    fn log(&self, entry: TransferLog);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl TransferLogger for TracingLogger {
    fn log(&self, entry: TransferLog) {
        // Info for lifecycle events, warn for failures, debug for per-chunk spam
        match &entry.event {
            TransferEvent::SessionStarted { .. }
            | TransferEvent::SessionOpened { .. }
            | TransferEvent::TransferComplete { .. }
            | TransferEvent::ReceiveComplete { .. }
            | TransferEvent::Cancelled => {
                tracing::info!(component = entry.component, "{}", entry.event);
            }
            TransferEvent::TransferFailed { .. }
            | TransferEvent::SessionRejected { .. }
            | TransferEvent::BadDatagram { .. } => {
                tracing::warn!(component = entry.component, "{}", entry.event);
            }
            _ => {
                tracing::debug!(component = entry.component, "{}", entry.event);
            }
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl TransferLogger for NullLogger {
    fn log(&self, _entry: TransferLog) {}
}
