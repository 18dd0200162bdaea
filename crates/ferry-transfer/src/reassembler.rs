/// Receiver-side reassembly.
///
/// The first chunk fixes the transfer's chunk count and sizes the
/// reconstruction buffer; every later chunk is copied to
/// `sequence * chunk_size`. Duplicates change nothing but are acknowledged
/// again, since a retransmission means the sender missed the first
/// acknowledgment.

use bytes::Bytes;

use crate::bitfield::ChunkBitfield;
use crate::config::{AckPolicy, DEFAULT_MAX_PAYLOAD_LEN};
use crate::protocol::{Ack, Chunk};

/// State of one incoming transfer.
#[derive(Debug)]
pub struct ReceiveSession {
    chunk_size: usize,
    buffer: Vec<u8>,
    received: ChunkBitfield,
    bytes_received: usize,
}

impl ReceiveSession {
    /// Allocate the session for a transfer of `total_chunks`. Returns None
    /// when the reconstruction buffer cannot be allocated.
    fn open(total_chunks: u32, chunk_size: usize) -> Option<Self> {
        let len = (total_chunks as usize).checked_mul(chunk_size)?;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, 0);
        Some(Self {
            chunk_size,
            buffer,
            received: ChunkBitfield::new(total_chunks),
            bytes_received: 0,
        })
    }

    #[inline]
    pub fn total_chunks(&self) -> u32 {
        self.received.total()
    }

    #[inline]
    pub fn received_count(&self) -> u32 {
        self.received.count()
    }

    pub fn is_received(&self, sequence: u32) -> bool {
        self.received.get(sequence)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.received.is_complete()
    }

    /// Sum of the lengths of all stored chunks.
    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn missing(&self) -> Vec<u32> {
        self.received.missing()
    }

    /// The reconstructed payload: the buffer truncated to `expected_len` when
    /// known out of band, otherwise to the bytes actually received.
    pub fn into_payload(self, expected_len: Option<u64>) -> Bytes {
        let len = match expected_len {
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX).min(self.buffer.len()),
            None => self.bytes_received,
        };
        let mut buffer = self.buffer;
        buffer.truncate(len);
        Bytes::from(buffer)
    }

    /// Store a chunk. Returns false if it was already stored.
    fn store(&mut self, chunk: &Chunk) -> bool {
        if !self.received.set(chunk.sequence) {
            return false;
        }
        let offset = chunk.sequence as usize * self.chunk_size;
        self.buffer[offset..offset + chunk.payload.len()].copy_from_slice(&chunk.payload);
        self.bytes_received += chunk.payload.len();
        true
    }
}

/// What happened to an incoming chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkVerdict {
    /// Stored; the received count went up.
    Accepted,
    /// Already stored; no state changed.
    Duplicate,
    /// Not part of the current transfer.
    Discarded,
    /// Would have opened a session larger than the receiver accepts.
    Rejected,
}

/// Outcome of [`Reassembler::on_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub verdict: ChunkVerdict,
    /// Acknowledgment to send, if any.
    pub ack: Option<Ack>,
    /// True when the loss-simulation policy withheld the acknowledgment.
    pub suppressed: bool,
}

/// Receiver state machine: no session until the first chunk, then one
/// session for the rest of the transfer.
#[derive(Debug)]
pub struct Reassembler {
    chunk_size: usize,
    policy: AckPolicy,
    max_chunks: u32,
    acks_considered: u64,
    session: Option<ReceiveSession>,
}

impl Reassembler {
    pub fn new(chunk_size: usize, policy: AckPolicy) -> Self {
        let max_chunks = DEFAULT_MAX_PAYLOAD_LEN.div_ceil(chunk_size.max(1) as u64);
        Self {
            chunk_size,
            policy,
            max_chunks: u32::try_from(max_chunks).unwrap_or(u32::MAX),
            acks_considered: 0,
            session: None,
        }
    }

    /// Refuse to open a session for more than `max_chunks` chunks.
    pub fn with_max_chunks(mut self, max_chunks: u32) -> Self {
        self.max_chunks = max_chunks.max(1);
        self
    }

    pub fn max_chunks(&self) -> u32 {
        self.max_chunks
    }

    pub fn session(&self) -> Option<&ReceiveSession> {
        self.session.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.session.as_ref().is_some_and(ReceiveSession::is_complete)
    }

    /// Hand over the session, leaving the reassembler idle.
    pub fn take_session(&mut self) -> Option<ReceiveSession> {
        self.session.take()
    }

    /// Process one incoming chunk.
    pub fn on_chunk(&mut self, chunk: &Chunk) -> ChunkOutcome {
        let discarded = ChunkOutcome {
            verdict: ChunkVerdict::Discarded,
            ack: None,
            suppressed: false,
        };
        let rejected = ChunkOutcome {
            verdict: ChunkVerdict::Rejected,
            ..discarded
        };

        if chunk.payload.len() > self.chunk_size
            || chunk.total_chunks == 0
            || chunk.sequence >= chunk.total_chunks
        {
            return discarded;
        }

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                // Checked before allocating: the buffer size comes off the wire.
                if chunk.total_chunks > self.max_chunks {
                    return rejected;
                }
                match ReceiveSession::open(chunk.total_chunks, self.chunk_size) {
                    Some(session) => self.session.insert(session),
                    None => return rejected,
                }
            }
        };
        if chunk.total_chunks != session.total_chunks() {
            return discarded;
        }

        let verdict = if session.store(chunk) {
            ChunkVerdict::Accepted
        } else {
            ChunkVerdict::Duplicate
        };

        let suppressed = self.suppress(chunk.sequence);
        ChunkOutcome {
            verdict,
            ack: (!suppressed).then_some(Ack {
                sequence: chunk.sequence,
            }),
            suppressed,
        }
    }

    fn suppress(&mut self, sequence: u32) -> bool {
        self.acks_considered += 1;
        match self.policy {
            AckPolicy::Always => false,
            AckPolicy::SkipEveryNth(n) => self.acks_considered % u64::from(n.max(1)) == 0,
            AckPolicy::NeverAckMultiplesOf(n) => sequence % n.max(1) == 0,
        }
    }
}
