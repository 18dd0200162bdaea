/// Ferry: reliable chunked transfer over unreliable datagrams.
///
/// Provides ARQ delivery of an in-memory payload with:
/// - Fixed-size chunking with zero-padded wire records
/// - Per-chunk acknowledgment tracking via bitfield
/// - Timeout-driven selective retransmission with a per-chunk retry budget
/// - Order-free, duplicate-safe reassembly
/// - Pluggable transports: UDP, in-memory channels, and a lossy simulator
/// - Acknowledgment suppression policies for exercising the retry path

pub mod ack;
pub mod bitfield;
pub mod config;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod progress;
pub mod protocol;
pub mod reassembler;
pub mod receiver;
pub mod scheduler;
pub mod segmenter;
pub mod sender;
pub mod session;
pub mod simulator;
pub mod transport;

// Re-export key types for convenience.
pub use ack::{on_ack, AckOutcome};
pub use bitfield::ChunkBitfield;
pub use config::{AckPolicy, ReceiverConfig, TransferConfig, DEFAULT_MAX_PAYLOAD_LEN};
pub use error::{TransferError, WireError};
pub use exchange::{ExchangeReport, Opening, Peer};
pub use logging::{NullLogger, TracingLogger, TransferEvent, TransferLog, TransferLogger};
pub use progress::TransferProgress;
pub use protocol::{
    decode, encode_ack, encode_chunk, Ack, Chunk, Message, ACK_SIZE, CHUNK_HEADER,
    DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
};
pub use reassembler::{ChunkOutcome, ChunkVerdict, Reassembler, ReceiveSession};
pub use receiver::{run_receiver, ReceiveReport};
pub use scheduler::{Scheduler, TickOutcome};
pub use segmenter::{chunk_count, segment};
pub use sender::{run_sender, SendReport};
pub use session::{SendSession, TransferState};
pub use simulator::{LossyTransport, SimulatorConfig, SimulatorStats};
pub use transport::{ChannelTransport, Transport, UdpTransport};
