use std::io;

use thiserror::Error;

/// Reasons a datagram could not be decoded. These are logged and the
/// datagram is dropped; they never end a transfer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram of {len} bytes is neither an ack (4) nor a chunk ({expected_chunk})")]
    BadLength { len: usize, expected_chunk: usize },

    #[error("negative integer {0} on the wire")]
    Negative(i32),

    #[error("value {0} does not fit in a signed 32-bit wire field")]
    IntegerOverflow(u32),

    #[error("chunk declares zero total chunks")]
    ZeroChunks,

    #[error("sequence {sequence} outside transfer of {total_chunks} chunks")]
    SequenceOutOfRange { sequence: u32, total_chunks: u32 },

    #[error("payload of {len} bytes exceeds chunk size {chunk_size}")]
    PayloadTooLong { len: usize, chunk_size: usize },
}

/// Errors surfaced to the caller of a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("payload of {len} bytes needs more than {max} chunks")]
    PayloadTooLarge { len: usize, max: u32 },

    #[error("retry budget exhausted; unconfirmed chunks: {unconfirmed:?}")]
    RetriesExhausted { unconfirmed: Vec<u32> },

    #[error("transfer cancelled")]
    Cancelled,
}
