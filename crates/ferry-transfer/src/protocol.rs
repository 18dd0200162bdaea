/// Datagram formats for chunked transfer.
///
/// ```text
/// Chunk message (8 + C bytes):
/// [0..4]    Sequence number (i32 BE)
/// [4..8]    Total chunks in this transfer (i32 BE)
/// [8..8+C]  Payload, zero-padded to exactly C bytes
///
/// Acknowledgment message (4 bytes):
/// [0..4]    Sequence number being confirmed (i32 BE)
/// ```
///
/// Both peers agree on C out of band, so the two message kinds are told
/// apart by datagram length alone.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::WireError;

/// Size of the chunk header (sequence + total chunks).
pub const CHUNK_HEADER: usize = 8;

/// Size of an acknowledgment datagram.
pub const ACK_SIZE: usize = 4;

/// Default chunk payload size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Largest payload a single datagram can carry (65507 = 65535 - 8 UDP - 20 IP).
pub const MAX_CHUNK_SIZE: usize = 65_507 - CHUNK_HEADER;

/// Largest chunk count representable on the wire.
pub const MAX_TOTAL_CHUNKS: u32 = i32::MAX as u32;

/// One slice of a payload, tagged with its position in the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence: u32,
    pub total_chunks: u32,
    pub payload: Bytes,
}

impl Chunk {
    /// True for the chunk with the highest sequence number.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.sequence + 1 == self.total_chunks
    }
}

/// Confirmation that the chunk with `sequence` arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ack {
    pub sequence: u32,
}

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Chunk(Chunk),
    Ack(Ack),
}

/// Encode a chunk into a fixed-size record of `CHUNK_HEADER + chunk_size` bytes.
pub fn encode_chunk(chunk: &Chunk, chunk_size: usize) -> Result<Bytes, WireError> {
    if chunk.payload.len() > chunk_size {
        return Err(WireError::PayloadTooLong {
            len: chunk.payload.len(),
            chunk_size,
        });
    }
    let sequence = to_wire_int(chunk.sequence)?;
    let total = to_wire_int(chunk.total_chunks)?;

    let mut buf = BytesMut::with_capacity(CHUNK_HEADER + chunk_size);
    buf.put_i32(sequence);
    buf.put_i32(total);
    buf.put_slice(&chunk.payload);
    buf.put_bytes(0, chunk_size - chunk.payload.len());
    Ok(buf.freeze())
}

/// Encode an acknowledgment.
pub fn encode_ack(ack: Ack) -> Result<Bytes, WireError> {
    let mut buf = BytesMut::with_capacity(ACK_SIZE);
    buf.put_i32(to_wire_int(ack.sequence)?);
    Ok(buf.freeze())
}

/// Decode a datagram received from a peer using the same `chunk_size`.
///
/// The final chunk of a transfer has its zero padding trimmed (trailing-NUL
/// convention). Receivers that know the original length restore any real
/// trailing zeros from their zero-filled reconstruction buffer.
pub fn decode(datagram: &[u8], chunk_size: usize) -> Result<Message, WireError> {
    let mut buf = datagram;
    match datagram.len() {
        ACK_SIZE => {
            let sequence = from_wire_int(buf.get_i32())?;
            Ok(Message::Ack(Ack { sequence }))
        }
        len if len == CHUNK_HEADER + chunk_size => {
            let sequence = from_wire_int(buf.get_i32())?;
            let total_chunks = from_wire_int(buf.get_i32())?;
            if total_chunks == 0 {
                return Err(WireError::ZeroChunks);
            }
            if sequence >= total_chunks {
                return Err(WireError::SequenceOutOfRange {
                    sequence,
                    total_chunks,
                });
            }
            let mut payload = &datagram[CHUNK_HEADER..];
            if sequence + 1 == total_chunks {
                let end = payload.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                payload = &payload[..end];
            }
            Ok(Message::Chunk(Chunk {
                sequence,
                total_chunks,
                payload: Bytes::copy_from_slice(payload),
            }))
        }
        len => Err(WireError::BadLength {
            len,
            expected_chunk: CHUNK_HEADER + chunk_size,
        }),
    }
}

fn to_wire_int(value: u32) -> Result<i32, WireError> {
    i32::try_from(value).map_err(|_| WireError::IntegerOverflow(value))
}

fn from_wire_int(value: i32) -> Result<u32, WireError> {
    u32::try_from(value).map_err(|_| WireError::Negative(value))
}
