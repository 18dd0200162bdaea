/// Splits a payload into fixed-size chunks.

use bytes::Bytes;

use crate::error::TransferError;
use crate::protocol::{Chunk, MAX_TOTAL_CHUNKS};

/// Number of chunks a payload of `len` bytes occupies. An empty payload
/// still occupies one (empty) chunk.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if len == 0 {
        1
    } else {
        len.div_ceil(chunk_size)
    }
}

/// Split `payload` into chunks of `chunk_size` bytes; the last may be shorter.
///
/// Chunks share the payload's buffer, so this does not copy.
pub fn segment(payload: Bytes, chunk_size: usize) -> Result<Vec<Chunk>, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidConfig("chunk_size must be non-zero".into()));
    }
    let count = chunk_count(payload.len(), chunk_size);
    let total_chunks = u32::try_from(count)
        .ok()
        .filter(|&n| n <= MAX_TOTAL_CHUNKS)
        .ok_or(TransferError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_TOTAL_CHUNKS,
        })?;

    let chunks = (0..total_chunks)
        .map(|sequence| {
            let start = sequence as usize * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            Chunk {
                sequence,
                total_chunks,
                payload: payload.slice(start.min(end)..end),
            }
        })
        .collect();
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_in_fives() {
        let chunks = segment(Bytes::from_static(b"HELLO WORLD"), 5).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.total_chunks == 3));
        assert_eq!(&chunks[0].payload[..], b"HELLO");
        assert_eq!(&chunks[1].payload[..], b" WORL");
        assert_eq!(&chunks[2].payload[..], b"D");
        assert!(chunks[2].is_last());
    }

    #[test]
    fn empty_payload_is_one_empty_chunk() {
        let chunks = segment(Bytes::new(), 25).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].total_chunks, 1);
        assert!(chunks[0].payload.is_empty());
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let chunks = segment(Bytes::from(vec![7u8; 75]), 25).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.payload.len() == 25));
    }

    #[test]
    fn segment_count_matches_ceiling() {
        for len in [1usize, 24, 25, 26, 49, 50, 51, 1000] {
            let chunks = segment(Bytes::from(vec![1u8; len]), 25).unwrap();
            assert_eq!(chunks.len(), len.div_ceil(25), "len {}", len);
        }
    }

    #[test]
    fn concatenation_reproduces_payload() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for chunk_size in [1usize, 7, 25, 512, 1024, 4096] {
            let chunks = segment(Bytes::from(payload.clone()), chunk_size).unwrap();
            let joined: Vec<u8> = chunks.iter().flat_map(|c| c.payload.iter().copied()).collect();
            assert_eq!(joined, payload, "chunk_size {}", chunk_size);
            for (i, c) in chunks.iter().enumerate() {
                assert_eq!(c.sequence as usize, i);
            }
        }
    }

    #[test]
    fn zero_chunk_size_rejected() {
        assert!(matches!(
            segment(Bytes::from_static(b"x"), 0),
            Err(TransferError::InvalidConfig(_))
        ));
    }
}
