/// Receiver loop: store chunks, acknowledge each one (subject to the
/// configured [`AckPolicy`](crate::config::AckPolicy)), and finish once every
/// chunk is present.
///
/// After completion the loop lingers for `ReceiverConfig::linger`, answering
/// retransmissions whose acknowledgments were lost, so the sender can finish
/// too.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::ReceiverConfig;
use crate::error::TransferError;
use crate::logging::{TransferEvent, TransferLog, TransferLogger};
use crate::progress::TransferProgress;
use crate::protocol::{decode, encode_ack, Message};
use crate::reassembler::{ChunkVerdict, Reassembler};
use crate::session::TransferState;
use crate::transport::Transport;

const COMPONENT: &str = "receiver";

/// Result of a completed receive.
#[derive(Debug, Clone)]
pub struct ReceiveReport {
    pub payload: Bytes,
    pub total_chunks: u32,
    pub duplicates: u64,
    pub acks_sent: u64,
    pub acks_suppressed: u64,
    /// From the first chunk to the last missing one.
    pub duration: Duration,
}

/// Receive one payload from `transport`. Blocks until the transfer is
/// complete (plus the linger period) or `progress` is cancelled.
pub fn run_receiver<T: Transport + ?Sized>(
    transport: &mut T,
    config: &ReceiverConfig,
    logger: &dyn TransferLogger,
    progress: &TransferProgress,
) -> Result<ReceiveReport, TransferError> {
    config.transfer.validate()?;
    let chunk_size = config.transfer.chunk_size;
    let log = |event| {
        logger.log(TransferLog {
            component: COMPONENT,
            event,
        })
    };

    let mut reassembler =
        Reassembler::new(chunk_size, config.ack_policy).with_max_chunks(config.max_chunks());
    let mut opened_at: Option<Instant> = None;
    let mut completed: Option<(Instant, Duration)> = None;
    let mut duplicates = 0u64;
    let mut acks_sent = 0u64;
    let mut acks_suppressed = 0u64;
    progress.set_state(TransferState::Receiving);

    let session = loop {
        if progress.is_cancelled() {
            progress.set_state(TransferState::Cancelled);
            log(TransferEvent::Cancelled);
            return Err(TransferError::Cancelled);
        }

        let now = Instant::now();
        let mut deadline = now + config.transfer.poll_interval;
        if let Some((done_at, _)) = completed {
            let linger_end = done_at + config.linger;
            if now >= linger_end {
                match reassembler.take_session() {
                    Some(session) => break session,
                    None => completed = None,
                }
            }
            deadline = deadline.min(linger_end);
        }

        let Some(datagram) = transport.try_receive(deadline)? else {
            continue;
        };
        let chunk = match decode(&datagram, chunk_size) {
            Ok(Message::Chunk(chunk)) => chunk,
            Ok(Message::Ack(_)) => {
                log(TransferEvent::UnexpectedMessage { kind: "ack" });
                continue;
            }
            Err(e) => {
                log(TransferEvent::BadDatagram {
                    len: datagram.len(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let outcome = reassembler.on_chunk(&chunk);
        match outcome.verdict {
            ChunkVerdict::Accepted => {
                let Some(session) = reassembler.session() else {
                    continue;
                };
                if opened_at.is_none() {
                    opened_at = Some(Instant::now());
                    progress.set_total(session.total_chunks() as u64, 0);
                    log(TransferEvent::SessionOpened {
                        total_chunks: session.total_chunks(),
                    });
                }
                progress
                    .chunks_done
                    .store(session.received_count() as u64, Ordering::Relaxed);
                log(TransferEvent::ChunkAccepted {
                    sequence: chunk.sequence,
                    received: session.received_count(),
                    total: session.total_chunks(),
                });
            }
            ChunkVerdict::Duplicate => {
                duplicates += 1;
                log(TransferEvent::DuplicateChunk {
                    sequence: chunk.sequence,
                });
            }
            ChunkVerdict::Discarded => {
                log(TransferEvent::ChunkDiscarded {
                    sequence: chunk.sequence,
                    total_chunks: chunk.total_chunks,
                });
            }
            ChunkVerdict::Rejected => {
                log(TransferEvent::SessionRejected {
                    total_chunks: chunk.total_chunks,
                    needed_bytes: chunk.total_chunks as u64 * chunk_size as u64,
                    limit_bytes: reassembler.max_chunks() as u64 * chunk_size as u64,
                });
            }
        }

        if let Some(ack) = outcome.ack {
            transport.send(&encode_ack(ack)?)?;
            acks_sent += 1;
            log(TransferEvent::AckSent {
                sequence: ack.sequence,
            });
        } else if outcome.suppressed {
            acks_suppressed += 1;
            progress.acks_suppressed.fetch_add(1, Ordering::Relaxed);
            log(TransferEvent::AckSuppressed {
                sequence: chunk.sequence,
            });
        }

        if completed.is_none() && reassembler.is_complete() {
            let done_at = Instant::now();
            let elapsed = opened_at.map_or(Duration::ZERO, |t| done_at - t);
            completed = Some((done_at, elapsed));
            progress.set_state(TransferState::Complete);
        }
    };

    let duration = completed.map_or(Duration::ZERO, |(_, elapsed)| elapsed);
    let total_chunks = session.total_chunks();
    let payload = session.into_payload(config.expected_len);
    progress
        .bytes_total
        .store(payload.len() as u64, Ordering::Relaxed);
    log(TransferEvent::ReceiveComplete {
        total_bytes: payload.len() as u64,
        duration_ms: duration.as_millis() as u64,
        duplicates,
    });

    Ok(ReceiveReport {
        payload,
        total_chunks,
        duplicates,
        acks_sent,
        acks_suppressed,
        duration,
    })
}
