/// Sender loop: segment, send everything once, then alternate between
/// draining acknowledgments and resending whatever timed out.
///
/// ```text
/// start ──► [wait ≤ poll / next deadline] ──► ack? ──► on_ack
///                  ▲                                     │
///                  └──────────── tick (resend / done) ◄──┘
/// ```

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::ack::{on_ack, AckOutcome};
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::logging::{TransferEvent, TransferLog, TransferLogger};
use crate::progress::TransferProgress;
use crate::protocol::{decode, Message};
use crate::scheduler::{Scheduler, TickOutcome};
use crate::session::{SendSession, TransferState};
use crate::transport::Transport;

const COMPONENT: &str = "sender";

/// Result of a completed send.
#[derive(Debug, Clone)]
pub struct SendReport {
    pub payload_len: usize,
    pub total_chunks: u32,
    pub retransmits: u64,
    pub duration: Duration,
}

/// Deliver `payload` over `transport`. Blocks until every chunk is
/// acknowledged, a chunk runs out of retries, or `progress` is cancelled.
pub fn run_sender<T: Transport + ?Sized>(
    transport: &mut T,
    payload: Bytes,
    config: &TransferConfig,
    logger: &dyn TransferLogger,
    progress: &TransferProgress,
) -> Result<SendReport, TransferError> {
    config.validate()?;
    let log = |event| {
        logger.log(TransferLog {
            component: COMPONENT,
            event,
        })
    };

    let started = Instant::now();
    let mut session = SendSession::new(payload, config.chunk_size)?;
    let total_chunks = session.total_chunks();
    progress.set_total(total_chunks as u64, session.payload_len() as u64);
    progress.set_state(TransferState::Segmented);
    log(TransferEvent::SessionStarted {
        payload_len: session.payload_len(),
        total_chunks,
        chunk_size: config.chunk_size,
    });

    let scheduler = Scheduler::new(config);
    scheduler.start(&mut session, transport, Instant::now())?;
    for sequence in 0..total_chunks {
        log(TransferEvent::ChunkSent { sequence });
    }
    progress.set_state(session.state());

    let mut retransmits = 0u64;
    loop {
        if progress.is_cancelled() {
            session.set_state(TransferState::Cancelled);
            progress.set_state(TransferState::Cancelled);
            log(TransferEvent::Cancelled);
            return Err(TransferError::Cancelled);
        }

        let now = Instant::now();
        let mut deadline = now + config.poll_interval;
        if let Some(due) = scheduler.next_deadline(&session) {
            deadline = deadline.min(due);
        }

        if let Some(datagram) = transport.try_receive(deadline)? {
            match decode(&datagram, config.chunk_size) {
                Ok(Message::Ack(ack)) => match on_ack(&mut session, ack) {
                    AckOutcome::Accepted => {
                        progress
                            .chunks_done
                            .store(session.acked_count() as u64, Ordering::Relaxed);
                        log(TransferEvent::AckReceived {
                            sequence: ack.sequence,
                            acked: session.acked_count(),
                            total: total_chunks,
                        });
                    }
                    outcome => log(TransferEvent::AckIgnored {
                        sequence: ack.sequence,
                        reason: outcome.reason(),
                    }),
                },
                Ok(Message::Chunk(_)) => log(TransferEvent::UnexpectedMessage { kind: "chunk" }),
                Err(e) => log(TransferEvent::BadDatagram {
                    len: datagram.len(),
                    error: e.to_string(),
                }),
            }
        }

        match scheduler.tick(&mut session, transport, Instant::now())? {
            TickOutcome::Idle => {}
            TickOutcome::Retransmitted(sequences) => {
                retransmits += sequences.len() as u64;
                progress
                    .retransmits
                    .fetch_add(sequences.len() as u64, Ordering::Relaxed);
                for sequence in sequences {
                    log(TransferEvent::ChunkRetransmitted {
                        sequence,
                        attempt: session.retries(sequence),
                    });
                }
            }
            TickOutcome::Complete => {
                let duration = started.elapsed();
                progress.set_state(TransferState::Complete);
                log(TransferEvent::TransferComplete {
                    total_bytes: session.payload_len() as u64,
                    duration_ms: duration.as_millis() as u64,
                    retransmits,
                });
                return Ok(SendReport {
                    payload_len: session.payload_len(),
                    total_chunks,
                    retransmits,
                    duration,
                });
            }
            TickOutcome::Failed { unconfirmed } => {
                progress.set_state(TransferState::Failed);
                log(TransferEvent::TransferFailed {
                    unconfirmed: unconfirmed.clone(),
                });
                return Err(TransferError::RetriesExhausted { unconfirmed });
            }
        }
    }
}
