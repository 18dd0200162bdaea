/// Two-way exchange over a single transport.
///
/// Each peer takes a sending turn and a receiving turn; one side opens by
/// sending, the other by receiving. During a turn, messages of the other
/// role's kind are logged and ignored, and the receiving turn's linger keeps
/// answering late retransmissions before the roles swap.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::ReceiverConfig;
use crate::error::TransferError;
use crate::logging::TransferLogger;
use crate::progress::TransferProgress;
use crate::receiver::{run_receiver, ReceiveReport};
use crate::sender::{run_sender, SendReport};
use crate::transport::Transport;

/// Which turn a peer takes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opening {
    SendFirst,
    ReceiveFirst,
}

/// Both halves of a completed exchange.
#[derive(Debug, Clone)]
pub struct ExchangeReport {
    pub sent: SendReport,
    pub received: ReceiveReport,
}

pub struct Peer<T> {
    transport: T,
    config: ReceiverConfig,
    logger: Arc<dyn TransferLogger>,
}

impl<T: Transport> Peer<T> {
    pub fn new(transport: T, config: ReceiverConfig, logger: Arc<dyn TransferLogger>) -> Self {
        Self {
            transport,
            config,
            logger,
        }
    }

    /// One sending turn.
    pub fn send(
        &mut self,
        payload: Bytes,
        progress: &TransferProgress,
    ) -> Result<SendReport, TransferError> {
        run_sender(
            &mut self.transport,
            payload,
            &self.config.transfer,
            &*self.logger,
            progress,
        )
    }

    /// One receiving turn.
    pub fn receive(&mut self, progress: &TransferProgress) -> Result<ReceiveReport, TransferError> {
        run_receiver(&mut self.transport, &self.config, &*self.logger, progress)
    }

    /// Send `outgoing` and receive the other side's payload, in the order
    /// given by `opening`. Cancelling `progress` stops whichever turn is
    /// running.
    pub fn exchange(
        &mut self,
        outgoing: Bytes,
        opening: Opening,
        progress: &TransferProgress,
    ) -> Result<ExchangeReport, TransferError> {
        let (sent, received) = match opening {
            Opening::SendFirst => {
                let sent = self.send(outgoing, progress)?;
                (sent, self.receive(progress)?)
            }
            Opening::ReceiveFirst => {
                let received = self.receive(progress)?;
                (self.send(outgoing, progress)?, received)
            }
        };
        Ok(ExchangeReport { sent, received })
    }
}
