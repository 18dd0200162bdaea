/// Transfer tuning shared by both roles.
///
/// Defaults follow the lab deployment: 512-byte chunks, a 100 ms
/// retransmission timeout and five retries per chunk.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TransferError;
use crate::protocol::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Parameters both peers must agree on, plus the sender's retry policy.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Payload bytes per chunk (C). Must match on both sides.
    pub chunk_size: usize,
    /// Time after which an unacknowledged chunk is resent (T).
    pub retransmit_timeout: Duration,
    /// Retransmissions allowed per chunk before the transfer fails.
    pub max_retries: u32,
    /// Upper bound on a single wait for incoming datagrams.
    pub poll_interval: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retransmit_timeout: Duration::from_millis(100),
            max_retries: 5,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(TransferError::InvalidConfig(format!(
                "chunk_size must be in 1..={}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        if self.retransmit_timeout.is_zero() {
            return Err(TransferError::InvalidConfig(
                "retransmit_timeout must be non-zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(TransferError::InvalidConfig(
                "poll_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Which acknowledgments the receiver deliberately withholds.
///
/// Anything other than `Always` is a debugging aid for exercising the
/// sender's retransmission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    #[default]
    Always,
    /// Withhold every n-th acknowledgment the receiver would send.
    SkipEveryNth(u32),
    /// Never acknowledge sequences that are multiples of n.
    NeverAckMultiplesOf(u32),
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::SkipEveryNth(n) => write!(f, "skip:{}", n),
            Self::NeverAckMultiplesOf(n) => write!(f, "never:{}", n),
        }
    }
}

impl FromStr for AckPolicy {
    type Err = TransferError;

    /// Parses `always`, `skip:N` or `never:N` (N > 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("always") {
            return Ok(Self::Always);
        }
        let (kind, n) = s
            .split_once(':')
            .ok_or_else(|| TransferError::InvalidConfig(format!("unknown ack policy {:?}", s)))?;
        let n: u32 = n
            .parse()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| TransferError::InvalidConfig(format!("bad ack policy period {:?}", n)))?;
        match kind {
            "skip" => Ok(Self::SkipEveryNth(n)),
            "never" => Ok(Self::NeverAckMultiplesOf(n)),
            _ => Err(TransferError::InvalidConfig(format!("unknown ack policy {:?}", s))),
        }
    }
}

/// Default cap on an incoming payload (64 MB).
pub const DEFAULT_MAX_PAYLOAD_LEN: u64 = 64 * 1024 * 1024;

/// Receiver-side configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub transfer: TransferConfig,
    pub ack_policy: AckPolicy,
    /// Original payload length, when known out of band. Also caps the
    /// transfer size.
    pub expected_len: Option<u64>,
    /// How long to keep re-acknowledging retransmissions after completion.
    pub linger: Duration,
    /// Largest payload the receiver will allocate for.
    pub max_payload_len: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            ack_policy: AckPolicy::Always,
            expected_len: None,
            linger: Duration::from_secs(1),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

impl ReceiverConfig {
    /// Most chunks a first chunk may announce: enough for `max_payload_len`,
    /// or for `expected_len` when that is smaller. Never less than one.
    pub fn max_chunks(&self) -> u32 {
        let limit = match self.expected_len {
            Some(len) => len.min(self.max_payload_len),
            None => self.max_payload_len,
        };
        let chunk_size = self.transfer.chunk_size.max(1) as u64;
        u32::try_from(limit.div_ceil(chunk_size).max(1)).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TransferConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let config = TransferConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TransferError::InvalidConfig(_))));
    }

    #[test]
    fn max_chunks_follows_the_tighter_bound() {
        let mut config = ReceiverConfig {
            transfer: TransferConfig {
                chunk_size: 512,
                ..Default::default()
            },
            max_payload_len: 512 * 100,
            ..Default::default()
        };
        assert_eq!(config.max_chunks(), 100);

        config.expected_len = Some(1025);
        assert_eq!(config.max_chunks(), 3);

        config.expected_len = Some(0);
        assert_eq!(config.max_chunks(), 1);

        config.expected_len = Some(u64::MAX);
        assert_eq!(config.max_chunks(), 100);
    }

    #[test]
    fn parse_ack_policies() {
        assert_eq!("always".parse::<AckPolicy>().unwrap(), AckPolicy::Always);
        assert_eq!("skip:3".parse::<AckPolicy>().unwrap(), AckPolicy::SkipEveryNth(3));
        assert_eq!(
            "never:3".parse::<AckPolicy>().unwrap(),
            AckPolicy::NeverAckMultiplesOf(3)
        );
        assert!("skip:0".parse::<AckPolicy>().is_err());
        assert!("drop:2".parse::<AckPolicy>().is_err());
        assert!("sometimes".parse::<AckPolicy>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for policy in [AckPolicy::Always, AckPolicy::SkipEveryNth(4), AckPolicy::NeverAckMultiplesOf(2)] {
            assert_eq!(policy.to_string().parse::<AckPolicy>().unwrap(), policy);
        }
    }
}
