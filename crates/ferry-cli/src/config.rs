use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use ferry_transfer::{AckPolicy, ReceiverConfig, TransferConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Send,
    Receive,
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "send" | "sender" => Ok(Self::Send),
            "recv" | "receive" | "receiver" => Ok(Self::Receive),
            other => Err(anyhow!("unknown role {:?} (expected send or recv)", other)),
        }
    }
}

/// Settings read from `FERRY_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    pub bind: SocketAddr,
    pub peer: Option<SocketAddr>,
    pub receiver: ReceiverConfig,
    /// Payload source for the sender; stdin when unset.
    pub input: Option<PathBuf>,
    /// Payload destination for the receiver; stdout when unset.
    pub output: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn transfer(&self) -> &TransferConfig {
        &self.receiver.transfer
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let role: Role = get("FERRY_ROLE")
            .unwrap_or_else(|| "recv".into())
            .parse()?;

        let default_bind = match role {
            Role::Send => "0.0.0.0:0",
            Role::Receive => "0.0.0.0:9000",
        };
        let bind: SocketAddr = get("FERRY_BIND")
            .unwrap_or_else(|| default_bind.into())
            .parse()
            .context("FERRY_BIND")?;
        let peer: Option<SocketAddr> = get("FERRY_PEER")
            .map(|s| s.parse())
            .transpose()
            .context("FERRY_PEER")?;
        if role == Role::Send && peer.is_none() {
            bail!("FERRY_PEER is required when sending");
        }

        let defaults = ReceiverConfig::default();
        let transfer = TransferConfig {
            chunk_size: parse_or(&get, "FERRY_CHUNK_SIZE", defaults.transfer.chunk_size)?,
            retransmit_timeout: millis_or(&get, "FERRY_TIMEOUT_MS", defaults.transfer.retransmit_timeout)?,
            max_retries: parse_or(&get, "FERRY_MAX_RETRIES", defaults.transfer.max_retries)?,
            ..defaults.transfer
        };
        transfer.validate()?;

        let ack_policy: AckPolicy = match get("FERRY_ACK_POLICY") {
            Some(s) => s.parse().context("FERRY_ACK_POLICY")?,
            None => AckPolicy::Always,
        };
        let expected_len: Option<u64> = get("FERRY_EXPECTED_LEN")
            .map(|s| s.parse())
            .transpose()
            .context("FERRY_EXPECTED_LEN")?;

        Ok(Self {
            role,
            bind,
            peer,
            receiver: ReceiverConfig {
                transfer,
                ack_policy,
                expected_len,
                linger: millis_or(&get, "FERRY_LINGER_MS", defaults.linger)?,
                max_payload_len: parse_or(&get, "FERRY_MAX_PAYLOAD_LEN", defaults.max_payload_len)?,
            },
            input: get("FERRY_INPUT").filter(|s| s != "-").map(PathBuf::from),
            output: get("FERRY_OUTPUT").filter(|s| s != "-").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(s) => s.trim().parse().with_context(|| format!("{key}={s:?}")),
        None => Ok(default),
    }
}

fn millis_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match get(key) {
        Some(_) => parse_or(get, key, 0u64).map(Duration::from_millis),
        None => Ok(default),
    }
}
