mod config;

use std::io::{Read, Write};

use anyhow::Context;
use bytes::Bytes;
use tracing::info;

use ferry_transfer::{run_receiver, run_sender, TracingLogger, TransferProgress, UdpTransport};

use crate::config::{Config, Role};

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let mut transport =
        UdpTransport::bind(config.bind, config.peer).with_context(|| format!("bind {}", config.bind))?;
    info!(local = %transport.local_addr()?, role = ?config.role, "socket ready");

    let progress = TransferProgress::new();
    match config.role {
        Role::Send => {
            let payload = read_input(&config)?;
            let report = run_sender(&mut transport, payload, config.transfer(), &TracingLogger, &progress)
                .context("send failed")?;
            info!(
                bytes = report.payload_len,
                chunks = report.total_chunks,
                retransmits = report.retransmits,
                elapsed_ms = report.duration.as_millis() as u64,
                "sent"
            );
        }
        Role::Receive => {
            let report = run_receiver(&mut transport, &config.receiver, &TracingLogger, &progress)
                .context("receive failed")?;
            write_output(&config, &report.payload)?;
            info!(
                bytes = report.payload.len(),
                chunks = report.total_chunks,
                duplicates = report.duplicates,
                acks_suppressed = report.acks_suppressed,
                elapsed_ms = report.duration.as_millis() as u64,
                "received"
            );
        }
    }

    Ok(())
}

fn read_input(config: &Config) -> anyhow::Result<Bytes> {
    let data = match &config.input {
        Some(path) => std::fs::read(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data).context("read stdin")?;
            data
        }
    };
    Ok(Bytes::from(data))
}

fn write_output(config: &Config, payload: &[u8]) -> anyhow::Result<()> {
    match &config.output {
        Some(path) => std::fs::write(path, payload).with_context(|| format!("write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(payload).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}
