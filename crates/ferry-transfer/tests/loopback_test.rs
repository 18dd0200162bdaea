/// Integration test: send a payload to localhost over real UDP sockets and
/// verify it arrives intact.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use ferry_transfer::{
    run_receiver, run_sender, AckPolicy, LossyTransport, ReceiverConfig, SimulatorConfig,
    TracingLogger, TransferConfig, TransferProgress, UdpTransport, DEFAULT_CHUNK_SIZE,
};

#[test]
fn loopback_transfer_small_payload() {
    loopback_transfer(1024 * 10, 0.0); // 10 KB
}

#[test]
fn loopback_transfer_exact_chunk_boundary() {
    loopback_transfer(DEFAULT_CHUNK_SIZE * 3, 0.0); // exactly 3 chunks
}

#[test]
fn loopback_transfer_with_sender_loss() {
    loopback_transfer(1024 * 100, 0.05);
}

fn loopback_transfer(len: usize, loss_rate: f64) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ferry_transfer=info")
        .with_test_writer()
        .try_init();

    // Known pattern; the last byte is never zero so no length hint is needed.
    let payload: Bytes = (0..len).map(|i| (i % 251) as u8 | 1).collect::<Vec<_>>().into();

    let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut receiver_side = UdpTransport::bind(localhost, None).unwrap();
    let receiver_addr = receiver_side.local_addr().unwrap();
    let sender_side = UdpTransport::bind(localhost, Some(receiver_addr)).unwrap();
    let mut sender_side = LossyTransport::new(
        sender_side,
        SimulatorConfig {
            loss_rate,
            seed: len as u64,
            ..Default::default()
        },
    );

    let config = TransferConfig {
        retransmit_timeout: Duration::from_millis(50),
        max_retries: 8,
        ..Default::default()
    };
    let rx_config = ReceiverConfig {
        transfer: config.clone(),
        ack_policy: AckPolicy::Always,
        expected_len: None,
        linger: Duration::from_millis(500),
        ..Default::default()
    };

    let receiver = thread::spawn(move || {
        run_receiver(&mut receiver_side, &rx_config, &TracingLogger, &TransferProgress::new())
    });

    let progress = TransferProgress::new();
    let sent = run_sender(&mut sender_side, payload.clone(), &config, &TracingLogger, &progress)
        .expect("send failed");
    let received = receiver
        .join()
        .expect("receiver thread panicked")
        .expect("receive failed");

    let expected_chunks = len.div_ceil(DEFAULT_CHUNK_SIZE) as u32;
    assert_eq!(sent.total_chunks, expected_chunks);
    assert_eq!(received.total_chunks, expected_chunks);
    assert_eq!(received.payload.len(), len);
    assert!(received.payload == payload, "payload mismatch");
    assert_eq!(progress.fraction(), 1.0);

    if loss_rate > 0.0 {
        assert!(sender_side.stats().dropped > 0);
        assert!(sent.retransmits > 0);
    }
}
