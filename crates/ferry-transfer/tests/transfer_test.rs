/// Integration tests: full sender/receiver runs over in-memory links, with
/// and without injected faults.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use ferry_transfer::{
    run_receiver, run_sender, AckPolicy, ChannelTransport, LossyTransport, NullLogger, Opening,
    Peer, ReceiveReport, ReceiverConfig, SendReport, SimulatorConfig, TracingLogger,
    TransferConfig, TransferError, TransferProgress, Transport,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ferry_transfer=debug".into()))
        .with_test_writer()
        .try_init();
}

fn fast(chunk_size: usize) -> TransferConfig {
    TransferConfig {
        chunk_size,
        retransmit_timeout: Duration::from_millis(50),
        max_retries: 5,
        poll_interval: Duration::from_millis(10),
    }
}

fn receiver_config(transfer: TransferConfig, ack_policy: AckPolicy) -> ReceiverConfig {
    ReceiverConfig {
        transfer,
        ack_policy,
        expected_len: None,
        linger: Duration::from_millis(300),
        ..Default::default()
    }
}

fn pattern(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

/// Run a receiver on its own thread and a sender on this one.
fn transfer<S, R>(
    mut sender_side: S,
    mut receiver_side: R,
    payload: Bytes,
    config: TransferConfig,
    rx_config: ReceiverConfig,
) -> (Result<SendReport, TransferError>, Result<ReceiveReport, TransferError>)
where
    S: Transport,
    R: Transport + Send + 'static,
{
    let receiver = thread::spawn(move || {
        run_receiver(&mut receiver_side, &rx_config, &TracingLogger, &TransferProgress::new())
    });
    let sent = run_sender(&mut sender_side, payload, &config, &TracingLogger, &TransferProgress::new());
    let received = receiver.join().expect("receiver thread panicked");
    (sent, received)
}

#[test]
fn hello_world_over_clean_link() {
    init_tracing();
    let (a, b) = ChannelTransport::pair();
    let config = fast(5);
    let (sent, received) = transfer(
        a,
        b,
        Bytes::from_static(b"HELLO WORLD"),
        config.clone(),
        receiver_config(config, AckPolicy::Always),
    );

    let sent = sent.unwrap();
    assert_eq!(sent.total_chunks, 3);
    assert_eq!(sent.retransmits, 0);

    let received = received.unwrap();
    assert_eq!(&received.payload[..], b"HELLO WORLD");
    assert_eq!(received.total_chunks, 3);
    assert_eq!(received.duplicates, 0);
}

#[test]
fn lost_ack_is_recovered_by_one_retransmission() {
    init_tracing();
    let (a, b) = ChannelTransport::pair();
    // Drop the first acknowledgment of chunk 1 only.
    let mut dropped = false;
    let b = LossyTransport::new(b, SimulatorConfig::default()).drop_when(move |d| {
        if !dropped && d == [0, 0, 0, 1] {
            dropped = true;
            return true;
        }
        false
    });

    let config = fast(5);
    let (sent, received) = transfer(
        a,
        b,
        Bytes::from_static(b"HELLO WORLD"),
        config.clone(),
        receiver_config(config, AckPolicy::Always),
    );

    assert_eq!(sent.unwrap().retransmits, 1);
    let received = received.unwrap();
    assert_eq!(&received.payload[..], b"HELLO WORLD");
    assert_eq!(received.duplicates, 1);
}

#[test]
fn permanently_unacked_chunks_exhaust_retries() {
    init_tracing();
    let (a, b) = ChannelTransport::pair();
    let config = TransferConfig {
        max_retries: 2,
        ..fast(4)
    };
    // 24 bytes in 4-byte chunks: sequences 0 and 3 are never acknowledged.
    let (sent, received) = transfer(
        a,
        b,
        pattern(24),
        config.clone(),
        receiver_config(config, AckPolicy::NeverAckMultiplesOf(3)),
    );

    match sent {
        Err(TransferError::RetriesExhausted { unconfirmed }) => assert_eq!(unconfirmed, vec![0, 3]),
        other => panic!("expected retry exhaustion, got {other:?}"),
    }
    // The receiver still got everything.
    let received = received.unwrap();
    assert_eq!(received.payload, pattern(24));
    assert!(received.acks_suppressed >= 2);
}

#[test]
fn periodic_ack_skipping_still_completes() {
    init_tracing();
    let (a, b) = ChannelTransport::pair();
    let config = fast(16);
    let payload = pattern(16 * 9 + 3);
    let (sent, received) = transfer(
        a,
        b,
        payload.clone(),
        config.clone(),
        receiver_config(config, AckPolicy::SkipEveryNth(3)),
    );

    let sent = sent.unwrap();
    assert_eq!(sent.total_chunks, 10);
    assert!(sent.retransmits >= 3);
    assert_eq!(received.unwrap().payload, payload);
}

#[test]
fn survives_loss_duplication_and_reordering() {
    init_tracing();
    let (a, b) = ChannelTransport::pair();
    let faults = |seed| SimulatorConfig {
        loss_rate: 0.1,
        duplicate_rate: 0.05,
        reorder_rate: 0.05,
        seed,
    };
    let a = LossyTransport::new(a, faults(7));
    let b = LossyTransport::new(b, faults(11));

    let config = TransferConfig {
        max_retries: 10,
        ..fast(512)
    };
    let payload = pattern(64 * 1024 + 100);
    let (sent, received) = transfer(
        a,
        b,
        payload.clone(),
        config.clone(),
        receiver_config(config, AckPolicy::Always),
    );

    let sent = sent.unwrap();
    assert_eq!(sent.total_chunks, 129);
    assert!(sent.retransmits > 0);
    assert_eq!(received.unwrap().payload, payload);
}

#[test]
fn trailing_zeros_need_expected_len() {
    init_tracing();
    let payload = Bytes::from_static(b"DATA\0\0\0");

    let (a, b) = ChannelTransport::pair();
    let config = fast(4);
    let (_, received) = transfer(
        a,
        b,
        payload.clone(),
        config.clone(),
        receiver_config(config.clone(), AckPolicy::Always),
    );
    // Indistinguishable from padding without the real length.
    assert_eq!(&received.unwrap().payload[..], b"DATA");

    let (a, b) = ChannelTransport::pair();
    let rx_config = ReceiverConfig {
        expected_len: Some(7),
        ..receiver_config(config.clone(), AckPolicy::Always)
    };
    let (_, received) = transfer(a, b, payload.clone(), config, rx_config);
    assert_eq!(received.unwrap().payload, payload);
}

#[test]
fn receiver_can_be_cancelled_from_another_thread() {
    let (_a, mut b) = ChannelTransport::pair();
    let progress = Arc::new(TransferProgress::new());
    let canceller = {
        let progress = Arc::clone(&progress);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            progress.cancel();
        })
    };
    let result = run_receiver(
        &mut b,
        &receiver_config(fast(16), AckPolicy::Always),
        &NullLogger,
        &progress,
    );
    canceller.join().unwrap();
    assert!(matches!(result, Err(TransferError::Cancelled)));
}

#[test]
fn peers_exchange_payloads_in_turn() {
    init_tracing();
    let (a, b) = ChannelTransport::pair();
    let config = receiver_config(fast(8), AckPolicy::Always);

    let mut first = Peer::new(a, config.clone(), Arc::new(TracingLogger));
    let mut second = Peer::new(
        LossyTransport::new(
            b,
            SimulatorConfig {
                loss_rate: 0.1,
                seed: 3,
                ..Default::default()
            },
        ),
        config,
        Arc::new(TracingLogger),
    );

    let answer = thread::spawn(move || {
        second.exchange(
            Bytes::from_static(b"pong from the second peer"),
            Opening::ReceiveFirst,
            &TransferProgress::new(),
        )
    });
    let ours = first
        .exchange(
            Bytes::from_static(b"ping from the first peer"),
            Opening::SendFirst,
            &TransferProgress::new(),
        )
        .unwrap();
    let theirs = answer.join().unwrap().unwrap();

    assert_eq!(&ours.received.payload[..], b"pong from the second peer");
    assert_eq!(&theirs.received.payload[..], b"ping from the first peer");
    assert_eq!(ours.sent.total_chunks, 3);
    assert_eq!(theirs.sent.total_chunks, 4);
}
