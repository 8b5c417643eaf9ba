// SPDX-License-Identifier: GPL-3.0-only

//! Message transport ordering and lifecycle

use photobooth::transport::{Inbound, MessageTransport, Outbound};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

fn drain(transport: &MessageTransport, count: usize) -> Vec<Inbound> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    while received.len() < count && Instant::now() < deadline {
        if let Some(message) = transport.receive(Duration::from_millis(7)) {
            received.push(message);
        }
    }
    received
}

#[test]
fn test_fifo_preserves_arrival_order() {
    let (ours, mut board) = UnixStream::pair().unwrap();
    let transport = MessageTransport::connect(ours).unwrap();

    let sent: Vec<String> = (1..=50).map(|n| format!("CAPTURE_{}", n)).collect();
    // Split writes at awkward boundaries
    let wire = sent.join("\n") + "\n";
    for chunk in wire.as_bytes().chunks(13) {
        board.write_all(chunk).unwrap();
    }

    let received = drain(&transport, sent.len());
    let expected: Vec<Inbound> = (1..=50).map(Inbound::Capture).collect();
    assert_eq!(received, expected);
}

#[test]
fn test_messages_queue_while_consumer_is_busy() {
    let (ours, mut board) = UnixStream::pair().unwrap();
    let transport = MessageTransport::connect(ours).unwrap();

    board.write_all(b"SESSION_START\nCAPTURE_1\nABORT\n").unwrap();
    // Simulate a long capture on the consumer side
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(transport.pending(), 3);

    assert_eq!(
        drain(&transport, 3),
        vec![Inbound::SessionStart, Inbound::Capture(1), Inbound::Abort]
    );
}

#[test]
fn test_receive_never_blocks_past_timeout() {
    let (ours, _board) = UnixStream::pair().unwrap();
    let transport = MessageTransport::connect(ours).unwrap();

    let start = Instant::now();
    assert!(transport.receive(Duration::from_millis(100)).is_none());
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_send_while_reading() {
    let (ours, board) = UnixStream::pair().unwrap();
    let mut transport = MessageTransport::connect(ours).unwrap();

    transport.send(Outbound::Ready).unwrap();
    transport.send(Outbound::CaptureAck(4)).unwrap();
    transport.send(Outbound::Complete).unwrap();

    let mut reader = BufReader::new(board);
    let mut lines = Vec::new();
    for _ in 0..3 {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        lines.push(line);
    }
    assert_eq!(lines, vec!["READY\n", "CAPTURE_ACK_4\n", "COMPLETE\n"]);
}

#[test]
fn test_disconnect_discards_pending() {
    let (ours, mut board) = UnixStream::pair().unwrap();
    let mut transport = MessageTransport::connect(ours).unwrap();

    board.write_all(b"SESSION_START\n").unwrap();
    std::thread::sleep(Duration::from_millis(200));

    transport.disconnect();
    assert!(!transport.is_connected());
    assert!(transport.receive(Duration::from_millis(10)).is_none());
}
