use bytes::BytesMut;
use nodebus_frame::{encode_frame, DeviceId, FrameError};
use nodebus_node::{ManualClock, Node, NodeConfig, NodeError, NullSink};
use nodebus_transport::{LoopbackBus, LoopbackTap, TransportError};

type BusNode = Node<LoopbackTap, ManualClock, NullSink>;

fn node_with(config: NodeConfig, tap: LoopbackTap) -> BusNode {
    Node::with_parts(config, tap, ManualClock::new(0), NullSink).expect("config should be valid")
}

fn node(id: u8, bus: &LoopbackBus) -> BusNode {
    node_with(NodeConfig::new(id), bus.tap())
}

fn raw_frame(dst: u8, src: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(DeviceId::new(dst), DeviceId::new(src), payload, &mut buf)
        .expect("payload should fit");
    buf.to_vec()
}

#[test]
fn two_nodes_exchange_fields() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);

    a.begin_write(2u8).expect("begin_write should open a packet");
    a.write8(0xAB).expect("write8 should fit");
    a.write16(0x1234).expect("write16 should fit");
    a.end_write().expect("end_write should send");

    assert_eq!(b.parse_packet().expect("parse should succeed"), Some(3));
    assert_eq!(b.packet_source(), Some(DeviceId::new(1)));
    assert_eq!(b.read8().expect("read8"), 0xAB);
    assert_eq!(b.read16().expect("read16"), 0x1234);
    b.end_read();
}

#[test]
fn empty_bus_returns_no_packet() {
    let bus = LoopbackBus::new();
    let mut b = node(2, &bus);

    assert_eq!(b.parse_packet().expect("parse should succeed"), None);
    assert!(!b.is_reading());
    assert!(matches!(b.read8(), Err(NodeError::NoOpenRead)));
}

#[test]
fn every_width_round_trips_in_order() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);

    let bytes = [0u8, 1, 0x7F, 0x80, 0xFF];
    let halves = [0u16, 1, 0x00FF, 0xFF00, u16::MAX];
    let words = [0u32, 1, 0x0102_0304, 0x8000_0000, u32::MAX];

    a.begin_write(2u8).unwrap();
    for v in bytes {
        a.write8(v).unwrap();
    }
    for v in halves {
        a.write16(v).unwrap();
    }
    for v in words {
        a.write32(v).unwrap();
    }
    a.write(b"tail").unwrap();
    a.end_write().unwrap();

    let expected_len = bytes.len() + halves.len() * 2 + words.len() * 4 + 4;
    assert_eq!(b.parse_packet().unwrap(), Some(expected_len));
    for v in bytes {
        assert_eq!(b.read8().unwrap(), v);
    }
    for v in halves {
        assert_eq!(b.read16().unwrap(), v);
    }
    for v in words {
        assert_eq!(b.read32().unwrap(), v);
    }
    let mut tail = [0u8; 4];
    b.read(&mut tail).unwrap();
    assert_eq!(&tail, b"tail");
    assert_eq!(b.remaining(), Some(0));
    assert!(matches!(
        b.read8(),
        Err(NodeError::Frame(FrameError::ReadPastEnd { .. }))
    ));
    b.end_read();
}

#[test]
fn zero_length_packet_is_not_the_sentinel() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);

    a.begin_write(2u8).unwrap();
    a.write(&[]).unwrap();
    a.end_write().unwrap();

    assert_eq!(b.parse_packet().unwrap(), Some(0));
    b.end_read();
    assert_eq!(b.parse_packet().unwrap(), None);
}

#[test]
fn partial_consumption_then_next_packet() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);

    for opcode in [0x10u8, 0x20] {
        a.begin_write(2u8).unwrap();
        a.write8(opcode).unwrap();
        a.write32(0xCAFE_F00D).unwrap();
        a.end_write().unwrap();
    }

    assert_eq!(b.parse_packet().unwrap(), Some(5));
    assert_eq!(b.read8().unwrap(), 0x10);
    assert_eq!(b.remaining(), Some(4));
    b.end_read();

    assert_eq!(b.parse_packet().unwrap(), Some(5));
    assert_eq!(b.read8().unwrap(), 0x20);
    b.end_read();
}

#[test]
fn aborted_write_puts_nothing_on_the_bus() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let b = node(2, &bus);

    a.begin_write(2u8).unwrap();
    a.write32(42).unwrap();
    assert!(a.abort_write());
    assert!(!a.abort_write());
    assert_eq!(b.transport().pending(), 0);

    a.begin_write(2u8).expect("a fresh packet can be opened after abort");
}

#[test]
fn oversize_write_puts_nothing_on_the_bus() {
    let bus = LoopbackBus::new();
    let config = NodeConfig {
        max_payload_size: 8,
        ..NodeConfig::new(1u8)
    };
    let mut a = node_with(config, bus.tap());
    let b = node(2, &bus);

    a.begin_write(2u8).unwrap();
    a.write32(1).unwrap();
    a.write32(2).unwrap();
    assert!(a.write8(3).is_err());
    assert!(matches!(
        a.end_write(),
        Err(NodeError::Frame(FrameError::PayloadTooLarge { size: 9, max: 8 }))
    ));
    assert_eq!(b.transport().pending(), 0);
    assert_eq!(a.end_write().unwrap(), 0);
}

#[test]
fn transport_frame_limit_applies_at_write_time() {
    let bus = LoopbackBus::new();
    // 16-byte frames leave room for 8 payload bytes.
    let mut a = node_with(NodeConfig::new(1u8), bus.tap().with_max_frame(16));
    let mut b = node(2, &bus);
    assert_eq!(a.payload_limit(), 8);
    assert_eq!(b.payload_limit(), 1024);

    a.begin_write(2u8).unwrap();
    a.write32(1).unwrap();
    a.write32(2).unwrap();
    assert!(matches!(
        a.write8(3),
        Err(NodeError::Frame(FrameError::PayloadTooLarge { size: 9, max: 8 }))
    ));
    assert!(a.end_write().is_err());
    assert_eq!(b.transport().pending(), 0);

    a.begin_write(2u8).unwrap();
    a.write(&[0xAA; 8]).unwrap();
    assert_eq!(a.end_write().unwrap(), 16);
    assert_eq!(b.parse_packet().unwrap(), Some(8));
    b.end_read();
}

#[test]
fn poll_reads_a_bounded_amount() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let config = NodeConfig {
        max_reads_per_poll: 2,
        ..NodeConfig::new(2u8)
    };
    let mut b = node_with(config, bus.tap().with_max_chunk(4));

    // Idle bus.
    b.poll().unwrap();

    a.begin_write(2u8).unwrap();
    a.write(&[0x55; 32]).unwrap();
    a.end_write().unwrap();
    let queued = b.transport().pending();

    // Two receives of at most four bytes each.
    b.poll().unwrap();
    assert_eq!(b.transport().pending(), queued - 8);
    assert_eq!(b.pending_rx(), 0);

    let mut polls = 1;
    while b.pending_rx() == 0 {
        b.poll().unwrap();
        polls += 1;
        assert!(polls < 100, "frame should complete");
    }
    assert_eq!(b.parse_packet().unwrap(), Some(32));
}

#[test]
fn fragmented_frames_reassemble() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node_with(NodeConfig::new(2u8), bus.tap().with_max_chunk(1));

    a.begin_write(2u8).unwrap();
    a.write16(0x0A0B).unwrap();
    a.end_write().unwrap();

    let mut result = None;
    for _ in 0..32 {
        result = b.parse_packet().unwrap();
        if result.is_some() {
            break;
        }
    }
    assert_eq!(result, Some(2));
    assert_eq!(b.read16().unwrap(), 0x0A0B);
}

#[test]
fn noise_and_corruption_are_skipped() {
    let bus = LoopbackBus::new();
    let mut b = node(2, &bus);

    let mut corrupt = raw_frame(2, 1, b"bad!");
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;

    bus.inject(&[0x00, 0x13, 0x4E, 0x00]);
    bus.inject(&corrupt);
    bus.inject(&raw_frame(2, 1, b"good"));

    assert_eq!(b.parse_packet().unwrap(), Some(4));
    let mut payload = [0u8; 4];
    b.read(&mut payload).unwrap();
    assert_eq!(&payload, b"good");
    b.end_read();

    assert_eq!(b.parse_packet().unwrap(), None);
    let stats = b.stats();
    assert_eq!(stats.rejected_frames, 1);
    assert!(stats.discarded_bytes >= 4 + corrupt.len() as u64);
}

#[test]
fn broadcast_reaches_every_node_that_accepts_it() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);
    let deaf = NodeConfig {
        accept_broadcast: false,
        ..NodeConfig::new(3u8)
    };
    let mut c = node_with(deaf, bus.tap());

    a.begin_write(DeviceId::BROADCAST).unwrap();
    a.write8(0x01).unwrap();
    a.end_write().unwrap();

    assert_eq!(b.parse_packet().unwrap(), Some(1));
    assert_eq!(b.packet_destination(), Some(DeviceId::BROADCAST));
    b.end_read();

    assert_eq!(c.parse_packet().unwrap(), None);
    assert_eq!(c.stats().frames_filtered, 1);
}

#[test]
fn address_filter_and_promiscuous_mode() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);
    let mut other = node(4, &bus);
    let sniffer = NodeConfig {
        promiscuous: true,
        ..NodeConfig::new(3u8)
    };
    let mut snoop = node_with(sniffer, bus.tap());

    a.begin_write(2u8).unwrap();
    a.write8(7).unwrap();
    a.end_write().unwrap();

    assert_eq!(other.parse_packet().unwrap(), None);
    assert_eq!(other.stats().frames_filtered, 1);

    assert_eq!(snoop.parse_packet().unwrap(), Some(1));
    assert_eq!(snoop.packet_destination(), Some(DeviceId::new(2)));
    snoop.end_read();

    assert_eq!(b.parse_packet().unwrap(), Some(1));
}

#[test]
fn own_frames_are_ignored() {
    let bus = LoopbackBus::new();
    let mut b = node(2, &bus);

    bus.inject(&raw_frame(DeviceId::BROADCAST.get(), 2, b"echo"));
    assert_eq!(b.parse_packet().unwrap(), None);
    assert_eq!(b.stats().own_frames_ignored, 1);

    let listen_to_self = NodeConfig {
        ignore_own_frames: false,
        ..NodeConfig::new(5u8)
    };
    let mut c = node_with(listen_to_self, bus.tap());
    bus.inject(&raw_frame(DeviceId::BROADCAST.get(), 5, b"echo"));
    assert_eq!(c.parse_packet().unwrap(), Some(4));
}

#[test]
fn inbound_overflow_drops_newest() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let config = NodeConfig {
        rx_queue_depth: 2,
        ..NodeConfig::new(2u8)
    };
    let mut b = node_with(config, bus.tap());

    for seq in 0..4u8 {
        a.begin_write(2u8).unwrap();
        a.write8(seq).unwrap();
        a.end_write().unwrap();
    }

    b.poll().unwrap();
    assert_eq!(b.pending_rx(), 2);
    assert_eq!(b.stats().rx_overflow, 2);

    for seq in 0..2u8 {
        assert_eq!(b.parse_packet().unwrap(), Some(1));
        assert_eq!(b.read8().unwrap(), seq);
        b.end_read();
    }
    assert_eq!(b.parse_packet().unwrap(), None);
}

#[test]
fn stale_partial_frame_expires() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let config = NodeConfig {
        stale_frame_polls: 3,
        ..NodeConfig::new(2u8)
    };
    let mut b = node_with(config, bus.tap());

    let truncated = raw_frame(2, 1, b"never finished");
    bus.inject(&truncated[..5]);

    b.poll().unwrap();
    assert_eq!(b.stats().stale_partials, 0);
    for _ in 0..3 {
        b.poll().unwrap();
    }
    let stats = b.stats();
    assert_eq!(stats.stale_partials, 1);
    assert_eq!(stats.discarded_bytes, 5);

    a.begin_write(2u8).unwrap();
    a.write8(1).unwrap();
    a.end_write().unwrap();
    assert_eq!(b.parse_packet().unwrap(), Some(1));
}

#[test]
fn stale_expiry_keeps_frames_behind_corrupt_length() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let config = NodeConfig {
        stale_frame_polls: 3,
        ..NodeConfig::new(2u8)
    };
    let mut b = node_with(config, bus.tap());

    let mut corrupt = raw_frame(2, 1, b"x");
    // Length 1 becomes 257; the frame waits for bytes that never come.
    corrupt[4] ^= 0x01;
    bus.inject(&corrupt);

    a.begin_write(2u8).unwrap();
    a.write16(0xBEEF).unwrap();
    a.end_write().unwrap();

    for _ in 0..10 {
        b.poll().unwrap();
    }

    let stats = b.stats();
    assert_eq!(stats.stale_partials, 1);
    assert_eq!(stats.frames_received, 1);
    assert_eq!(stats.discarded_bytes, corrupt.len() as u64);

    assert_eq!(b.parse_packet().unwrap(), Some(2));
    assert_eq!(b.packet_source(), Some(DeviceId::new(1)));
    assert_eq!(b.read16().unwrap(), 0xBEEF);
    b.end_read();
}

#[test]
fn dead_transceiver_is_reported() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    a.transport_mut().close();

    a.begin_write(2u8).unwrap();
    a.write8(1).unwrap();
    assert!(matches!(
        a.end_write(),
        Err(NodeError::Transport(TransportError::Shutdown))
    ));
    assert!(!a.is_writing());
    assert!(matches!(
        a.poll(),
        Err(NodeError::Transport(TransportError::Shutdown))
    ));
    assert!(matches!(
        a.parse_packet(),
        Err(NodeError::Transport(TransportError::Shutdown))
    ));
}

#[test]
fn stats_count_traffic() {
    let bus = LoopbackBus::new();
    let mut a = node(1, &bus);
    let mut b = node(2, &bus);

    for _ in 0..3 {
        a.begin_write(2u8).unwrap();
        a.end_write().unwrap();
    }
    b.poll().unwrap();

    assert_eq!(a.stats().frames_sent, 3);
    assert_eq!(b.stats().frames_received, 3);
    assert_eq!(b.stats().frames_queued, 0);
}
