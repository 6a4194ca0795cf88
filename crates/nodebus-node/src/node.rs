use std::collections::VecDeque;

use bytes::Bytes;
use nodebus_frame::{
    DeviceId, Frame, FrameAccumulator, PacketReader, PacketWriter, FRAME_OVERHEAD,
};
use nodebus_transport::Transport;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::NodeConfig;
use crate::diag::{DiagnosticSink, StdoutSink};
use crate::error::{NodeError, Result};

/// Bytes requested from the transport per receive call.
pub const RECEIVE_CHUNK: usize = 512;

/// Counters describing what a node has done since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Frames handed to the transport.
    pub frames_sent: u64,
    /// Frames that had to wait in the outbound queue.
    pub frames_queued: u64,
    /// Frames accepted into the inbound queue.
    pub frames_received: u64,
    /// Frames addressed to some other node.
    pub frames_filtered: u64,
    /// Frames this node sent itself, heard back from the medium.
    pub own_frames_ignored: u64,
    /// Accepted frames dropped because the inbound queue was full.
    pub rx_overflow: u64,
    /// Partial frames discarded after going idle.
    pub stale_partials: u64,
    /// Complete frames that failed validation.
    pub rejected_frames: u64,
    /// Bytes skipped while resynchronizing or expiring partial frames.
    pub discarded_bytes: u64,
}

/// One addressable participant on the bus.
///
/// A node owns its transport, clock and diagnostic sink. All work happens on
/// the caller's thread inside the calls below; nothing blocks and nothing
/// runs in the background.
///
/// Outgoing packets follow `begin_write` → `write*` → `end_write`.
/// Incoming packets follow `parse_packet` → `read*` → `end_read`.
/// At most one of each is open at a time. `poll` services the transport and
/// should be called regularly.
pub struct Node<T, C = SystemClock, D = StdoutSink> {
    id: DeviceId,
    config: NodeConfig,
    transport: T,
    clock: C,
    diag: D,
    accumulator: FrameAccumulator,
    outgoing: Option<PacketWriter>,
    incoming: Option<PacketReader>,
    rx_queue: VecDeque<Frame>,
    tx_queue: VecDeque<Bytes>,
    idle_polls: u32,
    stats: NodeStats,
    scratch: Box<[u8]>,
}

impl<T: Transport> Node<T> {
    /// Create a node with default settings, the system clock and stdout
    /// diagnostics.
    pub fn new(device_id: impl Into<DeviceId>, transport: T) -> Self {
        Self::assemble(
            NodeConfig::new(device_id),
            transport,
            SystemClock::new(),
            StdoutSink,
        )
    }

    /// Create a node from a validated configuration.
    pub fn with_config(config: NodeConfig, transport: T) -> Result<Self> {
        Self::with_parts(config, transport, SystemClock::new(), StdoutSink)
    }
}

impl<T: Transport, C: Clock, D: DiagnosticSink> Node<T, C, D> {
    /// Create a node with every collaborator supplied by the caller.
    pub fn with_parts(config: NodeConfig, transport: T, clock: C, diag: D) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, transport, clock, diag))
    }

    fn assemble(config: NodeConfig, transport: T, clock: C, diag: D) -> Self {
        debug!(
            device_id = config.device_id,
            transport = transport.name(),
            "node created"
        );
        Self {
            id: config.device(),
            accumulator: FrameAccumulator::with_max_payload(config.max_payload_size),
            rx_queue: VecDeque::with_capacity(config.rx_queue_depth),
            tx_queue: VecDeque::with_capacity(config.tx_queue_depth),
            config,
            transport,
            clock,
            diag,
            outgoing: None,
            incoming: None,
            idle_polls: 0,
            stats: NodeStats::default(),
            scratch: vec![0u8; RECEIVE_CHUNK].into_boxed_slice(),
        }
    }

    /// This node's fixed bus address.
    pub fn device_id(&self) -> DeviceId {
        self.id
    }

    /// The configuration the node was built with.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Counters since construction.
    pub fn stats(&self) -> NodeStats {
        NodeStats {
            rejected_frames: self.accumulator.rejected_frames(),
            discarded_bytes: self.accumulator.discarded_bytes(),
            ..self.stats
        }
    }

    /// Current tick count from the node's clock.
    pub fn local_clock(&self) -> u32 {
        self.clock.now()
    }

    /// Forward `text` to the diagnostic sink. Sink failures are ignored.
    pub fn print(&mut self, text: impl AsRef<str>) {
        self.emit(text.as_ref());
    }

    /// Forward `text` plus a line terminator to the diagnostic sink.
    pub fn println(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.emit(&line);
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = self.diag.write_text(text) {
            trace!(error = %err, "diagnostic sink failed; text dropped");
        }
    }

    // ── write framer ────────────────────────────────────────────────

    /// Open an outgoing packet for `destination`.
    pub fn begin_write(&mut self, destination: impl Into<DeviceId>) -> Result<()> {
        if self.outgoing.is_some() {
            return Err(NodeError::WriteAlreadyOpen);
        }
        self.outgoing = Some(PacketWriter::with_max_payload(
            destination.into(),
            self.payload_limit(),
        ));
        Ok(())
    }

    /// Largest payload a packet may carry: the configured limit, further
    /// capped by what the transport can send in one frame.
    pub fn payload_limit(&self) -> usize {
        match self.transport.max_frame_size() {
            Some(frame) => self
                .config
                .max_payload_size
                .min(frame.saturating_sub(FRAME_OVERHEAD)),
            None => self.config.max_payload_size,
        }
    }

    /// True while an outgoing packet is open.
    pub fn is_writing(&self) -> bool {
        self.outgoing.is_some()
    }

    pub fn write8(&mut self, value: u8) -> Result<()> {
        self.open_write()?.put_u8(value)?;
        Ok(())
    }

    pub fn write16(&mut self, value: u16) -> Result<()> {
        self.open_write()?.put_u16(value)?;
        Ok(())
    }

    pub fn write32(&mut self, value: u32) -> Result<()> {
        self.open_write()?.put_u32(value)?;
        Ok(())
    }

    /// Append `data` verbatim. An empty slice is a no-op.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.open_write()?.put_slice(data)?;
        Ok(())
    }

    /// Seal the open packet and hand it to the transport.
    ///
    /// Returns the number of bytes the frame occupies on the wire, or 0 when
    /// no packet was open. A packet that overflowed is discarded and its
    /// `PayloadTooLarge` error returned. If the transport is busy the frame
    /// waits in the outbound queue and is sent by a later `poll`; a hard
    /// transport failure is returned and the frame dropped.
    pub fn end_write(&mut self) -> Result<usize> {
        let Some(writer) = self.outgoing.take() else {
            trace!("end_write with no open packet");
            return Ok(0);
        };
        let destination = writer.destination();
        let frame = writer.finish(self.id)?;
        let size = frame.len();
        self.transmit(frame)?;
        debug!(
            src = self.id.get(),
            dst = destination.get(),
            size,
            "packet written"
        );
        Ok(size)
    }

    /// Discard the open packet without sending anything.
    ///
    /// Returns true when a packet was open.
    pub fn abort_write(&mut self) -> bool {
        self.outgoing.take().is_some()
    }

    fn open_write(&mut self) -> Result<&mut PacketWriter> {
        self.outgoing.as_mut().ok_or(NodeError::NoOpenWrite)
    }

    fn transmit(&mut self, frame: Bytes) -> Result<()> {
        // Queued frames go first so packets leave in the order they were
        // written.
        if self.tx_queue.is_empty() {
            match self.transport.send(&frame) {
                Ok(()) => {
                    self.stats.frames_sent += 1;
                    return Ok(());
                }
                Err(err) if err.is_would_block() => {}
                Err(err) => return Err(err.into()),
            }
        }
        if self.tx_queue.len() >= self.config.tx_queue_depth {
            return Err(NodeError::TxQueueFull {
                depth: self.config.tx_queue_depth,
            });
        }
        self.tx_queue.push_back(frame);
        self.stats.frames_queued += 1;
        Ok(())
    }

    /// Frames waiting for the transport.
    pub fn pending_tx(&self) -> usize {
        self.tx_queue.len()
    }

    // ── read parser ─────────────────────────────────────────────────

    /// Open the next received packet.
    ///
    /// Returns the payload length, or `None` when no packet is available.
    /// When nothing is queued this performs one bounded receive pass first,
    /// so it makes progress even if `poll` is never called. It never waits.
    pub fn parse_packet(&mut self) -> Result<Option<usize>> {
        if self.incoming.is_some() {
            return Err(NodeError::ReadAlreadyOpen);
        }
        if self.rx_queue.is_empty() && self.receive_pass()? > 0 {
            self.idle_polls = 0;
        }
        let Some(frame) = self.rx_queue.pop_front() else {
            return Ok(None);
        };
        let len = frame.payload.len();
        self.incoming = Some(PacketReader::new(frame));
        Ok(Some(len))
    }

    /// True while an incoming packet is open.
    pub fn is_reading(&self) -> bool {
        self.incoming.is_some()
    }

    pub fn read8(&mut self) -> Result<u8> {
        Ok(self.open_read()?.read_u8()?)
    }

    pub fn read16(&mut self) -> Result<u16> {
        Ok(self.open_read()?.read_u16()?)
    }

    pub fn read32(&mut self) -> Result<u32> {
        Ok(self.open_read()?.read_u32()?)
    }

    /// Fill `buf` with the next `buf.len()` payload bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.open_read()?.read_into(buf)?;
        Ok(())
    }

    /// Release the open packet. Unread bytes are discarded. A no-op when
    /// nothing is open.
    pub fn end_read(&mut self) {
        match self.incoming.take() {
            Some(reader) if reader.remaining() > 0 => {
                trace!(unread = reader.remaining(), "packet released with unread bytes");
            }
            Some(_) => {}
            None => trace!("end_read with no open packet"),
        }
    }

    /// Sender of the open packet.
    pub fn packet_source(&self) -> Option<DeviceId> {
        self.incoming.as_ref().map(PacketReader::source)
    }

    /// Destination of the open packet, which may be broadcast.
    pub fn packet_destination(&self) -> Option<DeviceId> {
        self.incoming.as_ref().map(PacketReader::destination)
    }

    /// Unread bytes in the open packet.
    pub fn remaining(&self) -> Option<usize> {
        self.incoming.as_ref().map(PacketReader::remaining)
    }

    /// Packets received and waiting for `parse_packet`.
    pub fn pending_rx(&self) -> usize {
        self.rx_queue.len()
    }

    fn open_read(&mut self) -> Result<&mut PacketReader> {
        self.incoming.as_mut().ok_or(NodeError::NoOpenRead)
    }

    // ── node loop ───────────────────────────────────────────────────

    /// Service the transport once.
    ///
    /// Sends queued frames until the transport is busy, performs at most
    /// `max_reads_per_poll` receives, queues every complete packet that
    /// passes the address filter, and expires idle partial frames. Returns
    /// the first transport failure after finishing the pass.
    pub fn poll(&mut self) -> Result<()> {
        let flushed = self.flush_tx();
        let received = self.receive_pass();
        self.expire_stale(matches!(received, Ok(n) if n > 0));
        flushed?;
        received.map(|_| ())
    }

    fn flush_tx(&mut self) -> Result<()> {
        while let Some(frame) = self.tx_queue.front() {
            match self.transport.send(frame) {
                Ok(()) => {
                    self.tx_queue.pop_front();
                    self.stats.frames_sent += 1;
                }
                Err(err) if err.is_would_block() => break,
                Err(err) => {
                    self.tx_queue.pop_front();
                    warn!(error = %err, "queued frame dropped on transport failure");
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn receive_pass(&mut self) -> Result<usize> {
        let mut total = 0;
        for _ in 0..self.config.max_reads_per_poll {
            let n = match self.transport.receive(&mut self.scratch) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.is_would_block() => break,
                Err(err) => return Err(err.into()),
            };
            self.accumulator.extend(&self.scratch[..n]);
            total += n;
            while let Some(frame) = self.accumulator.next_frame() {
                self.accept(frame);
            }
        }
        Ok(total)
    }

    fn accept(&mut self, frame: Frame) {
        if self.config.ignore_own_frames && frame.source == self.id {
            self.stats.own_frames_ignored += 1;
            trace!(dst = frame.destination.get(), "ignoring own frame");
            return;
        }

        let addressed = frame.destination == self.id
            || (frame.destination.is_broadcast() && self.config.accept_broadcast)
            || self.config.promiscuous;
        if !addressed {
            self.stats.frames_filtered += 1;
            trace!(
                src = frame.source.get(),
                dst = frame.destination.get(),
                "frame for another node"
            );
            return;
        }

        if self.rx_queue.len() >= self.config.rx_queue_depth {
            self.stats.rx_overflow += 1;
            warn!(
                src = frame.source.get(),
                depth = self.config.rx_queue_depth,
                "inbound queue full; packet dropped"
            );
            return;
        }

        debug!(
            src = frame.source.get(),
            dst = frame.destination.get(),
            len = frame.payload.len(),
            "packet received"
        );
        self.stats.frames_received += 1;
        self.rx_queue.push_back(frame);
    }

    fn expire_stale(&mut self, progressed: bool) {
        if progressed || !self.accumulator.has_partial() {
            self.idle_polls = 0;
            return;
        }
        self.idle_polls += 1;
        if self.idle_polls < self.config.stale_frame_polls {
            return;
        }
        self.idle_polls = 0;
        self.stats.stale_partials += 1;

        // Nothing has arrived for the whole idle window, so whatever is still
        // incomplete after each skip is stale too. Frames buffered behind a
        // corrupt length are recovered on the way.
        let mut dropped = 0;
        let mut recovered = 0;
        while self.accumulator.has_partial() {
            dropped += self.accumulator.skip_stale();
            while let Some(frame) = self.accumulator.next_frame() {
                recovered += 1;
                self.accept(frame);
            }
        }
        warn!(
            bytes = dropped,
            recovered,
            polls = self.config.stale_frame_polls,
            "discarding stale partial frame"
        );
    }

    // ── parts ───────────────────────────────────────────────────────

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn diagnostics(&self) -> &D {
        &self.diag
    }

    /// Tear the node down, returning its collaborators.
    pub fn into_parts(self) -> (T, C, D) {
        (self.transport, self.clock, self.diag)
    }
}

impl<T, C, D> std::fmt::Debug for Node<T, C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("writing", &self.outgoing.is_some())
            .field("reading", &self.incoming.is_some())
            .field("rx_queue", &self.rx_queue.len())
            .field("tx_queue", &self.tx_queue.len())
            .field("accumulator", &self.accumulator)
            .field("stats", &self.stats)
            .finish()
    }
}
