use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default per-tap receive capacity: 64 KiB.
pub const DEFAULT_TAP_CAPACITY: usize = 64 * 1024;

/// An in-process shared bus.
///
/// Every frame sent by one tap is appended to the receive queue of every
/// other open tap, in send order. The sender never hears its own frames.
/// Cloning the bus yields another handle to the same medium.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

#[derive(Default)]
struct BusState {
    taps: Vec<TapState>,
    next_id: usize,
}

struct TapState {
    id: usize,
    rx: VecDeque<u8>,
    capacity: usize,
    open: bool,
    dropped_frames: u64,
}

impl LoopbackBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new tap with the default receive capacity.
    pub fn tap(&self) -> LoopbackTap {
        self.tap_with_capacity(DEFAULT_TAP_CAPACITY)
    }

    /// Attach a new tap whose receive queue holds at most `capacity` bytes.
    pub fn tap_with_capacity(&self, capacity: usize) -> LoopbackTap {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.taps.push(TapState {
            id,
            rx: VecDeque::new(),
            capacity,
            open: true,
            dropped_frames: 0,
        });
        debug!(tap = id, capacity, "loopback tap attached");
        LoopbackTap {
            state: Arc::clone(&self.state),
            id,
            max_chunk: usize::MAX,
            max_frame: None,
        }
    }

    /// Number of attached taps, open or closed.
    pub fn tap_count(&self) -> usize {
        lock(&self.state).taps.len()
    }

    /// Inject raw bytes into every open tap, as if line noise or a foreign
    /// device had put them on the wire.
    pub fn inject(&self, bytes: &[u8]) {
        let mut state = lock(&self.state);
        for tap in state.taps.iter_mut().filter(|tap| tap.open) {
            deliver(tap, bytes);
        }
    }
}

/// One device's connection to a [`LoopbackBus`].
pub struct LoopbackTap {
    state: Arc<Mutex<BusState>>,
    id: usize,
    max_chunk: usize,
    max_frame: Option<usize>,
}

impl LoopbackTap {
    /// Limit how many bytes a single `receive` call returns.
    ///
    /// Small chunks make a frame arrive over several receives, like a slow
    /// serial line.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    /// Refuse to send frames longer than `max_frame` bytes, like a medium
    /// with a fixed MTU.
    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = Some(max_frame);
        self
    }

    /// Identifier of this tap on its bus.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Bytes waiting in this tap's receive queue.
    pub fn pending(&self) -> usize {
        let state = lock(&self.state);
        state
            .taps
            .iter()
            .find(|tap| tap.id == self.id)
            .map_or(0, |tap| tap.rx.len())
    }

    /// Frames dropped because this tap's receive queue was full.
    pub fn dropped_frames(&self) -> u64 {
        let state = lock(&self.state);
        state
            .taps
            .iter()
            .find(|tap| tap.id == self.id)
            .map_or(0, |tap| tap.dropped_frames)
    }

    /// Detach from the bus. Later sends fail with `Shutdown` and the tap
    /// stops receiving.
    pub fn close(&mut self) {
        let mut state = lock(&self.state);
        if let Some(tap) = state.taps.iter_mut().find(|tap| tap.id == self.id) {
            tap.open = false;
            tap.rx.clear();
        }
        debug!(tap = self.id, "loopback tap closed");
    }
}

impl Transport for LoopbackTap {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if let Some(max) = self.max_frame {
            if frame.len() > max {
                return Err(TransportError::FrameTooLarge {
                    size: frame.len(),
                    max,
                });
            }
        }

        let mut state = lock(&self.state);
        let sender_open = state
            .taps
            .iter()
            .any(|tap| tap.id == self.id && tap.open);
        if !sender_open {
            return Err(TransportError::Shutdown);
        }

        for tap in state
            .taps
            .iter_mut()
            .filter(|tap| tap.open && tap.id != self.id)
        {
            deliver(tap, frame);
        }
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        let Some(tap) = state.taps.iter_mut().find(|tap| tap.id == self.id) else {
            return Err(TransportError::Shutdown);
        };
        if !tap.open {
            return Err(TransportError::Shutdown);
        }

        let n = tap.rx.len().min(buf.len()).min(self.max_chunk);
        for (slot, byte) in buf.iter_mut().zip(tap.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn max_frame_size(&self) -> Option<usize> {
        self.max_frame
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}

impl Drop for LoopbackTap {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.taps.retain(|tap| tap.id != self.id);
    }
}

fn deliver(tap: &mut TapState, bytes: &[u8]) {
    if tap.rx.len() + bytes.len() > tap.capacity {
        tap.dropped_frames += 1;
        warn!(
            tap = tap.id,
            size = bytes.len(),
            queued = tap.rx.len(),
            "loopback receive queue full; frame dropped"
        );
        return;
    }
    tap.rx.extend(bytes.iter().copied());
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
