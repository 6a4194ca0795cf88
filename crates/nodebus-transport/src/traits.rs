use crate::error::Result;

/// A byte-oriented bus transport.
///
/// This is the only boundary between a node and the physical medium. The
/// medium may be a serial line, a differential bus, a radio or a datagram
/// socket; nothing above this trait depends on which.
///
/// Both operations must return promptly. A node calls them from its
/// cooperative loop and never expects either one to wait for the wire.
pub trait Transport {
    /// Transmit one complete frame.
    ///
    /// The call is all-or-nothing: either the whole frame is accepted for
    /// transmission or none of it is. `TransportError::WouldBlock` means the
    /// medium is busy and the caller may retry later with the same bytes.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Copy pending received bytes into `buf`.
    ///
    /// Returns `Ok(0)` when nothing is pending. Frame boundaries are not
    /// preserved; callers reassemble frames from the byte stream.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Largest frame `send` can carry, including framing overhead.
    ///
    /// `None` means the medium imposes no limit of its own.
    fn max_frame_size(&self) -> Option<usize> {
        None
    }

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn max_frame_size(&self) -> Option<usize> {
        (**self).max_frame_size()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn max_frame_size(&self) -> Option<usize> {
        (**self).max_frame_size()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
