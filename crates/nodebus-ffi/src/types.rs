use std::ffi::c_void;

use nodebus_node::Node;
use nodebus_transport::{LoopbackBus, Transport};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbResult {
    Ok = 0,
    InvalidArgument = 1,
    TransportError = 2,
    FrameError = 3,
    FramingOrder = 4,
    PayloadTooLarge = 5,
    QueueFull = 6,
    NoPacket = 7,
    Internal = 99,
}

#[allow(dead_code)]
pub const NB_OK: NbResult = NbResult::Ok;
#[allow(dead_code)]
pub const NB_ERR_INVALID_ARGUMENT: NbResult = NbResult::InvalidArgument;
#[allow(dead_code)]
pub const NB_ERR_TRANSPORT: NbResult = NbResult::TransportError;
#[allow(dead_code)]
pub const NB_ERR_FRAME: NbResult = NbResult::FrameError;
#[allow(dead_code)]
pub const NB_ERR_FRAMING_ORDER: NbResult = NbResult::FramingOrder;
#[allow(dead_code)]
pub const NB_ERR_PAYLOAD_TOO_LARGE: NbResult = NbResult::PayloadTooLarge;
#[allow(dead_code)]
pub const NB_ERR_QUEUE_FULL: NbResult = NbResult::QueueFull;
#[allow(dead_code)]
pub const NB_NO_PACKET: NbResult = NbResult::NoPacket;
#[allow(dead_code)]
pub const NB_ERR_INTERNAL: NbResult = NbResult::Internal;

#[allow(dead_code)]
pub const NB_BROADCAST: u8 = nodebus_frame::DeviceId::BROADCAST.get();

pub type NbBusHandle = *mut c_void;
pub type NbNodeHandle = *mut c_void;

pub(crate) struct BusHandle {
    pub(crate) bus: LoopbackBus,
}

pub(crate) struct NodeHandle {
    pub(crate) node: Node<Box<dyn Transport>>,
}
