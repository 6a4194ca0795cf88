use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use nodebus_frame::FrameError;
use nodebus_node::NodeError;

use crate::types::NbResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> NbResult {
    set_error_message(message);
    NbResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_node_error(err: &NodeError) -> NbResult {
    set_error_message(err.to_string());
    match err {
        NodeError::Transport(_) => NbResult::TransportError,
        NodeError::Frame(FrameError::PayloadTooLarge { .. }) => NbResult::PayloadTooLarge,
        NodeError::Frame(_) => NbResult::FrameError,
        NodeError::WriteAlreadyOpen
        | NodeError::NoOpenWrite
        | NodeError::ReadAlreadyOpen
        | NodeError::NoOpenRead => NbResult::FramingOrder,
        NodeError::TxQueueFull { .. } => NbResult::QueueFull,
        NodeError::InvalidConfig(_) | NodeError::Config(_) => NbResult::InvalidArgument,
    }
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
