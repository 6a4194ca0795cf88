//! nodebus-ffi: C-ABI exports for bus nodes.
//!
//! Every node operation is exposed as a `nodebus_node_*` function over an
//! opaque handle. Calls return an [`NbResult`] code; the message for the last
//! failure on the calling thread is available from [`nodebus_last_error`].

mod args;
mod bus;
mod error;
mod node;
mod types;

use std::panic::AssertUnwindSafe;

pub use bus::{nodebus_bus_free, nodebus_bus_new};
pub use node::{
    nodebus_node_abort_write, nodebus_node_begin_write, nodebus_node_end_read,
    nodebus_node_end_write, nodebus_node_free, nodebus_node_get_device_id,
    nodebus_node_local_clock, nodebus_node_loop, nodebus_node_new_loopback,
    nodebus_node_new_udp, nodebus_node_parse_packet, nodebus_node_print, nodebus_node_println,
    nodebus_node_read, nodebus_node_read16, nodebus_node_read32, nodebus_node_read8,
    nodebus_node_write, nodebus_node_write16, nodebus_node_write32, nodebus_node_write8,
};
pub use types::{
    NbBusHandle, NbNodeHandle, NbResult, NB_BROADCAST, NB_ERR_FRAME, NB_ERR_FRAMING_ORDER,
    NB_ERR_INTERNAL, NB_ERR_INVALID_ARGUMENT, NB_ERR_PAYLOAD_TOO_LARGE, NB_ERR_QUEUE_FULL,
    NB_ERR_TRANSPORT, NB_NO_PACKET, NB_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

#[no_mangle]
pub extern "C" fn nodebus_clear_error() {
    ffi_boundary((), error::clear_error_state);
}

#[no_mangle]
pub extern "C" fn nodebus_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn last_error_returns_non_null_pointer() {
        nodebus_clear_error();
        let ptr = nodebus_last_error();
        assert!(!ptr.is_null());

        // SAFETY: nodebus_last_error returns a pointer to a thread-local CString.
        let text = unsafe { CStr::from_ptr(ptr).to_str().unwrap() };
        assert!(text.is_empty());
    }

    #[test]
    fn panic_is_caught_at_boundary() {
        let result = ffi_boundary(NbResult::Internal, || -> NbResult { panic!("boom") });
        assert_eq!(result, NbResult::Internal);

        // SAFETY: nodebus_last_error returns a pointer to a thread-local CString.
        let text = unsafe { CStr::from_ptr(nodebus_last_error()).to_str().unwrap() };
        assert!(text.contains("panic"));
    }
}
