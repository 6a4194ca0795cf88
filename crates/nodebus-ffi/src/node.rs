use std::os::raw::c_char;

use nodebus_node::{Node, NodeError};
use nodebus_transport::{Transport, UdpTransport};

use crate::args;
use crate::error;
use crate::types::{BusHandle, NbBusHandle, NbNodeHandle, NbResult, NodeHandle};

fn with_node_mut<T>(handle: NbNodeHandle, on_error: T, f: impl FnOnce(&mut NodeHandle) -> T) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("node handle cannot be null");
        return on_error;
    }

    let node_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &mut *(handle as *mut NodeHandle) }
    };

    f(node_handle)
}

fn into_handle(transport: Box<dyn Transport>, device_id: u8) -> NbNodeHandle {
    let handle = NodeHandle {
        node: Node::new(device_id, transport),
    };
    Box::into_raw(Box::new(handle)) as NbNodeHandle
}

fn status(result: nodebus_node::Result<()>) -> NbResult {
    match result {
        Ok(()) => NbResult::Ok,
        Err(err) => error::map_node_error(&err),
    }
}

/// Attach a new node with address `device_id` to a loopback bus.
///
/// # Safety
/// `bus` must be a valid handle returned by `nodebus_bus_new`.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_new_loopback(bus: NbBusHandle, device_id: u8) -> NbNodeHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        if bus.is_null() {
            let _ = error::set_invalid_argument("bus handle cannot be null");
            return std::ptr::null_mut();
        }
        let bus_handle = {
            // SAFETY: Pointer validity is guaranteed by the caller.
            unsafe { &*(bus as *mut BusHandle) }
        };

        into_handle(Box::new(bus_handle.bus.tap()), device_id)
    })
}

/// Create a node with address `device_id` on a UDP socket bound to `bind`,
/// sending every frame to `peer`.
///
/// # Safety
/// `bind` and `peer` must be non-null pointers to valid UTF-8, NUL-terminated C strings.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_new_udp(
    device_id: u8,
    bind: *const c_char,
    peer: *const c_char,
) -> NbNodeHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let bind = {
            // SAFETY: the helper checks for null before reading.
            match unsafe { args::utf8_str(bind, "bind") } {
                Ok(v) => v,
                Err(_) => return std::ptr::null_mut(),
            }
        };
        let peer = {
            // SAFETY: the helper checks for null before reading.
            match unsafe { args::utf8_str(peer, "peer") } {
                Ok(v) => v,
                Err(_) => return std::ptr::null_mut(),
            }
        };

        match UdpTransport::bind(bind, peer) {
            Ok(transport) => into_handle(Box::new(transport), device_id),
            Err(err) => {
                let _ = error::map_node_error(&NodeError::from(err));
                std::ptr::null_mut()
            }
        }
    })
}

/// Free a node handle, closing its transport.
///
/// # Safety
/// `node` must be null or a handle returned by a `nodebus_node_new_*` function.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_free(node: NbNodeHandle) {
    crate::ffi_boundary((), || {
        if node.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by nodebus_node_new_*.
        unsafe {
            drop(Box::from_raw(node as *mut NodeHandle));
        }
    });
}

/// Service the transport once. Never blocks.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_loop(node: NbNodeHandle) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| status(h.node.poll()))
    })
}

/// The node's bus address, or -1 for a null handle.
///
/// # Safety
/// `node` must be null or a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_get_device_id(node: NbNodeHandle) -> i32 {
    crate::ffi_boundary(-1, || {
        with_node_mut(node, -1, |h| i32::from(h.node.device_id().get()))
    })
}

/// The node's local tick count in milliseconds, or 0 for a null handle.
///
/// # Safety
/// `node` must be null or a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_local_clock(node: NbNodeHandle) -> u32 {
    crate::ffi_boundary(0, || with_node_mut(node, 0, |h| h.node.local_clock()))
}

/// Open an outgoing packet for `destination`.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_begin_write(node: NbNodeHandle, destination: u8) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| {
            status(h.node.begin_write(destination))
        })
    })
}

/// Append an 8-bit field.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_write8(node: NbNodeHandle, value: u8) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| status(h.node.write8(value)))
    })
}

/// Append a 16-bit big-endian field.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_write16(node: NbNodeHandle, value: u16) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| status(h.node.write16(value)))
    })
}

/// Append a 32-bit big-endian field.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_write32(node: NbNodeHandle, value: u32) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| status(h.node.write32(value)))
    })
}

/// Append `len` raw bytes.
///
/// # Safety
/// `node` must be a valid node handle. If `len > 0`, `data` must be non-null and readable for
/// `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_write(
    node: NbNodeHandle,
    data: *const u8,
    len: usize,
) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        let data = {
            // SAFETY: the caller passes a buffer readable for `len` bytes.
            match unsafe { args::input_bytes(data, len, "data") } {
                Ok(v) => v,
                Err(code) => return code,
            }
        };

        with_node_mut(node, NbResult::InvalidArgument, |h| status(h.node.write(data)))
    })
}

/// Seal and transmit the open packet.
///
/// Stores the frame's wire size in `out_size` when it is non-null (0 when no
/// packet was open).
///
/// # Safety
/// `node` must be a valid node handle. `out_size` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_end_write(node: NbNodeHandle, out_size: *mut usize) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| match h.node.end_write() {
            Ok(size) => {
                if !out_size.is_null() {
                    // SAFETY: Pointer was checked for null; validity is guaranteed by the caller.
                    unsafe { out_size.write(size) };
                }
                NbResult::Ok
            }
            Err(err) => error::map_node_error(&err),
        })
    })
}

/// Discard the open packet without transmitting it.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_abort_write(node: NbNodeHandle) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| {
            h.node.abort_write();
            NbResult::Ok
        })
    })
}

/// Open the next received packet and store its payload length in `out_len`.
///
/// Returns `NoPacket` (with `*out_len == 0`) when nothing is available.
///
/// # Safety
/// `node` must be a valid node handle and `out_len` a non-null writable pointer.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_parse_packet(
    node: NbNodeHandle,
    out_len: *mut usize,
) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        if out_len.is_null() {
            return error::set_invalid_argument("out_len cannot be null");
        }

        with_node_mut(node, NbResult::InvalidArgument, |h| {
            let (len, result) = match h.node.parse_packet() {
                Ok(Some(len)) => (len, NbResult::Ok),
                Ok(None) => (0, NbResult::NoPacket),
                Err(err) => (0, error::map_node_error(&err)),
            };
            // SAFETY: Pointer was checked for null above.
            unsafe { out_len.write(len) };
            result
        })
    })
}

/// Read an 8-bit field into `out`.
///
/// # Safety
/// `node` must be a valid node handle and `out` a non-null writable pointer.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_read8(node: NbNodeHandle, out: *mut u8) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        if out.is_null() {
            return error::set_invalid_argument("out cannot be null");
        }

        with_node_mut(node, NbResult::InvalidArgument, |h| match h.node.read8() {
            Ok(v) => {
                // SAFETY: Pointer was checked for null above.
                unsafe { out.write(v) };
                NbResult::Ok
            }
            Err(err) => error::map_node_error(&err),
        })
    })
}

/// Read a 16-bit big-endian field into `out`.
///
/// # Safety
/// `node` must be a valid node handle and `out` a non-null writable pointer.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_read16(node: NbNodeHandle, out: *mut u16) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        if out.is_null() {
            return error::set_invalid_argument("out cannot be null");
        }

        with_node_mut(node, NbResult::InvalidArgument, |h| match h.node.read16() {
            Ok(v) => {
                // SAFETY: Pointer was checked for null above.
                unsafe { out.write(v) };
                NbResult::Ok
            }
            Err(err) => error::map_node_error(&err),
        })
    })
}

/// Read a 32-bit big-endian field into `out`.
///
/// # Safety
/// `node` must be a valid node handle and `out` a non-null writable pointer.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_read32(node: NbNodeHandle, out: *mut u32) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        if out.is_null() {
            return error::set_invalid_argument("out cannot be null");
        }

        with_node_mut(node, NbResult::InvalidArgument, |h| match h.node.read32() {
            Ok(v) => {
                // SAFETY: Pointer was checked for null above.
                unsafe { out.write(v) };
                NbResult::Ok
            }
            Err(err) => error::map_node_error(&err),
        })
    })
}

/// Copy the next `len` payload bytes into `buf`.
///
/// # Safety
/// `node` must be a valid node handle. If `len > 0`, `buf` must be non-null and writable for
/// `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_read(node: NbNodeHandle, buf: *mut u8, len: usize) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        let buf = {
            // SAFETY: the caller passes a buffer writable for `len` bytes.
            match unsafe { args::output_bytes(buf, len, "buf") } {
                Ok(v) => v,
                Err(code) => return code,
            }
        };

        with_node_mut(node, NbResult::InvalidArgument, |h| status(h.node.read(buf)))
    })
}

/// Release the open packet. A no-op when nothing is open.
///
/// # Safety
/// `node` must be a valid node handle.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_end_read(node: NbNodeHandle) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();
        with_node_mut(node, NbResult::InvalidArgument, |h| {
            h.node.end_read();
            NbResult::Ok
        })
    })
}

/// Write `text` to the node's diagnostic output.
///
/// # Safety
/// `node` must be a valid node handle and `text` a non-null UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_print(node: NbNodeHandle, text: *const c_char) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        let text = {
            // SAFETY: the helper checks for null before reading.
            match unsafe { args::utf8_str(text, "text") } {
                Ok(v) => v,
                Err(code) => return code,
            }
        };

        with_node_mut(node, NbResult::InvalidArgument, |h| {
            h.node.print(text);
            NbResult::Ok
        })
    })
}

/// Write `text` and a line terminator to the node's diagnostic output.
///
/// # Safety
/// `node` must be a valid node handle and `text` a non-null UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn nodebus_node_println(node: NbNodeHandle, text: *const c_char) -> NbResult {
    crate::ffi_boundary(NbResult::Internal, || {
        error::clear_error_state();

        let text = {
            // SAFETY: the helper checks for null before reading.
            match unsafe { args::utf8_str(text, "text") } {
                Ok(v) => v,
                Err(code) => return code,
            }
        };

        with_node_mut(node, NbResult::InvalidArgument, |h| {
            h.node.println(text);
            NbResult::Ok
        })
    })
}
