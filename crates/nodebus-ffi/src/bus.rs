use nodebus_transport::LoopbackBus;

use crate::types::{BusHandle, NbBusHandle};

/// Create an in-process loopback bus.
///
/// Nodes attached to the same bus hear each other's frames. Free with
/// `nodebus_bus_free`; nodes created on it stay usable after that.
#[no_mangle]
pub extern "C" fn nodebus_bus_new() -> NbBusHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        let handle = BusHandle {
            bus: LoopbackBus::new(),
        };
        Box::into_raw(Box::new(handle)) as NbBusHandle
    })
}

/// Free a bus handle.
///
/// # Safety
/// `bus` must be null or a handle returned by `nodebus_bus_new`.
#[no_mangle]
pub unsafe extern "C" fn nodebus_bus_free(bus: NbBusHandle) {
    crate::ffi_boundary((), || {
        if bus.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by nodebus_bus_new.
        unsafe {
            drop(Box::from_raw(bus as *mut BusHandle));
        }
    });
}
