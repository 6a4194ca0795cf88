//! Validation for raw pointer arguments.
//!
//! Each helper records a last-error message and returns
//! `Err(NbResult::InvalidArgument)` when the argument is unusable.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::error::set_invalid_argument;
use crate::types::NbResult;

pub(crate) type ArgResult<T> = Result<T, NbResult>;

fn reject_null<T>(ptr: *const T, len: usize, name: &str) -> ArgResult<()> {
    if ptr.is_null() && len > 0 {
        return Err(set_invalid_argument(format!(
            "{name} is null but {len} bytes were requested"
        )));
    }
    Ok(())
}

/// Borrow a NUL-terminated UTF-8 string.
///
/// # Safety
/// `value` must be null or point to a NUL-terminated string that outlives
/// the call.
pub(crate) unsafe fn utf8_str<'a>(value: *const c_char, name: &str) -> ArgResult<&'a str> {
    if value.is_null() {
        return Err(set_invalid_argument(format!("{name} is null")));
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    let raw = unsafe { CStr::from_ptr(value) };
    raw.to_str()
        .map_err(|err| set_invalid_argument(format!("{name} is not UTF-8: {err}")))
}

/// Borrow `len` input bytes. A zero length never dereferences `data`.
///
/// # Safety
/// When `len > 0`, `data` must be readable for `len` bytes.
pub(crate) unsafe fn input_bytes<'a>(data: *const u8, len: usize, name: &str) -> ArgResult<&'a [u8]> {
    reject_null(data, len, name)?;
    if len == 0 {
        return Ok(&[]);
    }
    // SAFETY: non-null and readable for `len` bytes per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Borrow `len` output bytes. A zero length never dereferences `data`.
///
/// # Safety
/// When `len > 0`, `data` must be writable for `len` bytes and not aliased.
pub(crate) unsafe fn output_bytes<'a>(
    data: *mut u8,
    len: usize,
    name: &str,
) -> ArgResult<&'a mut [u8]> {
    reject_null(data.cast_const(), len, name)?;
    if len == 0 {
        return Ok(&mut []);
    }
    // SAFETY: non-null, writable and unaliased per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts_mut(data, len) })
}
