//! UTF-16 string helpers for the native boundary

/// Encode `s` as a NUL-terminated UTF-16 buffer.
pub fn to_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode UTF-16 up to the first NUL (or the end), replacing invalid
/// surrogates.
pub fn from_utf16(buf: &[u16]) -> String {
    let end = buf.iter().position(|c| *c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

/// Decode a NUL-terminated UTF-16 string owned by the engine.
///
/// # Safety
///
/// `ptr` must be null or point to a readable, NUL-terminated sequence of
/// `u16` that stays valid for the duration of the call.
pub unsafe fn from_utf16_ptr(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    // SAFETY: the caller guarantees a terminating NUL within the allocation.
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        Some(String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len)))
    }
}
