//! Small marshaling helpers shared across wrapper modules.

/// Read a native string through the truncating-copy buffer protocol.
///
/// `read` copies at most `buffer.len()` bytes and returns the full length of
/// the value; the buffer is regrown and the call repeated until the whole
/// value fits.
pub(crate) fn read_growing_buffer(read: impl Fn(&mut [u8]) -> usize) -> String {
    let mut buffer = vec![0u8; 64];
    loop {
        let needed = read(&mut buffer);
        if needed < buffer.len() {
            buffer.truncate(needed);
            return String::from_utf8_lossy(&buffer).into_owned();
        }
        buffer = vec![0u8; needed + 1];
    }
}

/// Translate the empty-string sentinel used by unloaded native objects.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
