/// Rounds `len` up to the next multiple of `block_size`.
///
/// Returns `None` if `block_size` is zero or the result overflows.
pub fn round_up(len: u64, block_size: u64) -> Option<u64> {
    if block_size == 0 {
        return None;
    }

    return len.div_ceil(block_size).checked_mul(block_size);
}

/// Allocate a zeroed buffer of `size` bytes without aborting on failure.
pub fn alloc_buffer(size: u64) -> Option<Vec<u8>> {
    let size = usize::try_from(size).ok()?;
    let mut buffer = Vec::new();

    buffer.try_reserve_exact(size).ok()?;
    buffer.resize(size, 0);

    return Some(buffer);
}

/// Decode a fixed width, space or NUL padded ASCII field.
pub fn decode_utf8_lossy_from(bytes: &[u8]) -> String {
    return String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .trim_start()
        .to_string();
}
