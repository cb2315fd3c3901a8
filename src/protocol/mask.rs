//! Payload masking (RFC 6455 Section 5.3).

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// XOR masking eight bytes at a time.
///
/// Produces the same output as [`apply_mask`]; used on the hot path for
/// payloads read from or written to the transport.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let wide = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = (u64::from_ne_bytes(word) ^ wide).to_ne_bytes();
        chunk.copy_from_slice(&masked);
    }

    // The tail starts on a multiple of 8, so the mask phase restarts at 0.
    apply_mask(chunks.into_remainder(), mask);
}
