//! Payload masking (RFC 6455 §5.3).
//!
//! Masking XORs each payload byte with a 4-byte key, rotating through the
//! key; applying the transform twice with the same key restores the input.

/// Byte-at-a-time masking transform.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Word-at-a-time variant of [`apply_mask`].
///
/// XORs four bytes per step and finishes the tail byte-wise; produces output
/// identical to the scalar loop.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], key: [u8; 4]) {
    let key_word = u32::from_ne_bytes(key);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ key_word;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
