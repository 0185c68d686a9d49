//! Sample encoding conversions.

/// Scale factor between 16-bit PCM and normalized f32.
const I16_SCALE: f32 = 32768.0;

/// Convert signed 8-bit PCM to unsigned (offset binary) in place.
///
/// Flipping the sign bit maps a two's complement value `s` to `(s + 128) mod 256`.
pub fn flip_sign_in_place(bytes: &mut [u8]) {
    for byte in bytes.iter_mut() {
        *byte ^= 0x80;
    }
}

/// Expand one unsigned 8-bit sample to 16-bit PCM.
#[inline]
pub fn unsigned_to_i16(sample: u8) -> i16 {
    (i16::from(sample) - 128) << 8
}

/// Convert an unsigned 8-bit sample to normalized f32 in `[-1.0, 1.0)`.
#[inline]
pub fn unsigned_to_f32(sample: u8) -> f32 {
    f32::from(unsigned_to_i16(sample)) / I16_SCALE
}

/// Convert normalized f32 to 16-bit PCM, saturating out-of-range values.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
