//! Widening of narrow PCM to the host's preferred stereo 32-bit layout.
//!
//! Activated at open time for signed PCM under 32 bits with at most two
//! channels. Samples are left-justified: the value bits move to the top
//! of the 32-bit container and the low bits are zero, which preserves
//! both sign and amplitude.

/// Widens packed little-endian signed samples of `width` bytes (1, 2 or
/// 3) to 32-bit words. Mono input (`channels == 1`) is duplicated onto
/// both output channels.
pub fn widen_to_stereo32(input: &[u8], width: usize, channels: usize) -> Vec<u8> {
    let per_sample = if channels == 1 { 8 } else { 4 };
    let mut out = Vec::with_capacity(input.len() / width * per_sample);

    for sample in input.chunks_exact(width) {
        let word = match width {
            1 => u32::from(sample[0]) << 24,
            2 => u32::from(u16::from_le_bytes([sample[0], sample[1]])) << 16,
            _ => {
                (u32::from(sample[2]) << 24)
                    | (u32::from(sample[1]) << 16)
                    | (u32::from(sample[0]) << 8)
            }
        };
        out.extend_from_slice(&word.to_le_bytes());
        if channels == 1 {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

/// Reverses the byte order of each `width`-byte sample in place, turning
/// big-endian container data (AIFF) little-endian.
pub fn swap_to_le(buf: &mut [u8], width: usize) {
    if width > 1 {
        for sample in buf.chunks_exact_mut(width) {
            sample.reverse();
        }
    }
}
