//! Reassembly of per-channel 1-bit DSD streams into the 32-bit
//! little-endian DSD-over-PCM words a playback host expects.
//!
//! Source containers deliver DSD one byte (eight 1-bit samples) per
//! channel at a time, either MSB-first (DSDIFF) or LSB-first (DSF). The
//! packer shifts those bits through one 64-bit register per channel and
//! emits a full 32-bit word per channel whenever 32 bits have
//! accumulated, so word boundaries are independent of source block
//! boundaries. One packer is meant to live for a whole upload: leftover
//! bits simply carry into the next chunk or the next track.

use arrayvec::ArrayVec;
use memplay_proto::format::{SampleKind, StreamFormat};

use crate::TrackError;

/// Highest channel count the reassembler supports.
pub const MAX_CHANNELS: usize = 32;

/// Table mapping each byte to its bit-reversed value, for LSB-first
/// sources.
pub(crate) const BIT_REVERSE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
};

/// The per-channel bit accumulator.
///
/// Invariant: outside of a push, `bit_count` is below 32 — callers drain
/// with [`take_words`](Self::take_words) after every push. Registers are
/// pre-filled with the format's mute pattern, which only ever becomes
/// visible in the final partial word emitted by [`finish`](Self::finish).
#[derive(Debug)]
pub struct BitPacker {
    regs: [u64; MAX_CHANNELS],
    channels: usize,
    bit_count: u32,
    mute_byte: u8,
}

impl BitPacker {
    pub const MAX_CHANNELS: usize = MAX_CHANNELS;

    /// Builds a packer for `format`.
    ///
    /// DSD streams with more than [`MAX_CHANNELS`] channels are rejected.
    /// PCM formats are accepted so one packer can accompany any upload;
    /// it simply stays idle.
    pub fn new(format: &StreamFormat) -> Result<Self, TrackError> {
        let channels = format.channels.get();
        if format.kind == SampleKind::Dsd1 && channels > MAX_CHANNELS {
            return Err(TrackError::Unsupported("more than 32 DSD channels"));
        }
        let mute = format.mute_byte();
        Ok(Self {
            regs: [u64::from_le_bytes([mute; 8]); MAX_CHANNELS],
            channels: channels.min(MAX_CHANNELS),
            bit_count: 0,
            mute_byte: mute,
        })
    }

    /// Bits accumulated but not yet emitted.
    #[inline(always)]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Shifts the low `bits` (1..=8) of one byte per channel into the
    /// registers, most significant bit first.
    pub fn push_msb(&mut self, column: &[u8], bits: u32) {
        debug_assert!((1..=8).contains(&bits));
        debug_assert_eq!(column.len(), self.channels);

        let mask = if bits == 8 { 0xFF } else { (1u8 << bits) - 1 };
        for (reg, &byte) in self.regs.iter_mut().zip(column) {
            *reg = (*reg << bits) | u64::from(byte & mask);
        }
        self.bit_count += bits;
    }

    /// As [`push_msb`](Self::push_msb) for LSB-first sources: each byte
    /// is bit-reversed before the shift.
    pub fn push_lsb(&mut self, column: &[u8], bits: u32) {
        let mut reversed = ArrayVec::<u8, MAX_CHANNELS>::new();
        for &byte in column {
            reversed.push(BIT_REVERSE[byte as usize]);
        }
        self.push_msb(&reversed, bits);
    }

    /// Appends one 32-bit little-endian word per channel to `out` if at
    /// least 32 bits are pending. Returns whether words were emitted.
    pub fn take_words(&mut self, out: &mut Vec<u8>) -> bool {
        if self.bit_count < 32 {
            return false;
        }
        self.bit_count -= 32;
        for reg in &self.regs[..self.channels] {
            out.extend_from_slice(&((reg >> self.bit_count) as u32).to_le_bytes());
        }
        true
    }

    /// Flushes the trailing partial word at end of stream.
    ///
    /// Returns one `4 × channels`-byte word set with the residual bits in
    /// the high end and the mute pattern below them, or an empty buffer
    /// when no bits are pending.
    pub fn finish(&mut self) -> Vec<u8> {
        if self.bit_count == 0 {
            return Vec::new();
        }

        let pad = 32 - self.bit_count;
        let mute_word = u32::from_le_bytes([self.mute_byte; 4]);
        let mut out = Vec::with_capacity(4 * self.channels);
        for reg in &self.regs[..self.channels] {
            let word = (mute_word & ((1u32 << pad) - 1)) | ((*reg as u32) << pad);
            out.extend_from_slice(&word.to_le_bytes());
        }
        self.bit_count = 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memplay_proto::format::DsdLayout;

    fn packer(channels: u8) -> BitPacker {
        let format = StreamFormat::new_dsd(channels, 2_822_400, DsdLayout::default()).unwrap();
        BitPacker::new(&format).unwrap()
    }

    #[test]
    fn eight_msb_pushes_emit_one_word() {
        let mut p = packer(1);
        let mut out = Vec::new();

        for i in 0..8 {
            p.push_msb(&[0xA5], 8);
            let emitted = p.take_words(&mut out);
            assert_eq!(emitted, i % 4 == 3);
        }

        // 64 pushed bits → two words of repeated 0xA5.
        assert_eq!(out, 0xA5A5_A5A5u32.to_le_bytes().repeat(2));
        assert_eq!(p.bit_count(), 0);
    }

    #[test]
    fn lsb_pushes_reverse_each_byte() {
        let mut p = packer(1);
        let mut out = Vec::new();

        // 0x01 reversed is 0x80.
        for _ in 0..4 {
            p.push_lsb(&[0x01], 8);
            p.take_words(&mut out);
        }
        assert_eq!(out, 0x8080_8080u32.to_le_bytes());
    }

    #[test]
    fn words_interleave_by_channel() {
        let mut p = packer(2);
        let mut out = Vec::new();

        for _ in 0..4 {
            p.push_msb(&[0xFF, 0x00], 8);
            p.take_words(&mut out);
        }
        let mut expected = 0xFFFF_FFFFu32.to_le_bytes().to_vec();
        expected.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn finish_pads_with_mute_pattern() {
        let mut p = packer(1);
        p.push_msb(&[0xFF], 8);

        let tail = p.finish();
        let word = u32::from_le_bytes(tail.try_into().unwrap());
        // Residual byte in the high 8 bits, mute pattern below.
        assert_eq!(word, 0xFF00_0000 | (0x0069_6969 & 0x00FF_FFFF));
        assert_eq!(p.bit_count(), 0);
        assert!(p.finish().is_empty());
    }

    #[test]
    fn partial_push_keeps_only_low_bits() {
        let mut p = packer(1);
        p.push_msb(&[0b1111_0101], 3);
        assert_eq!(p.bit_count(), 3);

        let tail = p.finish();
        let word = u32::from_le_bytes(tail.try_into().unwrap());
        assert_eq!(word >> 29, 0b101);
    }

    #[test]
    fn emitted_word_count_matches_pushed_bits() {
        // 23 bytes per channel = 184 bits → ceil(184 / 32) = 6 words.
        let mut p = packer(2);
        let mut out = Vec::new();
        for i in 0..23u8 {
            p.push_msb(&[i, i ^ 0xFF], 8);
            p.take_words(&mut out);
        }
        out.extend_from_slice(&p.finish());
        assert_eq!(out.len(), 6 * 4 * 2);
    }

    #[test]
    fn rejects_wide_dsd_streams() {
        let format = StreamFormat::new_dsd(33, 2_822_400, DsdLayout::default()).unwrap();
        assert!(matches!(
            BitPacker::new(&format),
            Err(TrackError::Unsupported(_))
        ));
    }
}
