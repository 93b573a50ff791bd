//! Stream format descriptors and the packed 4-byte wire token.

use core::{fmt, num};
use serde::{Deserialize, Serialize};

/// Sample encodings a playback host accepts.
///
/// PCM samples are packed, little-endian and interleaved by channel.
/// `Dsd1` is a 1-bit oversampled stream transported as 32-bit
/// DSD-over-PCM words; its container width is therefore 4 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SampleKind {
    Signed8,
    Signed16,
    Signed24,
    Signed32,
    Float32,
    Dsd1,
}

impl SampleKind {
    /// Returns whether the encoding is linear PCM (signed or float).
    #[inline(always)]
    pub const fn is_pcm(self) -> bool {
        !matches!(self, SampleKind::Dsd1)
    }

    /// Returns whether the encoding is signed integer PCM.
    #[inline(always)]
    pub const fn is_signed(self) -> bool {
        use SampleKind::*;
        matches!(self, Signed8 | Signed16 | Signed24 | Signed32)
    }

    /// Returns whether the encoding is floating-point.
    #[inline(always)]
    pub const fn is_float(self) -> bool {
        matches!(self, SampleKind::Float32)
    }

    /// Container width of one sample on the wire, in bytes.
    #[inline(always)]
    pub const fn width(self) -> num::NonZeroU8 {
        use SampleKind::*;
        let res = match self {
            Signed8 => 1,
            Signed16 => 2,
            Signed24 => 3,
            Signed32 | Float32 | Dsd1 => 4,
        };

        num::NonZeroU8::new(res).unwrap()
    }

    const fn code(self) -> u32 {
        use SampleKind::*;
        match self {
            Signed8 => 0x1,
            Signed16 => 0x2,
            Signed24 => 0x3,
            Signed32 => 0x4,
            Float32 => 0x5,
            Dsd1 => 0x8,
        }
    }

    const fn from_code(code: u32) -> Option<Self> {
        use SampleKind::*;
        Some(match code {
            0x1 => Signed8,
            0x2 => Signed16,
            0x3 => Signed24,
            0x4 => Signed32,
            0x5 => Float32,
            0x8 => Dsd1,
            _ => return None,
        })
    }
}

/// Order in which 1-bit samples are laid out within each DSD source byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum DsdBitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

/// Byte order of the assembled 32-bit DSD-over-PCM words.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum DsdWordOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// DSD-specific layout knobs. Ignored for PCM formats.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct DsdLayout {
    pub bit_order: DsdBitOrder,
    pub word_order: DsdWordOrder,
}

/// Sample rates representable in the packed token, in Hz.
///
/// The wire token carries an index into this table, not the raw rate; a
/// rate outside it cannot be described to a host.
pub const RATE_TABLE: [u32; 20] = [
    8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 64_000, 88_200, 96_000, 176_400,
    192_000, 352_800, 384_000, 705_600, 768_000, 2_822_400, 5_644_800, 11_289_600, 22_579_200,
];

/// A validated audio sample rate.
///
/// The inner value is guaranteed to appear in [`RATE_TABLE`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u32")]
pub struct SampleRate(u32);

impl SampleRate {
    /// Creates a new sample rate if the value is one a host can be told about.
    #[inline(always)]
    pub fn new(hz: u32) -> Option<Self> {
        RATE_TABLE.contains(&hz).then_some(Self(hz))
    }

    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline(always)]
    fn code(self) -> u32 {
        // Membership is a construction invariant.
        RATE_TABLE.iter().position(|&r| r == self.0).unwrap() as u32
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = FormatError;

    #[inline(always)]
    fn try_from(hz: u32) -> Result<Self, FormatError> {
        Self::new(hz).ok_or(FormatError::UnsupportedRate(hz))
    }
}

/// Number of audio channels. The wire token caps this at 255.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ChannelCount(pub num::NonZeroU8);

impl ChannelCount {
    pub const MONO: ChannelCount = ChannelCount(num::NonZeroU8::new(1).unwrap());
    pub const STEREO: ChannelCount = ChannelCount(num::NonZeroU8::new(2).unwrap());

    #[inline(always)]
    pub const fn get(self) -> usize {
        self.0.get() as usize
    }
}

/// Error returned when a format cannot be described by the wire token.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum FormatError {
    #[error("sample rate {0} Hz is not representable")]
    UnsupportedRate(u32),
    #[error("channel count must be in 1..=255")]
    BadChannelCount,
    #[error("malformed format token {0:#010x}")]
    BadToken(u32),
}

/// A complete audio stream format description.
///
/// Construction goes through [`StreamFormat::new`] /
/// [`StreamFormat::new_dsd`] so every value held here packs losslessly
/// into a [`FormatId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct StreamFormat {
    pub kind: SampleKind,
    pub channels: ChannelCount,
    pub rate: SampleRate,
    /// DSD layout; holds the defaults for PCM formats.
    pub dsd: DsdLayout,
}

impl StreamFormat {
    /// Creates a PCM format description.
    pub fn new(kind: SampleKind, channels: u8, rate: u32) -> Result<Self, FormatError> {
        let channels =
            ChannelCount(num::NonZeroU8::new(channels).ok_or(FormatError::BadChannelCount)?);
        Ok(Self {
            kind,
            channels,
            rate: SampleRate::try_from(rate)?,
            dsd: DsdLayout::default(),
        })
    }

    /// Creates a 1-bit DSD format description.
    ///
    /// `rate` is the 1-bit sample rate (e.g. 2 822 400 Hz for DSD64), not
    /// the rate of the assembled 32-bit words.
    pub fn new_dsd(channels: u8, rate: u32, dsd: DsdLayout) -> Result<Self, FormatError> {
        Ok(Self {
            dsd,
            ..Self::new(SampleKind::Dsd1, channels, rate)?
        })
    }

    /// Bytes per time sample across all channels.
    #[inline(always)]
    pub const fn frame_size(&self) -> usize {
        self.kind.width().get() as usize * self.channels.get()
    }

    /// Bytes carrying exactly one second of audio in this format.
    ///
    /// For DSD this counts source bits: one second is `rate / 8` bytes per
    /// channel regardless of the 32-bit word container.
    #[inline(always)]
    pub const fn one_second_bytes(&self) -> usize {
        let rate = self.rate.get() as usize;
        match self.kind {
            SampleKind::Dsd1 => (rate / 8) * self.channels.get(),
            _ => rate * self.frame_size(),
        }
    }

    /// The byte that encodes silence in this format.
    ///
    /// DSD silence is the alternating `0x69` idle pattern; PCM silence is
    /// zero.
    #[inline(always)]
    pub const fn mute_byte(&self) -> u8 {
        match self.kind {
            SampleKind::Dsd1 => 0x69,
            _ => 0x00,
        }
    }

    /// Packs the description into its wire token.
    #[inline]
    pub fn id(&self) -> FormatId {
        let mut bits = self.kind.code();
        if let SampleKind::Dsd1 = self.kind {
            bits |= FormatId::DSD_WORD_32;
            if let DsdBitOrder::LsbFirst = self.dsd.bit_order {
                bits |= FormatId::DSD_LSB_FIRST;
            }
            if let DsdWordOrder::BigEndian = self.dsd.word_order {
                bits |= FormatId::DSD_BIG_ENDIAN;
            }
        }
        bits |= (self.channels.0.get() as u32) << 8;
        bits |= self.rate.code() << 16;
        FormatId(bits)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self.kind {
            SampleKind::Signed8 => "pcm-s8",
            SampleKind::Signed16 => "pcm-s16",
            SampleKind::Signed24 => "pcm-s24",
            SampleKind::Signed32 => "pcm-s32",
            SampleKind::Float32 => "pcm-f32",
            SampleKind::Dsd1 => "dsd",
        };
        write!(f, "{desc}/{}ch/{}Hz", self.channels.get(), self.rate.get())
    }
}

/// The packed, opaque stream format token: 4 little-endian bytes on the
/// wire, prefixing every data frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FormatId(u32);

impl FormatId {
    /// Size of the token on the wire.
    pub const WIRE_SIZE: usize = 4;

    // Bit 0..=3 hold the sample kind code; channels live in bits 8..=15,
    // the rate code in bits 16..=23.
    const DSD_WORD_32: u32 = 1 << 4;
    const DSD_LSB_FIRST: u32 = 1 << 5;
    const DSD_BIG_ENDIAN: u32 = 1 << 6;

    #[inline(always)]
    pub const fn to_wire(self) -> [u8; Self::WIRE_SIZE] {
        self.0.to_le_bytes()
    }

    #[inline(always)]
    pub const fn from_wire(bytes: [u8; Self::WIRE_SIZE]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl TryFrom<FormatId> for StreamFormat {
    type Error = FormatError;

    fn try_from(id: FormatId) -> Result<Self, FormatError> {
        let bad = FormatError::BadToken(id.0);
        let kind = SampleKind::from_code(id.0 & 0xF).ok_or(bad)?;
        let channels = num::NonZeroU8::new((id.0 >> 8) as u8).ok_or(bad)?;
        let rate = *RATE_TABLE
            .get((id.0 >> 16) as u8 as usize)
            .ok_or(bad)?;

        let dsd = match kind {
            SampleKind::Dsd1 => {
                if id.0 & FormatId::DSD_WORD_32 == 0 {
                    return Err(bad);
                }
                DsdLayout {
                    bit_order: if id.0 & FormatId::DSD_LSB_FIRST != 0 {
                        DsdBitOrder::LsbFirst
                    } else {
                        DsdBitOrder::MsbFirst
                    },
                    word_order: if id.0 & FormatId::DSD_BIG_ENDIAN != 0 {
                        DsdWordOrder::BigEndian
                    } else {
                        DsdWordOrder::LittleEndian
                    },
                }
            }
            _ => DsdLayout::default(),
        };

        Ok(Self {
            kind,
            channels: ChannelCount(channels),
            rate: SampleRate(rate),
            dsd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_stereo_sizes() {
        let f = StreamFormat::new(SampleKind::Signed16, 2, 44_100).unwrap();
        assert_eq!(f.frame_size(), 4);
        assert_eq!(f.one_second_bytes(), 176_400);
        assert_eq!(f.mute_byte(), 0);
    }

    #[test]
    fn dsd64_sizes() {
        let f = StreamFormat::new_dsd(2, 2_822_400, DsdLayout::default()).unwrap();
        assert_eq!(f.frame_size(), 8);
        assert_eq!(f.one_second_bytes(), 705_600);
        assert_eq!(f.mute_byte(), 0x69);
    }

    #[test]
    fn token_round_trip() {
        let formats = [
            StreamFormat::new(SampleKind::Signed24, 2, 96_000).unwrap(),
            StreamFormat::new(SampleKind::Float32, 1, 48_000).unwrap(),
            StreamFormat::new_dsd(
                2,
                5_644_800,
                DsdLayout {
                    bit_order: DsdBitOrder::LsbFirst,
                    word_order: DsdWordOrder::LittleEndian,
                },
            )
            .unwrap(),
        ];

        for f in formats {
            let id = FormatId::from_wire(f.id().to_wire());
            assert_eq!(StreamFormat::try_from(id).unwrap(), f);
        }
    }

    #[test]
    fn rejects_unknown_rate() {
        assert_eq!(
            StreamFormat::new(SampleKind::Signed16, 2, 44_101).unwrap_err(),
            FormatError::UnsupportedRate(44_101)
        );
    }

    #[test]
    fn rejects_zero_channels() {
        assert_eq!(
            StreamFormat::new(SampleKind::Signed16, 0, 44_100).unwrap_err(),
            FormatError::BadChannelCount
        );
    }
}
