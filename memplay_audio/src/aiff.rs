//! AIFF container parsing.
//!
//! Chunk sizes are 32-bit big-endian, sample bytes are big-endian on
//! disk, and the COMM sample rate is an 80-bit IEEE 754 extended float.

use std::io::{Read, Seek, SeekFrom};

use memplay_proto::format::{SampleKind, StreamFormat};
use tracing::warn;

use crate::bytes;
use crate::track::Meta;
use crate::{id3, TrackError};

/// Parses an AIFF file whose `"FORM"` magic has been consumed. The COMM
/// chunk must come first; metadata comes from an `"ID3 "` chunk. Leaves
/// the cursor after COMM so `SSND` can be located lazily.
pub(crate) fn open<R: Read + Seek>(src: &mut R, meta: &mut Meta) -> Result<StreamFormat, TrackError> {
    let _form_size = bytes::read_u32_be(src)?;
    let form_type = bytes::read_4cc(src)?;
    let comm_id = bytes::read_4cc(src)?;
    let comm_size = bytes::read_u32_be(src)?;

    if &form_type != b"AIFF" || &comm_id != b"COMM" {
        return Err(TrackError::Malformed("AIFF common chunk missing"));
    }
    if comm_size < 18 {
        return Err(TrackError::Malformed("AIFF common chunk too small"));
    }

    let channels = bytes::read_u16_be(src)?;
    let _frame_count = bytes::read_u32_be(src)?;
    let bits = bytes::read_u16_be(src)?;
    let rate_exponent = bytes::read_u16_be(src)?;
    let rate_fraction = bytes::read_u64_be(src)?;
    bytes::skip(src, u64::from(comm_size - 18))?;

    let kind = match bits {
        8 => SampleKind::Signed8,
        16 => SampleKind::Signed16,
        24 => SampleKind::Signed24,
        32 => SampleKind::Signed32,
        _ => return Err(TrackError::Unsupported("AIFF bit depth")),
    };
    if channels == 0 || channels > 255 {
        return Err(TrackError::Malformed("implausible channel count"));
    }
    let rate = decode_extended_rate(rate_exponent, rate_fraction);
    let format = StreamFormat::new(kind, channels as u8, rate)?;

    // Metadata walk, then rewind for audio.
    let chunk_area = src.stream_position()?;
    while let Some(id) = bytes::read_4cc_opt(src)? {
        let Some(len) = bytes::read_u32_be_opt(src)? else {
            break;
        };
        let next = src.stream_position()? + u64::from(len);

        if &id == b"ID3 " && len >= 4 {
            let mut magic = [0u8; 3];
            src.read_exact(&mut magic)?;
            let version = bytes::read_u8(src)?;
            if &magic == b"ID3" && (version == 3 || version == 4) {
                match id3::read_tag(src, version, meta) {
                    Err(TrackError::Io(e)) => return Err(e.into()),
                    Err(e) => warn!("skipping unusable embedded ID3 tag: {e}"),
                    Ok(()) => {}
                }
            }
        }
        src.seek(SeekFrom::Start(next))?;
    }
    src.seek(SeekFrom::Start(chunk_area))?;

    Ok(format)
}

/// Advances to the next non-empty `SSND` chunk. Returns its payload
/// size, or `None` at end of file.
pub(crate) fn next_sound_chunk<R: Read + Seek>(src: &mut R) -> Result<Option<u32>, TrackError> {
    loop {
        let Some(id) = bytes::read_4cc_opt(src)? else {
            return Ok(None);
        };
        let Some(size) = bytes::read_u32_be_opt(src)? else {
            return Ok(None);
        };

        if &id == b"SSND" {
            if size > 0 {
                return Ok(Some(size));
            }
        } else {
            bytes::skip(src, u64::from(size))?;
        }
    }
}

/// Decodes an 80-bit IEEE 754 extended float (2-byte exponent + 8-byte
/// fraction with an explicit integer bit) into integer Hz.
pub(crate) fn decode_extended_rate(exponent: u16, fraction: u64) -> u32 {
    let f = fraction as f64 / (1u64 << 63) as f64;
    let e = i32::from(exponent & 0x7FFF) - 16383;
    (f * (e as f64).exp2()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_rate_44100() {
        // The canonical CD-rate encoding: 400E AC44 0000 0000 0000.
        assert_eq!(decode_extended_rate(0x400E, 0xAC44_0000_0000_0000), 44_100);
    }

    #[test]
    fn extended_rate_48000_and_96000() {
        assert_eq!(decode_extended_rate(0x400E, 0xBB80_0000_0000_0000), 48_000);
        assert_eq!(decode_extended_rate(0x400F, 0xBB80_0000_0000_0000), 96_000);
    }

    #[test]
    fn extended_rate_of_zero_fraction() {
        assert_eq!(decode_extended_rate(0, 0), 0);
    }
}
