//! RIFF/WAV container parsing.

use std::io::{Read, Seek, SeekFrom};

use memplay_proto::format::{SampleKind, StreamFormat};
use tracing::warn;

use crate::bytes;
use crate::track::Meta;
use crate::TrackError;

/// Parses a WAV file whose `"RIFF"` magic has been consumed: format from
/// the `fmt ` chunk, title/track from `LIST/INFO`. Leaves the cursor at
/// the start of the sibling-chunk area so the `data` chunk can be located
/// lazily on the first read.
pub(crate) fn open<R: Read + Seek>(src: &mut R, meta: &mut Meta) -> Result<StreamFormat, TrackError> {
    let _riff_size = bytes::read_u32_le(src)?;

    let wave_fmt = {
        let mut b = [0u8; 8];
        src.read_exact(&mut b)?;
        b
    };
    if &wave_fmt != b"WAVEfmt " {
        return Err(TrackError::Malformed("not a WAVEfmt stream"));
    }

    let fmt_len = bytes::read_u32_le(src)?;
    if fmt_len < 16 {
        return Err(TrackError::Malformed("fmt chunk shorter than 16 bytes"));
    }

    let fmt_type = bytes::read_u16_le(src)?;
    let channels = bytes::read_u16_le(src)?;
    let rate = bytes::read_u32_le(src)?;
    let _bytes_per_second = bytes::read_u32_le(src)?;
    let bytes_per_frame = bytes::read_u16_le(src)?;
    let _bits = bytes::read_u16_le(src)?;
    bytes::skip(src, u64::from(fmt_len - 16))?;

    if channels == 0 || channels > 255 {
        return Err(TrackError::Malformed("implausible channel count"));
    }

    // The container family comes from the frame stride, not the declared
    // bit depth; width 4 splits on the format tag (3 = IEEE float).
    let kind = match bytes_per_frame / channels {
        1 => SampleKind::Signed8,
        2 => SampleKind::Signed16,
        3 => SampleKind::Signed24,
        4 if fmt_type == 3 => SampleKind::Float32,
        4 => SampleKind::Signed32,
        _ => return Err(TrackError::Unsupported("WAV sample width")),
    };
    let format = StreamFormat::new(kind, channels as u8, rate)?;

    // Metadata walk over the sibling chunks, then rewind for audio.
    let chunk_area = src.stream_position()?;
    while let Some(id) = bytes::read_4cc_opt(src)? {
        let Some(len) = bytes::read_u32_le_opt(src)? else {
            break;
        };
        let next = src.stream_position()? + u64::from(len);

        if &id == b"LIST" && len >= 4 {
            let list_type = bytes::read_4cc(src)?;
            if &list_type == b"INFO" {
                read_info(src, len - 4, meta)?;
            }
        }
        src.seek(SeekFrom::Start(next))?;
    }
    src.seek(SeekFrom::Start(chunk_area))?;

    Ok(format)
}

/// Harvests `INAM` (title) and `ITRK` (16-bit LE track index) from a
/// `LIST/INFO` body. Entries are word-aligned; a malformed entry ends the
/// walk without error.
fn read_info<R: Read + Seek>(src: &mut R, len: u32, meta: &mut Meta) -> Result<(), TrackError> {
    let mut remaining = u64::from(len);
    while remaining >= 8 {
        let id = bytes::read_4cc(src)?;
        let size = u64::from(bytes::read_u32_le(src)?);
        remaining -= 8;
        if size > remaining {
            warn!("LIST/INFO entry overruns its list, stopping the walk");
            break;
        }

        match &id {
            b"INAM" => {
                let mut text = vec![0u8; size as usize];
                src.read_exact(&mut text)?;
                let text = text.split(|&b| b == 0).next().unwrap_or(&text);
                meta.title = String::from_utf8_lossy(text).into_owned();
            }
            b"ITRK" if size == 2 => {
                meta.index = u32::from(bytes::read_u16_le(src)?);
            }
            _ => bytes::skip(src, size)?,
        }
        remaining -= size;

        // Pad byte after odd-sized entries.
        if size % 2 == 1 && remaining > 0 {
            bytes::skip(src, 1)?;
            remaining -= 1;
        }
    }
    Ok(())
}

/// Advances to the next non-empty `data` chunk, skipping everything else.
/// Returns its payload size, or `None` at end of file.
pub(crate) fn next_data_chunk<R: Read + Seek>(src: &mut R) -> Result<Option<u32>, TrackError> {
    loop {
        let Some(id) = bytes::read_4cc_opt(src)? else {
            return Ok(None);
        };
        let Some(size) = bytes::read_u32_le_opt(src)? else {
            return Ok(None);
        };

        if &id == b"data" {
            if size > 0 {
                return Ok(Some(size));
            }
            // A zero-length data chunk streams nothing; keep looking so
            // the caller sees a clean end of stream.
        } else {
            bytes::skip(src, u64::from(size))?;
        }
    }
}
