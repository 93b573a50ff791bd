//! Minimal ID3v2 walker: just enough to harvest `TIT2` (title) and
//! `TRCK` (track number) from leading or embedded tags.
//!
//! Versions 2.3 and 2.4 are understood; they differ only in the frame
//! size field (raw big-endian vs. syncsafe). Text encodings 0 and 3 are
//! taken as UTF-8, 1 and 2 as UTF-16 with BOM handling and surrogate
//! pairs. Anything unrecognized inside the tag aborts the walk without
//! failing the caller; the cursor always ends up exactly past the tag.

use std::io::{Read, Seek, SeekFrom};

use crate::bytes;
use crate::track::Meta;
use crate::TrackError;

fn syncsafe(b: [u8; 4]) -> u32 {
    (u32::from(b[0] & 0x7F) << 21)
        | (u32::from(b[1] & 0x7F) << 14)
        | (u32::from(b[2] & 0x7F) << 7)
        | u32::from(b[3] & 0x7F)
}

/// Parses an ID3v2 tag whose `"ID3"` magic and version byte have already
/// been consumed, harvesting `TIT2`/`TRCK` into `meta`.
///
/// Leaves the cursor at the first byte past the tag, also on the
/// unsupported-extended-header error.
pub(crate) fn read_tag<R: Read + Seek>(
    src: &mut R,
    version: u8,
    meta: &mut Meta,
) -> Result<(), TrackError> {
    let _revision = bytes::read_u8(src)?;
    let flags = bytes::read_u8(src)?;
    let size = u64::from(syncsafe(bytes::read_4cc(src)?));
    let end = src.stream_position()? + size;

    if flags & 0x40 != 0 {
        src.seek(SeekFrom::Start(end))?;
        return Err(TrackError::Unsupported("ID3 extended header"));
    }

    let mut remaining = size;
    while remaining >= 10 {
        let id = bytes::read_4cc(src)?;
        if id[0] == 0 || id.iter().any(|b| b & 0x80 != 0) {
            // Padding, or bytes that cannot be a frame id.
            break;
        }

        let raw = bytes::read_4cc(src)?;
        let frame_len = u64::from(if version == 4 {
            syncsafe(raw)
        } else {
            u32::from_be_bytes(raw)
        });
        let _frame_flags = bytes::read_u16_be(src)?;
        remaining -= 10;

        if frame_len == 0 || frame_len > remaining {
            break;
        }

        match &id {
            b"TIT2" | b"TRCK" => {
                let encoding = bytes::read_u8(src)?;
                let mut text = vec![0u8; frame_len as usize - 1];
                src.read_exact(&mut text)?;

                if let Some(text) = decode_text(encoding, &text) {
                    if &id == b"TIT2" {
                        meta.title = text;
                    } else {
                        // "7/12" carries the disc total after the slash.
                        meta.index = leading_int(text.split('/').next().unwrap_or(""));
                    }
                }
            }
            _ => bytes::skip(src, frame_len)?,
        }
        remaining -= frame_len;
    }

    src.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Skips over a tag (magic and version byte already consumed) without
/// looking at its frames.
pub(crate) fn skip_tag<R: Read + Seek>(src: &mut R) -> Result<(), TrackError> {
    let _revision = bytes::read_u8(src)?;
    let _flags = bytes::read_u8(src)?;
    let size = syncsafe(bytes::read_4cc(src)?);
    bytes::skip(src, u64::from(size))?;
    Ok(())
}

/// Parses the leading decimal digits of `s`, `atoi`-style.
pub(crate) fn leading_int(s: &str) -> u32 {
    s.trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .fold(0u32, |n, c| {
            n.saturating_mul(10).saturating_add(c as u32 - '0' as u32)
        })
}

fn decode_text(encoding: u8, text: &[u8]) -> Option<String> {
    match encoding {
        // ISO-8859-1 in the standard, but treated as UTF-8 here like the
        // hosts this feeds; terminated at the first NUL.
        0 | 3 => {
            let text = text.split(|&b| b == 0).next().unwrap_or(text);
            Some(String::from_utf8_lossy(text).into_owned())
        }
        1 => Some(utf16_to_utf8(text, false)),
        2 => Some(utf16_to_utf8(text, true)),
        _ => None,
    }
}

fn utf16_to_utf8(text: &[u8], big_endian_default: bool) -> String {
    let (big_endian, data) = match text {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        _ => (big_endian_default, text),
    };

    let units = data
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .take_while(|&unit| unit != 0);

    // Unpaired surrogates are dropped rather than replaced.
    char::decode_utf16(units).filter_map(Result::ok).collect()
}
