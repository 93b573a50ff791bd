//! ISO-BMFF (M4A/ALAC) metadata walk.
//!
//! Only the title (`©nam`) and track number (`trkn`) are extracted, by
//! recursing through `moov → trak → mdia → minf → stbl` and
//! `udta → meta → ilst`. Audio payload extraction is deliberately
//! unsupported; an M4A track opens for metadata and streams nothing.

use std::io::{Read, Seek, SeekFrom};

use crate::bytes;
use crate::track::Meta;
use crate::TrackError;

/// Parses an ISO-BMFF file. `first` holds the first four bytes of the
/// file (the size of the initial box); the box type must be `ftyp` for
/// this to be an M4A at all.
pub(crate) fn open<R: Read + Seek>(
    src: &mut R,
    first: [u8; 4],
    meta: &mut Meta,
) -> Result<(), TrackError> {
    let ftyp_size = u64::from(u32::from_be_bytes(first));
    let Some(kind) = bytes::read_4cc_opt(src)? else {
        return Err(TrackError::UnrecognizedFormat);
    };
    if &kind != b"ftyp" {
        return Err(TrackError::UnrecognizedFormat);
    }
    if ftyp_size < 8 {
        return Err(TrackError::Malformed("undersized ftyp box"));
    }
    bytes::skip(src, ftyp_size - 8)?;

    // Top-level boxes. 64-bit extended sizes are accepted here.
    loop {
        let Some(size) = bytes::read_u32_be_opt(src)? else {
            break;
        };
        let Some(id) = bytes::read_4cc_opt(src)? else {
            break;
        };
        let (size, header) = if size == 1 {
            (bytes::read_u64_be(src)?, 16u64)
        } else {
            (u64::from(size), 8u64)
        };
        if size < header {
            return Err(TrackError::Malformed("undersized ISO-BMFF box"));
        }
        let payload = src.stream_position()?;
        let body = size - header;

        if &id == b"moov" {
            walk_children(src, body, meta)?;
        }
        src.seek(SeekFrom::Start(payload + body))?;
    }
    Ok(())
}

fn walk_children<R: Read + Seek>(
    src: &mut R,
    budget: u64,
    meta: &mut Meta,
) -> Result<(), TrackError> {
    let mut consumed = 0u64;
    while consumed + 8 <= budget {
        let size = u64::from(bytes::read_u32_be(src)?);
        let id = bytes::read_4cc(src)?;
        if size < 8 || consumed + size > budget {
            return Err(TrackError::Malformed("atom overruns its parent"));
        }
        let payload = src.stream_position()?;
        let body = size - 8;

        match &id {
            b"trak" | b"mdia" | b"minf" | b"stbl" | b"udta" | b"ilst" => {
                walk_children(src, body, meta)?;
            }
            b"meta" => {
                // Full box: version/flags precede the children.
                if body >= 4 && bytes::read_u32_be(src)? == 0 {
                    walk_children(src, body - 4, meta)?;
                }
            }
            b"\xa9nam" | b"trkn" => read_item(src, &id, body, meta)?,
            _ => {}
        }

        src.seek(SeekFrom::Start(payload + body))?;
        consumed += size;
    }
    Ok(())
}

/// Reads the `data` atom inside an item-list entry.
fn read_item<R: Read + Seek>(
    src: &mut R,
    id: &[u8; 4],
    body: u64,
    meta: &mut Meta,
) -> Result<(), TrackError> {
    if body < 16 {
        return Ok(());
    }
    let data_size = u64::from(bytes::read_u32_be(src)?);
    let data_id = bytes::read_4cc(src)?;
    if &data_id != b"data" || data_size < 16 || data_size > body {
        return Ok(());
    }
    let _type_indicator = bytes::read_u32_be(src)?;
    let _locale = bytes::read_u32_be(src)?;
    let payload = data_size - 16;

    if id == b"trkn" {
        // Two bytes of padding, then the 16-bit big-endian track number.
        if payload >= 4 {
            meta.index = bytes::read_u32_be(src)?;
        }
    } else {
        let mut text = vec![0u8; payload as usize];
        src.read_exact(&mut text)?;
        meta.title = String::from_utf8_lossy(&text).into_owned();
    }
    Ok(())
}
