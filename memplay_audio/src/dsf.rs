//! DSF container parsing.
//!
//! A DSF file is a short little-endian chunk chain: a 28-byte `DSD `
//! chunk, a 52-byte `fmt ` chunk, the `data` chunk with the audio, and
//! usually a trailing ID3v2 tag. Audio is 1-bit DSD stored LSB-first,
//! interleaved by *block*: each `block_size × channels` region holds one
//! whole block per channel, so channel `c`'s byte `i` lives at
//! `block_size * c + i`.

use std::io::{Read, Seek, SeekFrom};

use memplay_proto::format::{DsdLayout, StreamFormat};
use tracing::warn;

use crate::dsd;
use crate::track::Meta;
use crate::{bytes, id3, TrackError};

/// Per-file DSF read state.
#[derive(Debug)]
pub(crate) struct DsfState {
    /// Bytes left in the current `data` chunk.
    pub data_remaining: u64,
    /// 1-bit samples left per channel.
    pub samples_remaining: u64,
    pub block_size: usize,
    pub channels: usize,
    /// One pre-read `block_size × channels` region.
    pub block: Vec<u8>,
    /// Unread bytes in `block`.
    pub block_remaining: usize,
}

/// Parses a DSF file whose `"DSD "` magic has been consumed. Leaves the
/// cursor at the chunk following `fmt `, which is where the `data` scan
/// starts on the first read.
pub(crate) fn open<R: Read + Seek>(
    src: &mut R,
    meta: &mut Meta,
) -> Result<(DsfState, StreamFormat), TrackError> {
    let header_size = bytes::read_u64_le(src)?;
    if header_size != 28 {
        return Err(TrackError::Malformed("DSD chunk size must be 28"));
    }
    let _file_size = bytes::read_u64_le(src)?;
    let _metadata_offset = bytes::read_u64_le(src)?;

    let fmt_id = bytes::read_4cc(src)?;
    if &fmt_id != b"fmt " {
        return Err(TrackError::Malformed("DSF fmt chunk missing"));
    }
    let fmt_size = bytes::read_u64_le(src)?;
    if fmt_size != 52 {
        return Err(TrackError::Malformed("DSF fmt chunk size must be 52"));
    }

    let _version = bytes::read_u32_le(src)?;
    let _format_id = bytes::read_u32_le(src)?;
    let _channel_type = bytes::read_u32_le(src)?;
    let channels = bytes::read_u32_le(src)?;
    let rate = bytes::read_u32_le(src)?;
    let bits = bytes::read_u32_le(src)?;
    let samples = bytes::read_u64_le(src)?;
    let block_size = bytes::read_u32_le(src)?;
    let _reserved = bytes::read_u32_le(src)?;

    if bits != 1 {
        warn!("DSF declares {bits} bits per sample, streaming as 1-bit");
    }
    if channels == 0 || block_size == 0 {
        return Err(TrackError::Malformed("DSF fmt declares a zero field"));
    }
    if channels as usize > dsd::MAX_CHANNELS {
        return Err(TrackError::Unsupported("more than 32 DSD channels"));
    }

    // The host always receives DSD as MSB-first 32-bit LE words; the
    // LSB-first file layout is undone at read time.
    let format = StreamFormat::new_dsd(channels as u8, rate, DsdLayout::default())?;

    // Metadata pass over the remaining chunks, then rewind for audio.
    let chunk_area = src.stream_position()?;
    while let Some(id) = bytes::read_4cc_opt(src)? {
        if id[..3] == *b"ID3" {
            // The metadata chunk is a bare ID3v2 tag, not a sized chunk.
            let version = id[3];
            if version == 3 || version == 4 {
                match id3::read_tag(src, version, meta) {
                    Err(TrackError::Io(e)) => return Err(e.into()),
                    Err(e) => warn!("skipping unusable DSF metadata: {e}"),
                    Ok(()) => {}
                }
            } else {
                id3::skip_tag(src)?;
            }
        } else {
            let Some(size) = bytes::read_u64_le_opt(src)? else {
                break;
            };
            // Sizes include the 12-byte chunk header.
            if size < 12 {
                warn!("undersized DSF chunk, stopping the metadata walk");
                break;
            }
            bytes::skip(src, size - 12)?;
        }
    }
    src.seek(SeekFrom::Start(chunk_area))?;

    let state = DsfState {
        data_remaining: 0,
        samples_remaining: samples,
        block_size: block_size as usize,
        channels: channels as usize,
        block: vec![0; block_size as usize * channels as usize],
        block_remaining: 0,
    };
    Ok((state, format))
}

/// Advances to the next `data` chunk, skipping sized chunks and bare ID3
/// tags. Returns its payload size, or `None` at end of file.
pub(crate) fn next_data_chunk<R: Read + Seek>(src: &mut R) -> Result<Option<u64>, TrackError> {
    loop {
        let Some(id) = bytes::read_4cc_opt(src)? else {
            return Ok(None);
        };

        if &id == b"data" {
            let size = bytes::read_u64_le(src)?;
            if size < 12 {
                return Err(TrackError::Malformed("undersized DSF data chunk"));
            }
            return Ok(Some(size - 12));
        } else if id[..3] == *b"ID3" {
            id3::skip_tag(src)?;
        } else {
            let Some(size) = bytes::read_u64_le_opt(src)? else {
                return Ok(None);
            };
            if size < 12 {
                return Err(TrackError::Malformed("undersized DSF chunk"));
            }
            bytes::skip(src, size - 12)?;
        }
    }
}
