//! DSDIFF container parsing.
//!
//! A DSDIFF file is one big-endian `FRM8` form of type `DSD ` holding
//! 64-bit-sized chunks: `FVER`, a `PROP`/`SND ` property container with
//! `FS  ` (rate) and `CHNL` (channels), the `DSD ` audio body, and
//! optionally an `ID3 ` metadata chunk. The audio body interleaves
//! channels byte-by-byte (byte 0 = channel 0, byte 1 = channel 1, …),
//! MSB-first.
//!
//! Reading is resumable: [`DffWalk`] keeps the outer form budget, the
//! current chunk budget and a marker distinguishing "inside the audio
//! body" from "walking between chunks", so a read can stop mid-body and
//! the next one continues where it left off.

use std::io::{Read, Seek, SeekFrom};

use memplay_proto::format::{DsdLayout, StreamFormat};
use tracing::warn;

use crate::dsd;
use crate::track::Meta;
use crate::{bytes, id3, TrackError};

/// Resumable DSDIFF walk state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DffWalk {
    /// Bytes left in the `FRM8` form.
    pub chunk_size: u64,
    /// Bytes left in the chunk under the cursor.
    pub current_size: u64,
    /// When nonzero, the cursor sits inside the `DSD ` body with this
    /// many bytes unread.
    pub read_reset: u64,
}

impl DffWalk {
    /// Advances to (or continues inside) the audio body.
    ///
    /// Returns the bytes available there, or `None` once the form holds
    /// no further `DSD ` chunk.
    pub(crate) fn next_audio<R: Read + Seek>(
        &mut self,
        src: &mut R,
    ) -> Result<Option<u64>, TrackError> {
        if self.read_reset > 0 {
            return Ok(Some(self.read_reset));
        }

        loop {
            if self.chunk_size < 12 {
                return Ok(None);
            }
            let Some(id) = bytes::read_4cc_opt(src)? else {
                return Ok(None);
            };
            let size = bytes::read_u64_be(src)?;
            self.chunk_size -= 12;
            if self.chunk_size < size {
                return Err(TrackError::Malformed("DSDIFF chunk overruns its form"));
            }

            if &id == b"DSD " {
                if size > 0 {
                    self.current_size = size;
                    self.read_reset = size;
                    return Ok(Some(size));
                }
                continue;
            }

            // Anything else between audio chunks is skipped wholesale;
            // metadata was harvested at open time.
            bytes::skip(src, size)?;
            self.chunk_size -= size;
        }
    }

    /// Records `n` audio-body bytes as consumed.
    pub(crate) fn consume(&mut self, n: u64) {
        self.read_reset -= n;
        self.current_size -= n;
        self.chunk_size -= n;
    }
}

/// Parses a DSDIFF file whose `"FRM8"` magic has been consumed: one
/// whole-form metadata pass (skipping the audio body), then a rewind to
/// the first chunk for streaming.
pub(crate) fn open<R: Read + Seek>(
    src: &mut R,
    meta: &mut Meta,
) -> Result<(DffWalk, StreamFormat), TrackError> {
    let form_size = bytes::read_u64_be(src)?;
    let form_type = bytes::read_4cc(src)?;
    if &form_type != b"DSD " {
        return Err(TrackError::Malformed("DSDIFF form type must be 'DSD '"));
    }
    if form_size < 4 {
        return Err(TrackError::Malformed("DSDIFF form too small"));
    }

    let first_chunk = src.stream_position()?;
    let mut rate = 0u32;
    let mut channels = 0u16;

    let mut remaining = form_size - 4;
    while remaining >= 12 {
        let Some(id) = bytes::read_4cc_opt(src)? else {
            break;
        };
        let Some(size) = bytes::read_u64_be_opt(src)? else {
            break;
        };
        remaining -= 12;
        if remaining < size {
            return Err(TrackError::Malformed("DSDIFF chunk overruns its form"));
        }
        let payload = src.stream_position()?;

        match &id {
            b"FVER" => {
                if size < 4 {
                    return Err(TrackError::Malformed("DSDIFF FVER chunk too small"));
                }
                let _version = bytes::read_u32_be(src)?;
            }
            b"PROP" => {
                if size < 4 {
                    return Err(TrackError::Malformed("DSDIFF PROP chunk too small"));
                }
                let _property_type = bytes::read_4cc(src)?;
                read_properties(src, size - 4, &mut rate, &mut channels)?;
            }
            b"ID3 " => {
                if size >= 4 {
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
            }
            // The audio body and everything else (COMT, DIIN, DST ,
            // MANF, …) is skipped by the seek below.
            _ => {}
        }

        src.seek(SeekFrom::Start(payload + size))?;
        remaining -= size;
    }

    if rate == 0 || channels == 0 {
        return Err(TrackError::Malformed("DSDIFF is missing FS or CHNL"));
    }
    if channels as usize > dsd::MAX_CHANNELS {
        return Err(TrackError::Unsupported("more than 32 DSD channels"));
    }
    let format = StreamFormat::new_dsd(channels as u8, rate, DsdLayout::default())?;

    src.seek(SeekFrom::Start(first_chunk))?;
    let walk = DffWalk {
        chunk_size: form_size - 4,
        current_size: 0,
        read_reset: 0,
    };
    Ok((walk, format))
}

/// Walks the `PROP` container for `FS  ` and `CHNL`; everything else
/// (`CMPR`, `ABSS`, `LSCO`, …) is skipped.
fn read_properties<R: Read + Seek>(
    src: &mut R,
    len: u64,
    rate: &mut u32,
    channels: &mut u16,
) -> Result<(), TrackError> {
    let mut remaining = len;
    while remaining >= 12 {
        let id = bytes::read_4cc(src)?;
        let size = bytes::read_u64_be(src)?;
        remaining -= 12;
        if remaining < size {
            return Err(TrackError::Malformed("DSDIFF property overruns PROP"));
        }
        let payload = src.stream_position()?;

        match &id {
            b"FS  " => {
                if size < 4 {
                    return Err(TrackError::Malformed("DSDIFF FS property too small"));
                }
                *rate = bytes::read_u32_be(src)?;
            }
            b"CHNL" => {
                if size < 2 {
                    return Err(TrackError::Malformed("DSDIFF CHNL property too small"));
                }
                *channels = bytes::read_u16_be(src)?;
            }
            _ => {}
        }

        src.seek(SeekFrom::Start(payload + size))?;
        remaining -= size;
    }
    Ok(())
}
