//! Audio container decoding for upload to a memory playback host.
//!
//! [`Track`] opens a file, identifies its container by magic, extracts the
//! stream format and embedded metadata, and then yields audio bytes in a
//! host-acceptable layout:
//!
//! - **RIFF/WAV** and **AIFF** PCM is demuxed as-is (AIFF sample bytes are
//!   swapped to little-endian), optionally widened to the host's preferred
//!   stereo/32-bit layout by [`normalize`];
//! - **DSF** and **DSDIFF** 1-bit streams are reassembled into 32-bit
//!   DSD-over-PCM words by [`dsd::BitPacker`], which carries partial-word
//!   state across chunk and even track boundaries;
//! - **M4A/ALAC** is parsed for metadata only; its audio is not decoded.
//!
//! Metadata comes from ID3v2.3/2.4 tags (leading or embedded), RIFF
//! `LIST/INFO` entries, or the Apple item list, with the filename stem as
//! the fallback title and leading digits as the fallback track index.

mod aiff;
mod bytes;
mod dff;
mod dsf;
mod id3;
mod m4a;
mod riff;
mod track;

pub mod dsd;
pub mod normalize;

pub use dsd::BitPacker;
pub use track::Track;

/// Decoder failures.
///
/// Everything except `Io` means the input itself is unusable: the caller
/// gets no handle and nothing was streamed.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("unrecognized container format")]
    UnrecognizedFormat,
    #[error("{0}")]
    Malformed(&'static str),
    #[error("unsupported input: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Format(#[from] memplay_proto::format::FormatError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
