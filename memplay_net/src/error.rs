//! The stable client error categories.

use memplay_audio::TrackError;
use memplay_proto::frame::FrameError;

/// Every failure a caller can observe, by stable category.
///
/// The set is part of the client ABI: [`category_str`](Error::category_str)
/// returns a fixed message per category so front ends can map errors
/// without string matching on `Display` output.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum Error {
    #[error("socket open failed")]
    SocketOpen,
    #[error("target lookup failed")]
    FindTarget,
    #[error("no hosts found")]
    NoHostsFound,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("connection error")]
    Connection,
    #[error("operation timed out")]
    Timeout,
    #[error("allocation failed")]
    Memory,
    #[error("unknown error")]
    Unknown,
}

impl Error {
    /// Stable human-readable message for the category.
    pub const fn category_str(self) -> &'static str {
        match self {
            Error::SocketOpen => "Failed to open socket",
            Error::FindTarget => "Failed to find targets",
            Error::NoHostsFound => "No playback hosts found",
            Error::InvalidParam => "Invalid parameter",
            Error::Connection => "Connection error",
            Error::Timeout => "Operation timed out",
            Error::Memory => "Memory allocation failed",
            Error::Unknown => "Unknown error",
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        match e {
            // Oversized bodies are a caller mistake; the rest mean the
            // peer broke framing and the connection is unusable.
            FrameError::Oversize(_) => Error::InvalidParam,
            FrameError::UnknownKind(_) | FrameError::Truncated(_) => Error::Connection,
        }
    }
}

impl From<TrackError> for Error {
    fn from(e: TrackError) -> Self {
        match e {
            TrackError::Io(_) => Error::Unknown,
            _ => Error::InvalidParam,
        }
    }
}
