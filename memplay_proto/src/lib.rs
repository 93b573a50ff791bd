//! The framed control/data protocol spoken by memory-resident playback hosts.
//!
//! Everything on the wire is a *payload frame*: a fixed 9-byte header
//! followed by a kind-specific sub-header and a variable-length body.
//! Three frame kinds exist:
//!
//! - **Data** (`0`) — audio bytes, prefixed by the 4-byte stream format
//!   token. A data frame carrying only the token (no audio) announces the
//!   stream to the host.
//! - **Command** (`1`) — ASCII `key=value` header lines, used for both
//!   requests (client → host) and replies (host → client).
//! - **Tag** (`2`) — a UTF-8 string naming the track just uploaded, or one
//!   of the loop/quit sentinels.
//!
//! ## Layout
//!
//! ```text
//! offset
//!    0  ┐
//!    1  │ length (u24, big-endian) — bytes after this header
//!    2  ┘
//!    3    kind (0 = data, 1 = command, 2 = tag)
//!    4    flags
//!    5  ┐
//!    6  │ identifier (u32, big-endian)
//!    7  │
//!    8  ┘
//! ------
//!    sub-header: 1 pad byte (data/tag) or
//!                pad(1) + dependency(u32 BE) + weight(1) (command)
//! ------
//!    body (length − sub-header bytes)
//! ```
//!
//! All multi-byte integers are big-endian. `length` covers the sub-header
//! and body but not the 9-byte frame header itself.
//!
//! ## Modules
//!
//! - [`format`] — the packed 4-byte stream format token and its builder.
//! - [`frame`] — encoding frames and peeling whole frames off a byte stream.
//! - [`message`] — composing complete data / tag / command frames.
//! - [`headers`] — reassembling frames from a growing receive buffer and
//!   parsing command header lines.

pub mod format;
pub mod frame;
pub mod headers;
pub mod message;

pub use format::{FormatId, StreamFormat};
pub use frame::{FrameError, PayloadKind};
pub use headers::{FrameAssembler, HeaderList};

/// Sequence-acknowledgement header keys sent by the host after each
/// data or tag frame during an upload.
pub const ACK_DATA_KEY: &str = "DataStack";
pub const ACK_TAG_KEY: &str = "DataTag";

/// Tag sentinel requesting that the uploaded set repeats indefinitely.
pub const TAG_LOOP: &str = "@@Diretta-TAG-LOOP@@";
/// Tag sentinel closing an upload.
pub const TAG_QUIT: &str = "@@Diretta-TAG-QUIT@@";
