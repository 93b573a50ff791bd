//! Client networking for memory-resident playback hosts.
//!
//! Two kinds of connections exist, deliberately kept separate:
//!
//! - a persistent **control session** ([`Session`]) that issues transport
//!   commands (play, pause, seek, quit) and request/response exchanges
//!   (status, current time, tag list);
//! - a transient **upload connection** ([`upload`]) that announces a
//!   stream format and then pushes one-second audio chunks, each gated on
//!   an explicit acknowledgement from the host.
//!
//! Every connection is thread-confined and blocking-with-timeouts: reads
//! poll in ~100 ms slices against a caller deadline, and nothing is
//! shared, so no locking exists anywhere in this crate.

mod error;
mod transport;

pub mod discovery;
pub mod session;
pub mod upload;

pub use error::Error;
pub use session::{list_targets, PlaybackStatus, Session, TargetInfo};
pub use transport::{HostAddr, Transport, DEFAULT_PORT};
pub use upload::upload;
