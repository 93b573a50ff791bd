//! The persistent control session.

use std::time::Duration;

use memplay_proto::message;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::transport::{receive_headers, HostAddr, Transport};
use crate::Error;

/// Reply budget for ordinary request/response exchanges.
const REPLY_TIMEOUT: Duration = Duration::from_millis(500);
/// The playback clock ticks once a second, so its reply gets more room.
const TIME_REPLY_TIMEOUT: Duration = Duration::from_millis(1250);

/// Host playback state as reported by `Request=Status`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Disconnected,
    Playing,
    Paused,
}

/// One output target known to a host.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TargetInfo {
    pub address: String,
    pub interface: u32,
    pub name: String,
}

/// A persistent control connection to one host.
///
/// The session owns its transport for its whole lifetime. Any transport
/// failure drops the session to disconnected; subsequent commands fail
/// with [`Error::Connection`] until a new session is opened.
#[derive(Debug)]
pub struct Session {
    transport: Transport,
    connected: bool,
}

impl Session {
    pub fn open(addr: &HostAddr) -> Result<Self, Error> {
        let transport = Transport::connect(addr)?;
        debug!(?addr, "control session opened");
        Ok(Self {
            transport,
            connected: true,
        })
    }

    #[inline(always)]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_header(&mut self, key: &str, value: &str) -> Result<(), Error> {
        if !self.connected {
            return Err(Error::Connection);
        }
        let frame = message::command_frame([(key, value)])?;
        if let Err(e) = self.transport.send(&frame) {
            self.connected = false;
            return Err(e);
        }
        Ok(())
    }

    /// Asks the host to connect its output to a playback target.
    pub fn connect_target(&mut self, address: &str, interface: u32) -> Result<(), Error> {
        self.send_header("Connect", &format!("{address} {interface}"))
    }

    pub fn play(&mut self) -> Result<(), Error> {
        self.send_header("Play", "")
    }

    pub fn pause(&mut self) -> Result<(), Error> {
        self.send_header("Pause", "")
    }

    /// Seeks by a signed offset in seconds. Zero counts as non-positive
    /// and is sent without a sign, exactly like a negative offset.
    pub fn seek(&mut self, offset_seconds: i64) -> Result<(), Error> {
        let value = if offset_seconds > 0 {
            format!("+{offset_seconds}")
        } else {
            format!("{offset_seconds}")
        };
        self.send_header("Seek", &value)
    }

    pub fn seek_to_start(&mut self) -> Result<(), Error> {
        self.send_header("Seek", "Front")
    }

    /// Seeks to an absolute position in seconds (no sign prefix).
    pub fn seek_absolute(&mut self, position_seconds: i64) -> Result<(), Error> {
        self.send_header("Seek", &position_seconds.to_string())
    }

    /// Tells the host to stop playback and discard the uploaded set.
    pub fn quit(&mut self) -> Result<(), Error> {
        self.send_header("Seek", "Quit")
    }

    /// Queries playback status.
    ///
    /// A quiet host counts as disconnected rather than an error; only
    /// transport failures surface.
    pub fn status(&mut self) -> Result<PlaybackStatus, Error> {
        self.send_header("Request", "Status")?;

        let mut status = PlaybackStatus::Disconnected;
        let outcome = receive_headers(&mut self.transport, REPLY_TIMEOUT, |key, value| {
            if key != "Status" {
                return false;
            }
            status = match value {
                "Play" => PlaybackStatus::Playing,
                "Pause" => PlaybackStatus::Paused,
                _ => PlaybackStatus::Disconnected,
            };
            true
        });
        self.settle(outcome)?;
        Ok(status)
    }

    /// Queries the playback clock, in seconds.
    ///
    /// Returns −1 when the host is paused or disconnected (the clock is
    /// meaningless then) or when no `LastTime` arrives in the budget.
    pub fn current_time(&mut self) -> Result<i64, Error> {
        self.send_header("Request", "Status")?;

        let mut seconds = -1;
        let outcome = receive_headers(&mut self.transport, TIME_REPLY_TIMEOUT, |key, value| {
            match key {
                "Status" => matches!(value, "Disconnect" | "Pause"),
                "LastTime" => {
                    seconds = value.parse().unwrap_or(0);
                    true
                }
                _ => false,
            }
        });
        self.settle(outcome)?;
        Ok(seconds)
    }

    /// Fetches the uploaded tag list: every `Tag` header up to the first
    /// header of any other kind.
    pub fn tag_list(&mut self) -> Result<Vec<String>, Error> {
        self.send_header("Request", "Status")?;

        let mut tags = Vec::new();
        let outcome = receive_headers(&mut self.transport, REPLY_TIMEOUT, |key, value| {
            if key == "Tag" {
                tags.push(value.to_owned());
                false
            } else {
                true
            }
        });
        self.settle(outcome)?;
        Ok(tags)
    }

    /// A reply timeout is an answer in itself (the host is idle or not
    /// speaking); a transport failure kills the session.
    fn settle(&mut self, outcome: Result<(), Error>) -> Result<(), Error> {
        match outcome {
            Ok(()) | Err(Error::Timeout) => Ok(()),
            Err(e) => {
                self.connected = false;
                Err(e)
            }
        }
    }
}

/// Asks a host for its reachable playback targets over a transient
/// connection.
///
/// The host answers with one `TargetList` header per target, formatted
/// `"<address> <interface> <name>"`; collection stops at the first
/// other header or after a quiet reply budget.
pub fn list_targets(addr: &HostAddr) -> Result<Vec<TargetInfo>, Error> {
    let mut transport = Transport::connect(addr)?;
    transport.send(&message::command_frame([("Request", "TargetList")])?)?;

    let mut targets = Vec::new();
    let outcome = receive_headers(&mut transport, REPLY_TIMEOUT, |key, value| {
        if key != "TargetList" {
            return true;
        }
        let mut parts = value.splitn(3, ' ');
        if let (Some(address), Some(interface), Some(name)) =
            (parts.next(), parts.next(), parts.next())
        {
            targets.push(TargetInfo {
                address: address.to_owned(),
                interface: interface.parse().unwrap_or(0),
                name: name.to_owned(),
            });
        }
        false
    });

    match outcome {
        Ok(()) => Ok(targets),
        // The list has no terminator of its own; a quiet line after at
        // least one entry is the normal end.
        Err(Error::Timeout) if !targets.is_empty() => Ok(targets),
        Err(e) => Err(e),
    }
}
