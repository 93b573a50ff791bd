//! Blocking TCP transport with sliced timeouts.

use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, SocketAddrV6, TcpStream};
use std::time::{Duration, Instant};

use memplay_proto::{FrameAssembler, HeaderList, PayloadKind};
use tracing::trace;

use crate::Error;

/// The host control/data port.
pub const DEFAULT_PORT: u16 = 19640;

/// Granularity of one receive poll slice.
pub const POLL_SLICE: Duration = Duration::from_millis(100);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A resolved host endpoint.
///
/// Hosts announce themselves on IPv6, usually with link-local addresses
/// that need an interface scope id to be routable; `interface` carries
/// that scope. Plain IPv4 addresses are accepted too, in which case the
/// scope is ignored.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HostAddr {
    pub address: IpAddr,
    pub interface: u32,
    pub port: u16,
}

impl HostAddr {
    /// Parses a textual address with an interface scope id.
    pub fn new(address: &str, interface: u32) -> Result<Self, Error> {
        let address: IpAddr = address.trim().parse().map_err(|_| Error::InvalidParam)?;
        Ok(Self {
            address,
            interface,
            port: DEFAULT_PORT,
        })
    }

    #[inline(always)]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn socket_addr(&self) -> SocketAddr {
        match self.address {
            IpAddr::V6(v6) => SocketAddr::V6(SocketAddrV6::new(v6, self.port, 0, self.interface)),
            IpAddr::V4(v4) => SocketAddr::new(IpAddr::V4(v4), self.port),
        }
    }
}

/// Outcome of one receive poll slice.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Wait {
    /// Bytes arrived and were fed to the frame assembler.
    Wakeup,
    /// The slice elapsed with no traffic.
    Timeout,
}

/// One connection to a host: a TCP stream plus the receive-side frame
/// assembler. Writes are strictly serial; reads poll with a timeout so
/// callers control their own deadlines. Dropping the transport closes
/// the socket.
#[derive(Debug)]
pub struct Transport {
    stream: TcpStream,
    assembler: FrameAssembler,
    read_timeout: Duration,
}

impl Transport {
    pub fn connect(addr: &HostAddr) -> Result<Self, Error> {
        let stream = TcpStream::connect_timeout(&addr.socket_addr(), CONNECT_TIMEOUT)
            .map_err(|_| Error::Connection)?;
        // Command frames and acks are tiny; do not let Nagle sit on them.
        let _ = stream.set_nodelay(true);
        stream
            .set_read_timeout(Some(POLL_SLICE))
            .map_err(|_| Error::SocketOpen)?;

        Ok(Self {
            stream,
            assembler: FrameAssembler::new(),
            read_timeout: POLL_SLICE,
        })
    }

    /// Writes one whole frame.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.stream.write_all(frame).map_err(|_| Error::Connection)
    }

    /// Waits up to `slice` for traffic. Received bytes land in the
    /// assembler; drain them with [`drain_frames`](Self::drain_frames).
    pub fn poll(&mut self, slice: Duration) -> Result<Wait, Error> {
        if slice != self.read_timeout {
            self.stream
                .set_read_timeout(Some(slice))
                .map_err(|_| Error::Connection)?;
            self.read_timeout = slice;
        }

        let mut buf = [0u8; 4096];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(Error::Connection),
            Ok(n) => {
                trace!(bytes = n, "received");
                self.assembler.extend_from_slice(&buf[..n]);
                Ok(Wait::Wakeup)
            }
            Err(e) if is_timeout(e.kind()) => Ok(Wait::Timeout),
            Err(_) => Err(Error::Connection),
        }
    }

    /// Drains every complete received frame into `handle`.
    pub fn drain_frames<F>(&mut self, handle: F) -> Result<(), Error>
    where
        F: FnMut(PayloadKind, &[u8]),
    {
        self.assembler.poll(handle).map_err(Error::from)
    }
}

/// Both `WouldBlock` and `TimedOut` mean the slice elapsed, depending on
/// platform.
#[inline(always)]
fn is_timeout(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(kind, WouldBlock | TimedOut)
}

/// Drives receive polls until `on_header` reports completion.
///
/// Every arriving command-frame header resets the `budget` clock (any
/// traffic proves the host is alive); the wait fails with `Timeout` only
/// after a full quiet `budget`. Non-command frames are ignored.
pub(crate) fn receive_headers<F>(
    transport: &mut Transport,
    budget: Duration,
    mut on_header: F,
) -> Result<(), Error>
where
    F: FnMut(&str, &str) -> bool,
{
    let mut last_traffic = Instant::now();
    let mut done = false;

    loop {
        match transport.poll(POLL_SLICE)? {
            Wait::Timeout => {
                if last_traffic.elapsed() >= budget {
                    return Err(Error::Timeout);
                }
            }
            Wait::Wakeup => {
                transport.drain_frames(|kind, body| {
                    if kind != PayloadKind::Command {
                        return;
                    }
                    for (key, value) in HeaderList::parse(body).iter() {
                        last_traffic = Instant::now();
                        if !done && on_header(key, value) {
                            done = true;
                        }
                    }
                })?;
                if done {
                    return Ok(());
                }
            }
        }
    }
}
