//! Host discovery contract.
//!
//! Finding hosts on the local network is an external capability (a
//! multicast probe, a vendor tool, a fixture in tests); this module only
//! fixes the shape of its results and ships one adapter that runs an
//! external finder process.
//!
//! The finder prints one host per stdout line, five tab-separated
//! fields:
//!
//! ```text
//! <address> \t <interface> \t <target-name> \t <output-name> \t <loopback>
//! ```
//!
//! where `<loopback>` is `0`/`1` (or `false`/`true`).

use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;

/// One discovered playback host.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct HostInfo {
    /// Textual address, scope not included.
    pub address: String,
    /// Interface scope id the host was seen on.
    pub interface: u32,
    pub target_name: String,
    pub output_name: String,
    pub is_loopback: bool,
}

/// A source of host candidates.
pub trait Discover {
    fn discover(&self) -> Result<Vec<HostInfo>, Error>;
}

/// Runs an external finder process and parses its output.
#[derive(Clone, Debug)]
pub struct HelperDiscovery {
    pub command: PathBuf,
}

impl HelperDiscovery {
    /// The finder looked up on `PATH` when none is configured.
    pub const DEFAULT_COMMAND: &'static str = "memplay-find";

    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for HelperDiscovery {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COMMAND)
    }
}

impl Discover for HelperDiscovery {
    fn discover(&self) -> Result<Vec<HostInfo>, Error> {
        debug!(command = %self.command.display(), "running host finder");
        let output = Command::new(&self.command)
            .output()
            .map_err(|_| Error::FindTarget)?;
        if !output.status.success() {
            return Err(Error::FindTarget);
        }
        parse_host_lines(&output.stdout)
    }
}

/// Parses finder output. An empty result is [`Error::NoHostsFound`];
/// malformed lines are skipped.
pub fn parse_host_lines(bytes: &[u8]) -> Result<Vec<HostInfo>, Error> {
    let text = String::from_utf8_lossy(bytes);
    let mut hosts = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [address, interface, target_name, output_name, loopback] = fields[..] else {
            continue;
        };
        hosts.push(HostInfo {
            address: address.trim().to_owned(),
            interface: interface.trim().parse().unwrap_or(0),
            target_name: target_name.trim().to_owned(),
            output_name: output_name.trim().to_owned(),
            is_loopback: matches!(loopback.trim(), "1" | "true"),
        });
    }

    if hosts.is_empty() {
        return Err(Error::NoHostsFound);
    }
    Ok(hosts)
}

/// Fixed host list, for tests and configuration-pinned setups.
#[derive(Clone, Debug, Default)]
pub struct StaticDiscovery(pub Vec<HostInfo>);

impl Discover for StaticDiscovery {
    fn discover(&self) -> Result<Vec<HostInfo>, Error> {
        if self.0.is_empty() {
            return Err(Error::NoHostsFound);
        }
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_finder_lines() {
        let out = b"fe80::1\t2\tStudy Hub\tUSB DAC\t0\n::1\t0\tLocal\tNull Out\t1\n";
        let hosts = parse_host_lines(out).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].address, "fe80::1");
        assert_eq!(hosts[0].interface, 2);
        assert!(!hosts[0].is_loopback);
        assert_eq!(hosts[1].output_name, "Null Out");
        assert!(hosts[1].is_loopback);
    }

    #[test]
    fn skips_malformed_lines() {
        let out = b"garbage\nfe80::1\t2\tA\tB\t0\n";
        let hosts = parse_host_lines(out).unwrap();
        assert_eq!(hosts.len(), 1);
    }

    #[test]
    fn empty_output_means_no_hosts() {
        assert_eq!(parse_host_lines(b"").unwrap_err(), Error::NoHostsFound);
        assert_eq!(
            StaticDiscovery::default().discover().unwrap_err(),
            Error::NoHostsFound
        );
    }
}
