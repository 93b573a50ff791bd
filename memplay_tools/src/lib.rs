//! Shared plumbing for the command-line drivers.

use std::path::Path;

use anyhow::Result;
use memplay_net::discovery::{Discover, HelperDiscovery};
use memplay_net::HostAddr;

/// Wires up `tracing` output. `RUST_LOG` wins; otherwise `-v` raises the
/// default level from `info` to `debug`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

/// Resolves the host to talk to: the explicit address when given,
/// otherwise discovery, preferring a loopback host.
pub fn resolve_host(
    address: Option<&str>,
    interface: u32,
    finder: Option<&Path>,
) -> Result<HostAddr> {
    if let Some(address) = address {
        return Ok(HostAddr::new(address, interface)?);
    }

    let finder = finder.map(HelperDiscovery::new).unwrap_or_default();
    let hosts = finder.discover()?;
    let host = hosts.iter().find(|h| h.is_loopback).unwrap_or(&hosts[0]);
    eprintln!("using host {}%{}", host.address, host.interface);
    Ok(HostAddr::new(&host.address, host.interface)?)
}
