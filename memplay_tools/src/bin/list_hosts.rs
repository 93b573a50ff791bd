//! Lists playback hosts discovered on the local network.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use memplay_net::discovery::{Discover, HelperDiscovery};

/// List reachable playback hosts.
#[derive(Parser, Debug)]
#[command(name = "list_hosts")]
struct Args {
    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// External finder command producing host lines.
    #[arg(long, value_name = "CMD")]
    finder: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    memplay_tools::init_logging(args.verbose);

    let finder = args
        .finder
        .map(HelperDiscovery::new)
        .unwrap_or_default();
    let hosts = finder.discover()?;

    for host in &hosts {
        print!(
            "{}%{}\t{} / {}",
            host.address, host.interface, host.target_name, host.output_name
        );
        if host.is_loopback {
            print!("\t(loopback)");
        }
        println!();
        if args.verbose {
            eprintln!("  raw: {host:?}");
        }
    }
    Ok(())
}
