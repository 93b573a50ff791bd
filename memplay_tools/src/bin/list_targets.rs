//! Lists the playback targets reachable from one host.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use memplay_net::list_targets;

/// List the playback targets a host can reach.
#[derive(Parser, Debug)]
#[command(name = "list_targets", disable_help_flag = true)]
struct Args {
    /// Host address (discovered when omitted).
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// Network interface number.
    #[arg(short = 'i', long, default_value_t = 0)]
    interface: u32,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// External finder command producing host lines.
    #[arg(long, value_name = "CMD")]
    finder: Option<PathBuf>,

    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    memplay_tools::init_logging(args.verbose);

    let addr = memplay_tools::resolve_host(
        args.host.as_deref(),
        args.interface,
        args.finder.as_deref(),
    )?;

    for target in list_targets(&addr)? {
        println!("{}%{} {}", target.address, target.interface, target.name);
    }
    Ok(())
}
