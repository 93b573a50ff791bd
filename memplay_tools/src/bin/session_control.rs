//! Drives a persistent control session: connect, transport commands and
//! status queries.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use memplay_net::{list_targets, Session};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Action {
    /// Connect the host to its first reachable target.
    Connect,
    Play,
    Pause,
    /// Show playback status and clock.
    Status,
    /// Show the uploaded tag list.
    Tags,
    /// Seek forward 60 seconds.
    Forward,
    /// Seek backward 60 seconds.
    Backward,
    /// Seek to the beginning.
    Start,
    /// Seek to an absolute position (see --seconds).
    Seek,
    /// Stop playback and discard the uploaded set.
    Quit,
}

/// Drive a control session on a playback host.
#[derive(Parser, Debug)]
#[command(name = "session_control", disable_help_flag = true)]
struct Args {
    #[arg(value_enum, default_value = "status")]
    action: Action,

    /// Host address (discovered when omitted).
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// Network interface number.
    #[arg(short = 'i', long, default_value_t = 0)]
    interface: u32,

    /// Status iterations, one second apart.
    #[arg(short = 'n', long, default_value_t = 1)]
    iterations: u32,

    /// Seek position in seconds (for `seek`).
    #[arg(short = 's', long, default_value_t = 0)]
    seconds: i64,

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
    let mut session = Session::open(&addr)?;

    match args.action {
        Action::Connect => {
            let targets = list_targets(&addr)?;
            let target = targets
                .first()
                .ok_or_else(|| anyhow!("host reports no targets"))?;
            session.connect_target(&target.address, target.interface)?;
            println!("connected to {}", target.name);
        }
        Action::Play => session.play()?,
        Action::Pause => session.pause()?,
        Action::Status => {
            for round in 0..args.iterations.max(1) {
                let status = session.status()?;
                let time = session.current_time()?;
                println!("status: {status:?}  time: {time}s");
                if round + 1 < args.iterations {
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
        Action::Tags => {
            for tag in session.tag_list()? {
                println!("{tag}");
            }
        }
        Action::Forward => session.seek(60)?,
        Action::Backward => session.seek(-60)?,
        Action::Start => session.seek_to_start()?,
        Action::Seek => session.seek_absolute(args.seconds)?,
        Action::Quit => session.quit()?,
    }
    Ok(())
}
