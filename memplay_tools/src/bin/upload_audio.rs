//! Uploads audio files to a playback host, in order.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use memplay_audio::Track;
use memplay_net::upload;

/// Upload audio files for memory playback.
#[derive(Parser, Debug)]
#[command(name = "upload_audio", disable_help_flag = true)]
struct Args {
    /// Files to upload, in playback order.
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Host address (discovered when omitted).
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// Network interface number.
    #[arg(short = 'i', long, default_value_t = 0)]
    interface: u32,

    /// Ask the host to repeat the whole set.
    #[arg(short = 'l', long = "loop")]
    loop_mode: bool,

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

    let mut tracks = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let track = Track::open(path, true)
            .with_context(|| format!("cannot open {}", path.display()))?;
        tracks.push(track);
    }

    // One upload speaks one format; every source must already agree.
    let format = tracks[0]
        .format()
        .with_context(|| format!("{} carries no decodable audio", args.files[0].display()))?;
    for (track, path) in tracks.iter().zip(&args.files) {
        if track.format() != Some(format) {
            bail!(
                "{} is {:?}, expected {format} — sources must share one stream format",
                path.display(),
                track.format(),
            );
        }
        println!("{:02}  {}", track.index(), track.title());
    }
    println!("stream format: {format}");

    let addr = memplay_tools::resolve_host(
        args.host.as_deref(),
        args.interface,
        args.finder.as_deref(),
    )?;
    upload(&addr, &mut tracks, &format, args.loop_mode)?;
    println!("upload complete");
    Ok(())
}
