use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use spclink::image::{ComposeOptions, compose};
use spclink::link::SpcLink;
use spclink::spc::Snapshot;

mod serial;
mod spc;
use serial::SerialTransport;
use spc::{check as spc_check, info as spc_info, read_spc_as_vec};

/// spclink command line tools
#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show register and ID666 summary for an SPC file (accepts plain or gzipped input; use '-' for stdin)
    Info {
        /// Input file to read (use '-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Dry-run composition: report the echo region, injection site and stub patches
    Check {
        /// Input file to read (use '-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Transfer the snapshot over a serial link and start playback
    Play {
        /// Input file to read (use '-' for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Serial device the target hardware is attached to
        #[arg(long = "port", value_name = "DEV")]
        port: String,
        /// Baud rate for the serial link
        #[arg(long = "baud", default_value_t = 115_200)]
        baud: u32,
        /// Keep the captured voice state instead of muting until the program re-keys its voices
        #[arg(long = "keep-voices")]
        keep_voices: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => {
            let bytes = read_spc_as_vec(&file)?;
            spc_info(&file, &bytes)?;
        }
        Commands::Check { file } => {
            let bytes = read_spc_as_vec(&file)?;
            spc_check(&file, &bytes)?;
        }
        Commands::Play {
            file,
            port,
            baud,
            keep_voices,
        } => {
            let bytes = read_spc_as_vec(&file)?;
            play(&file, &bytes, port, baud, keep_voices)?;
        }
    }

    Ok(())
}

fn play(file: &std::path::Path, bytes: &[u8], port: String, baud: u32, keep_voices: bool) -> Result<()> {
    let snapshot: Snapshot = bytes
        .try_into()
        .with_context(|| format!("failed to parse SPC file: {}", file.display()))?;

    let options = ComposeOptions {
        mute_voices: !keep_voices,
    };
    let set = compose(&snapshot, &options)?;

    let mut link = SpcLink::new(SerialTransport::new(port, baud));
    link.open().context("device did not become ready")?;
    link.boot(&set).context("boot sequence failed")?;

    if let Some(title) = snapshot.id666.as_ref().and_then(|m| m.song_title.as_deref()) {
        println!("Playing: {title}");
    }
    println!("Playback started (entry {:#06X}).", set.boot_entry);
    Ok(())
}
