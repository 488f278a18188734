use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fragcat")]
#[command(author, version, about = "Live fragmented-MP4 stream segmenter")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a fragmented MP4 stream and emit self-contained segments
    Run {
        /// Input stream: a file path, or "-" for stdin (live pipe)
        #[arg(required = true)]
        input: PathBuf,

        /// Write each merged, playable segment into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Expected track interleaving per fragment, in traf order
        #[arg(long, default_value = "video,audio")]
        tracks: String,
    },

    /// Display version information
    Version,
}
