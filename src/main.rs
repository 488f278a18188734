mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use fragcat_media::{Segmenter, TrackLayout, TrackRole};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "fragcat=trace,fragcat_media=trace".to_string()
        } else {
            "fragcat=info,fragcat_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Run {
            input,
            out_dir,
            tracks,
        } => run_stream(&input, out_dir.as_deref(), &tracks),
        Commands::Version => {
            println!("fragcat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_stream(input: &Path, out_dir: Option<&Path>, tracks: &str) -> Result<()> {
    let layout = parse_layout(tracks)?;

    if input.as_os_str() == "-" {
        let stdin = std::io::stdin();
        segment_stream(stdin.lock(), layout, out_dir)
    } else {
        let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
        segment_stream(BufReader::new(file), layout, out_dir)
    }
}

fn parse_layout(tracks: &str) -> Result<TrackLayout> {
    let mut roles = Vec::new();
    for part in tracks.split(',') {
        match part.trim() {
            "video" => roles.push(TrackRole::Video),
            "audio" => roles.push(TrackRole::Audio),
            other => anyhow::bail!("unknown track role {other:?} (expected \"video\" or \"audio\")"),
        }
    }
    Ok(TrackLayout::new(roles))
}

fn segment_stream<R: Read>(source: R, layout: TrackLayout, out_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    // Init segment is read exactly once; the returned stream is the only
    // handle that can read media segments.
    let mut stream = Segmenter::with_layout(source, layout)
        .read_init()
        .context("reading init segment")?;
    tracing::info!(
        ftyp_bytes = stream.init().ftyp.as_bytes().len(),
        moov_bytes = stream.init().moov.as_bytes().len(),
        "Read init segment"
    );

    let mut index = 0u64;
    loop {
        let Some(media) = stream
            .read_media()
            .with_context(|| format!("reading media segment {index}"))?
        else {
            // mfra trailer: expected termination, never surfaced as a failure.
            tracing::info!(segments = index, "End of stream (mfra trailer)");
            return Ok(());
        };

        tracing::info!(
            segment = index,
            moof_bytes = media.moof.as_bytes().len(),
            mdat_bytes = media.mdat.as_bytes().len(),
            video_time = media.base_video_decode_time(),
            audio_time = media.base_audio_decode_time(),
            "Read media segment"
        );

        if let Some(dir) = out_dir {
            let merged = stream.merge(media);
            let path = dir.join(format!("segment-{index:05}.mp4"));
            std::fs::write(&path, &merged.buffer)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::debug!(
                path = %path.display(),
                bytes = merged.buffer.len(),
                "Wrote merged segment"
            );
        }

        index += 1;
    }
}
