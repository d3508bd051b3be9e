//! Decode a LAS or PCD file and print streaming statistics.
//!
//! Usage: `cargo run --example decode_stats -- <file> [budget_mb]`

use indicatif::{ProgressBar, ProgressStyle};
use point_cloud_engine::{
    DecodeConfig, DecodeEvent, FileSource, SessionHandle,
};
use std::path::Path;

fn main() -> point_cloud_engine::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: decode_stats <file> [budget_mb]");
        std::process::exit(2);
    };
    let mut config = DecodeConfig::default();
    if let Some(budget) = args.next().and_then(|raw| raw.parse::<f64>().ok()) {
        config.max_budget_mb = budget;
    }

    let source = Box::new(FileSource::open(Path::new(&path))?);
    let session = SessionHandle::spawn(source, config, None)?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} points processed ({msg} kept)",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut chunks = 0usize;
    let mut points = 0usize;
    for event in session.events() {
        match event {
            DecodeEvent::Hash(hash) => println!("content hash {hash}"),
            DecodeEvent::Progress(progress) => {
                bar.set_length(progress.total_points);
                bar.set_position(progress.processed_points);
                bar.set_message(progress.accepted_points.to_string());
            }
            DecodeEvent::Chunk(chunk) => {
                chunks += 1;
                points += chunk.point_count();
            }
            DecodeEvent::Done(summary) => {
                bar.finish_and_clear();
                println!(
                    "kept {} of {} points (every {}th) in {chunks} chunks ({points} streamed)",
                    summary.accepted_points, summary.total_points, summary.sample_every
                );
            }
            DecodeEvent::Skip(hash) => println!("unchanged content {hash}, nothing to do"),
            DecodeEvent::Error(message) => {
                bar.finish_and_clear();
                eprintln!("decode failed: {message}");
                std::process::exit(1);
            }
        }
    }
    session.join();
    Ok(())
}
