//! Command-line driver for the radiance pipeline.
//!
//! Reproduces the host-side flow the pipeline is normally driven with:
//! bulk-load a synthetic weight set, stream a batch of ray samples, and
//! collect the composited colors.

use anyhow::Result;
use clap::Parser;
use radiance_pipeline::{
    Operation, Pipeline, PipelineConfig, PositionSample, StatsSnapshot, TableWrite, FinalColor,
    FREQ_DIM, HIDDEN_DIM, OUT_DIM,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "radiance-pipeline")]
#[command(about = "Streaming control core for a neural radiance pipeline", long_about = None)]
struct Cli {
    /// Number of position samples to stream through the pipeline
    #[arg(short, long, default_value = "192")]
    samples: u32,

    /// Spacing between consecutive sample positions
    #[arg(long, default_value = "0.1")]
    spacing: f32,

    /// Result sink buffer depth
    #[arg(long, default_value = "16")]
    sink_depth: usize,

    /// Encoder-to-network feature buffer depth
    #[arg(long, default_value = "8")]
    feature_depth: usize,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    colors: Vec<FinalColor>,
    stats: StatsSnapshot,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = PipelineConfig {
        position_depth: (cli.samples as usize).max(1),
        sink_depth: cli.sink_depth,
        feature_depth: cli.feature_depth,
        ..Default::default()
    };
    let pipeline = Pipeline::spawn(config)?;

    let writes = demo_table_writes();
    log::info!("loading {} table writes", writes.len());
    pipeline.submit(Operation::weight_init(writes.len() as u32))?;
    for write in &writes {
        pipeline.push_table_write(*write)?;
    }

    log::info!("streaming {} samples along the ray", cli.samples);
    pipeline.submit(Operation::read_pos(cli.samples))?;
    for i in 0..cli.samples {
        let t = i as f32 * cli.spacing;
        pipeline.push_position(PositionSample {
            x: t,
            y: t,
            z: t,
            is_last: i + 1 == cli.samples,
        })?;
    }

    let results = pipeline.results();
    let mut colors = Vec::with_capacity(cli.samples as usize);
    for _ in 0..cli.samples {
        colors.push(results.recv()?);
    }
    let stats = pipeline.stats();
    pipeline.shutdown()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&Report { colors, stats })?);
    } else {
        for (i, color) in colors.iter().enumerate() {
            println!("sample {i:3}: [{:.6}, {:.6}, {:.6}]", color.c[0], color.c[1], color.c[2]);
        }
        println!(
            "done: {} writes routed ({} encoder / {} network), {} samples, {} results",
            stats.writes_admitted,
            stats.writes_to_encoder,
            stats.writes_to_network,
            stats.samples_admitted,
            stats.results_emitted
        );
    }

    Ok(())
}

/// Synthetic weight set: an octave frequency ladder on the encoder, an
/// identity hidden layer, and a small ramp on the output layer.
fn demo_table_writes() -> Vec<TableWrite> {
    let mut writes = Vec::new();

    for row in 0..FREQ_DIM {
        // Octaves repeat over the three coordinates, capped to keep the
        // projected phase in a usable range.
        let octave = ((row / 3) as i32).min(10);
        writes.push(TableWrite {
            row: row as u16,
            col: (row % 3) as u16,
            value: 2f32.powi(octave) / std::f32::consts::PI,
            for_encoder: true,
            for_hidden: false,
        });
    }

    for i in 0..HIDDEN_DIM {
        writes.push(TableWrite {
            row: i as u16,
            col: i as u16,
            value: 1.0,
            for_encoder: false,
            for_hidden: true,
        });
    }

    for row in 0..OUT_DIM {
        for col in 0..HIDDEN_DIM {
            writes.push(TableWrite {
                row: row as u16,
                col: col as u16,
                value: 0.001 * (row * HIDDEN_DIM + col) as f32,
                for_encoder: false,
                for_hidden: false,
            });
        }
    }

    writes
}
