//! # radiance-pipeline
//!
//! Streaming control and dataflow-routing core for a fixed-function neural
//! radiance pipeline: a sample position goes in, an alpha-weighted color
//! comes out, staged through three specialized processing units.
//!
//! ## Architecture
//!
//! - **Sequencer**: gates all external input; runs `WEIGHT_INIT` and
//!   `READ_POS` operations to completion, strictly in arrival order
//! - **Router**: demultiplexes the staged table-write stream to the stage
//!   owning the targeted table
//! - **Encoder / Network / Compositor**: the three compute stages, wired in
//!   a line with bounded buffering between them
//! - **Relay**: repacks the network's raw output into the compositor's
//!   input shape
//!
//! Each activity is one long-lived thread; all communication goes through
//! the typed links of [`link`]. The topology is a line plus one fan-out, so
//! a stalled consumer throttles the whole pipeline through blocking sends
//! instead of dropping records, and there is no cycle that could deadlock.
//!
//! ## Example
//!
//! ```no_run
//! use radiance_pipeline::{Operation, Pipeline, PipelineConfig, PositionSample};
//!
//! fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::spawn(PipelineConfig::default())?;
//!
//!     pipeline.submit(Operation::read_pos(1))?;
//!     pipeline.push_position(PositionSample { x: 0.0, y: 0.0, z: 0.0, is_last: true })?;
//!
//!     let color = pipeline.results().recv()?;
//!     println!("{:?}", color.c);
//!     pipeline.shutdown()
//! }
//! ```

pub mod compositor;
pub mod encoder;
pub mod link;
pub mod network;
pub mod relay;
pub mod router;
pub mod sequencer;
pub mod types;

pub use compositor::Compositor;
pub use encoder::Encoder;
pub use link::{Disconnected, LinkReceiver, LinkSender};
pub use network::Network;
pub use relay::{Relay, STEP_SIZE};
pub use router::Router;
pub use sequencer::Sequencer;
pub use types::*;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::thread;

/// A running pipeline: six worker threads plus the link endpoints the host
/// drives it through.
pub struct Pipeline {
    operations: LinkSender<Operation>,
    positions: LinkSender<PositionSample>,
    table_writes: LinkSender<TableWrite>,
    results: LinkReceiver<FinalColor>,
    stats: Arc<PipelineStats>,
    workers: Vec<(&'static str, thread::JoinHandle<()>)>,
}

impl Pipeline {
    /// Wires the full topology and spawns one thread per activity.
    pub fn spawn(config: PipelineConfig) -> Result<Pipeline> {
        log::info!(
            "spawning pipeline (staging {}, features {}, sink {})",
            config.staging_depth,
            config.feature_depth,
            config.sink_depth
        );
        let stats = Arc::new(PipelineStats::default());

        // Host-facing inboxes.
        let (ops_tx, ops_rx) = link::bounded(config.op_depth);
        let (pos_tx, pos_rx) = link::bounded(config.position_depth);
        let (load_tx, load_rx) = link::bounded(config.load_depth);

        // Internal fabric. Buffered links decouple independently-paced
        // neighbors; rendezvous links are the direct hand-offs.
        let (staged_tx, staged_rx) = link::bounded(config.staging_depth);
        let (enc_in_tx, enc_in_rx) = link::rendezvous();
        let (enc_w_tx, enc_w_rx) = link::rendezvous();
        let (net_w_tx, net_w_rx) = link::rendezvous();
        let (feat_tx, feat_rx) = link::bounded(config.feature_depth);
        let (net_out_tx, net_out_rx) = link::rendezvous();
        let (comp_in_tx, comp_in_rx) = link::rendezvous();
        let (result_tx, result_rx) = link::bounded(config.sink_depth);

        let sequencer = Sequencer {
            ops: ops_rx,
            loads: load_rx,
            positions: pos_rx,
            router: staged_tx,
            encoder: enc_in_tx,
            stats: stats.clone(),
        };
        let router = Router {
            inbound: staged_rx,
            encoder: enc_w_tx,
            network: net_w_tx,
            stats: stats.clone(),
        };
        let relay = Relay {
            inbound: net_out_rx,
            outbound: comp_in_tx,
            stats: stats.clone(),
        };
        let encoder = Encoder::new(enc_w_rx, enc_in_rx, feat_tx);
        let network = Network::new(net_w_rx, feat_rx, net_out_tx);
        let compositor = Compositor {
            input: comp_in_rx,
            output: result_tx,
            stats: stats.clone(),
        };

        let workers = vec![
            spawn_worker("sequencer", move || sequencer.run())?,
            spawn_worker("router", move || router.run())?,
            spawn_worker("relay", move || relay.run())?,
            spawn_worker("encoder", move || encoder.run())?,
            spawn_worker("network", move || network.run())?,
            spawn_worker("compositor", move || compositor.run())?,
        ];

        Ok(Pipeline {
            operations: ops_tx,
            positions: pos_tx,
            table_writes: load_tx,
            results: result_rx,
            stats,
            workers,
        })
    }

    /// Submits one operation record.
    pub fn submit(&self, op: Operation) -> Result<(), Disconnected> {
        self.operations.send(op)
    }

    /// Stages one position sample on the external position stream.
    pub fn push_position(&self, sample: PositionSample) -> Result<(), Disconnected> {
        self.positions.send(sample)
    }

    /// Stages one table write on the external load stream.
    pub fn push_table_write(&self, write: TableWrite) -> Result<(), Disconnected> {
        self.table_writes.send(write)
    }

    /// Sending half of the operation stream, for feeders that outlive the
    /// handle.
    pub fn operations(&self) -> LinkSender<Operation> {
        self.operations.clone()
    }

    /// Receiving half of the result sink.
    pub fn results(&self) -> LinkReceiver<FinalColor> {
        self.results.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Drops the inbound streams and joins every worker.
    ///
    /// The disconnect cascades down the line: the sequencer winds down
    /// first, each downstream activity follows once its inbound link
    /// drains. Undrained results still buffered in the sink are discarded
    /// with the handle; drain [`Pipeline::results`] first if they matter.
    pub fn shutdown(self) -> Result<()> {
        let Pipeline {
            operations,
            positions,
            table_writes,
            results,
            stats: _,
            workers,
        } = self;
        drop(operations);
        drop(positions);
        drop(table_writes);
        drop(results);

        for (name, handle) in workers {
            handle
                .join()
                .map_err(|_| anyhow!("{name} worker panicked"))?;
        }
        log::info!("pipeline shut down cleanly");
        Ok(())
    }
}

fn spawn_worker(
    name: &'static str,
    body: impl FnOnce() + Send + 'static,
) -> Result<(&'static str, thread::JoinHandle<()>)> {
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .with_context(|| format!("failed to spawn {name} worker"))?;
    Ok((name, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn encoder_write(row: u16, col: u16, value: f32) -> TableWrite {
        TableWrite {
            row,
            col,
            value,
            for_encoder: true,
            for_hidden: false,
        }
    }

    fn network_write(row: u16, col: u16, value: f32, for_hidden: bool) -> TableWrite {
        TableWrite {
            row,
            col,
            value,
            for_encoder: false,
            for_hidden,
        }
    }

    fn sample(x: f32, is_last: bool) -> PositionSample {
        PositionSample {
            x,
            y: 0.0,
            z: 0.0,
            is_last,
        }
    }

    /// Reference model: the same tables applied to offline stage instances.
    fn expected_colors(writes: &[TableWrite], samples: &[PositionSample]) -> Vec<FinalColor> {
        let (_t1, dummy_loads) = link::bounded(1);
        let (_t2, dummy_pos) = link::bounded(1);
        let (dummy_feat_tx, _r1) = link::bounded(1);
        let mut encoder = Encoder::new(dummy_loads, dummy_pos, dummy_feat_tx);

        let (_t3, dummy_loads2) = link::bounded(1);
        let (_t4, dummy_feat_rx) = link::bounded(1);
        let (dummy_out_tx, _r2) = link::bounded(1);
        let mut network = Network::new(dummy_loads2, dummy_feat_rx, dummy_out_tx);

        for &write in writes {
            if write.for_encoder {
                encoder.apply(write);
            } else {
                network.apply(write);
            }
        }

        samples
            .iter()
            .map(|s| {
                let output = network.evaluate(&encoder.expand(s));
                Compositor::composite(&CompositeInput {
                    emitted: output.color,
                    density: output.density,
                    step: STEP_SIZE,
                })
            })
            .collect()
    }

    #[test]
    fn end_to_end_weight_init_then_batch() {
        let pipeline = Pipeline::spawn(PipelineConfig::default()).unwrap();

        // Four writes, split 2/2 between the stages.
        let writes = [
            encoder_write(0, 0, 0.5),
            encoder_write(1, 1, 0.25),
            network_write(0, 0, 1.0, true),
            network_write(0, 0, 1.0, false),
        ];
        pipeline.submit(Operation::weight_init(writes.len() as u32)).unwrap();
        for write in writes {
            pipeline.push_table_write(write).unwrap();
        }
        wait_for(|| {
            let snap = pipeline.stats();
            snap.writes_to_encoder == 2 && snap.writes_to_network == 2
        });

        let samples = [sample(0.2, false), sample(0.4, false), sample(0.6, true)];
        pipeline.submit(Operation::read_pos(3)).unwrap();
        for s in samples {
            pipeline.push_position(s).unwrap();
        }

        let results = pipeline.results();
        let mut colors = Vec::new();
        for _ in 0..3 {
            colors.push(
                results
                    .recv_timeout(RECV_TIMEOUT)
                    .unwrap()
                    .expect("pipeline stalled"),
            );
        }

        // All three complete, including the sample marked last. With no
        // density weights loaded every contribution is zero.
        assert_eq!(colors, expected_colors(&writes, &samples));

        let snap = pipeline.stats();
        assert_eq!(snap.ops_executed, 2);
        assert_eq!(snap.writes_admitted, 4);
        assert_eq!(snap.writes_to_encoder, 2);
        assert_eq!(snap.writes_to_network, 2);
        assert_eq!(snap.samples_admitted, 3);
        assert_eq!(snap.results_emitted, 3);

        pipeline.shutdown().unwrap();
    }

    #[test]
    fn results_preserve_sample_order() {
        let pipeline = Pipeline::spawn(PipelineConfig::default()).unwrap();

        // One live frequency, an identity hidden weight, and matching color
        // and density rows: the first output channel becomes a strictly
        // increasing function of x over (0, 1).
        let writes = [
            encoder_write(0, 0, 0.5),
            network_write(0, 0, 1.0, true),
            network_write(0, 0, 1.0, false),
            network_write(3, 0, 1.0, false),
        ];
        pipeline.submit(Operation::weight_init(writes.len() as u32)).unwrap();
        for write in writes {
            pipeline.push_table_write(write).unwrap();
        }
        wait_for(|| {
            let snap = pipeline.stats();
            snap.writes_to_encoder == 1 && snap.writes_to_network == 3
        });

        let samples: Vec<PositionSample> = (1..=8)
            .map(|i| sample(i as f32 * 0.1, i == 8))
            .collect();
        pipeline.submit(Operation::read_pos(samples.len() as u32)).unwrap();
        for &s in &samples {
            pipeline.push_position(s).unwrap();
        }

        let results = pipeline.results();
        let mut colors = Vec::new();
        for _ in 0..samples.len() {
            colors.push(
                results
                    .recv_timeout(RECV_TIMEOUT)
                    .unwrap()
                    .expect("pipeline stalled"),
            );
        }

        assert_eq!(colors, expected_colors(&writes, &samples));
        for pair in colors.windows(2) {
            assert!(
                pair[0].c[0] < pair[1].c[0],
                "results must come back in admission order"
            );
        }

        pipeline.shutdown().unwrap();
    }

    #[test]
    fn full_sink_stalls_the_pipeline_without_loss() {
        let config = PipelineConfig {
            position_depth: 64,
            feature_depth: 1,
            sink_depth: 2,
            ..Default::default()
        };
        let pipeline = Pipeline::spawn(config).unwrap();

        pipeline.submit(Operation::read_pos(32)).unwrap();
        for i in 0..32 {
            pipeline.push_position(sample(i as f32, i == 31)).unwrap();
        }

        // With nobody draining the sink, the stall must reach the sequencer
        // before the whole batch is admitted.
        thread::sleep(Duration::from_millis(100));
        let stalled = pipeline.stats();
        assert_eq!(stalled.results_emitted, 2, "sink holds exactly its depth");
        assert!(
            stalled.samples_admitted < 32,
            "admission must stall, got {}",
            stalled.samples_admitted
        );

        // Resume draining: every sample comes out, none dropped.
        let results = pipeline.results();
        for _ in 0..32 {
            results
                .recv_timeout(RECV_TIMEOUT)
                .unwrap()
                .expect("a stalled sample never arrived");
        }
        wait_for(|| pipeline.stats().samples_admitted == 32);
        assert_eq!(pipeline.stats().results_emitted, 32);

        pipeline.shutdown().unwrap();
    }

    #[test]
    fn unknown_opcode_forwards_nothing() {
        let pipeline = Pipeline::spawn(PipelineConfig::default()).unwrap();

        pipeline.submit(Operation { mode: 7, num: 5 }).unwrap();
        pipeline.submit(Operation::weight_init(1)).unwrap();
        pipeline
            .push_table_write(network_write(0, 0, 1.0, true))
            .unwrap();

        wait_for(|| pipeline.stats().writes_to_network == 1);
        let snap = pipeline.stats();
        assert_eq!(snap.ops_ignored, 1);
        assert_eq!(snap.writes_admitted, 1);
        assert_eq!(snap.writes_to_encoder, 0);

        pipeline.shutdown().unwrap();
    }

    #[test]
    fn shutdown_unblocks_a_starved_operation() {
        let pipeline = Pipeline::spawn(PipelineConfig::default()).unwrap();
        // An admitted operation waiting on records that never arrive must
        // not wedge shutdown.
        pipeline.submit(Operation::weight_init(10)).unwrap();
        pipeline.shutdown().unwrap();
    }
}
