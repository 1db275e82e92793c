//! Wire records, stage dimensions, configuration, and shared counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of projection rows in the encoder table.
pub const FREQ_DIM: usize = 128;
/// Width of the feature vector handed to the network (sin and cos halves).
pub const FEATURE_DIM: usize = 2 * FREQ_DIM;
/// Width of the network hidden layer.
pub const HIDDEN_DIM: usize = 256;
/// Network output width: three color channels plus density.
pub const OUT_DIM: usize = 4;

/// One sample position along a ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Marks the last sample of a batch. Informational only: the control
    /// core forwards it untouched and never gates on it.
    pub is_last: bool,
}

/// One cell update for a stage-internal table.
///
/// `for_encoder` selects the routing destination; `for_hidden` is only
/// meaningful on the network path, where it picks the hidden-layer table
/// over the output-layer table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableWrite {
    pub row: u16,
    pub col: u16,
    pub value: f32,
    pub for_encoder: bool,
    pub for_hidden: bool,
}

/// Expanded feature vector, width [`FEATURE_DIM`]. Lives only on the
/// encoder-to-network link.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(pub Box<[f32]>);

/// Raw network output: color plus density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkOutput {
    pub color: [f32; 3],
    pub density: f32,
}

/// Compositor input record, as repacked by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeInput {
    pub emitted: [f32; 3],
    pub density: f32,
    /// Ray step size used for the opacity weighting.
    pub step: f32,
}

/// Final composited color for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalColor {
    pub c: [f32; 3],
}

/// An externally-submitted instruction for the sequencer.
///
/// The mode stays a raw opcode byte on the wire; an unrecognized value is
/// consumed as a no-op rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub mode: u8,
    pub num: u32,
}

impl Operation {
    /// Forward `num` table writes from the external load stream toward the
    /// router.
    pub const WEIGHT_INIT: u8 = 0;
    /// Forward `num` position samples from the external position stream into
    /// the encoder.
    pub const READ_POS: u8 = 1;

    pub fn weight_init(num: u32) -> Self {
        Self {
            mode: Self::WEIGHT_INIT,
            num,
        }
    }

    pub fn read_pos(num: u32) -> Self {
        Self {
            mode: Self::READ_POS,
            num,
        }
    }
}

/// Bounded-link depths for the pipeline fabric.
///
/// Depths are throughput tunables, not correctness parameters: any depth of
/// at least one preserves ordering and the no-loss guarantees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Depth of the operation inbox.
    pub op_depth: usize,
    /// Depth of the external position inbox.
    pub position_depth: usize,
    /// Depth of the external table-write inbox.
    pub load_depth: usize,
    /// Depth of the sequencer-to-router staging buffer.
    pub staging_depth: usize,
    /// Depth of the encoder-to-network feature buffer.
    pub feature_depth: usize,
    /// Depth of the result sink buffer.
    pub sink_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            op_depth: 4,
            position_depth: 192,
            load_depth: 1024,
            staging_depth: 16,
            feature_depth: 8,
            sink_depth: 16,
        }
    }
}

/// Shared counters updated by the pipeline activities.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Operations run to completion by the sequencer.
    pub ops_executed: AtomicU64,
    /// Operations consumed as unknown-opcode no-ops.
    pub ops_ignored: AtomicU64,
    /// Table writes the sequencer forwarded toward the router.
    pub writes_admitted: AtomicU64,
    /// Table writes the router delivered to the encoder.
    pub writes_to_encoder: AtomicU64,
    /// Table writes the router delivered to the network.
    pub writes_to_network: AtomicU64,
    /// Position samples the sequencer forwarded into the encoder.
    pub samples_admitted: AtomicU64,
    /// Network outputs repacked by the relay.
    pub outputs_relayed: AtomicU64,
    /// Final colors the compositor pushed into the sink.
    pub results_emitted: AtomicU64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ops_executed: self.ops_executed.load(Ordering::Relaxed),
            ops_ignored: self.ops_ignored.load(Ordering::Relaxed),
            writes_admitted: self.writes_admitted.load(Ordering::Relaxed),
            writes_to_encoder: self.writes_to_encoder.load(Ordering::Relaxed),
            writes_to_network: self.writes_to_network.load(Ordering::Relaxed),
            samples_admitted: self.samples_admitted.load(Ordering::Relaxed),
            outputs_relayed: self.outputs_relayed.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ops_executed: u64,
    pub ops_ignored: u64,
    pub writes_admitted: u64,
    pub writes_to_encoder: u64,
    pub writes_to_network: u64,
    pub samples_admitted: u64,
    pub outputs_relayed: u64,
    pub results_emitted: u64,
}
