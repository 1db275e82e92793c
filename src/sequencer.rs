//! Configuration sequencer: the gate through which all external input
//! enters the pipeline.
//!
//! The sequencer idles on the operation stream. Each accepted operation is
//! run to completion before the next one is considered, so two operations
//! queued back to back execute strictly in arrival order:
//!
//! - `WEIGHT_INIT`: moves `num` table writes from the external load stream
//!   into the router's staging buffer.
//! - `READ_POS`: moves `num` position samples from the external position
//!   stream into the encoder.
//!
//! Both moves use blocking receives and blocking sends, so the sequencer
//! never forwards record k+1 of an operation before record k has been
//! accepted downstream, and an operation whose count exceeds what the
//! external feeder has staged simply waits for the remainder. An operation
//! with an unrecognized opcode is consumed and forwards nothing.

use crate::link::{LinkReceiver, LinkSender};
use crate::types::{Operation, PipelineStats, PositionSample, TableWrite};
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub struct Sequencer {
    pub ops: LinkReceiver<Operation>,
    pub loads: LinkReceiver<TableWrite>,
    pub positions: LinkReceiver<PositionSample>,
    pub router: LinkSender<TableWrite>,
    pub encoder: LinkSender<PositionSample>,
    pub stats: Arc<PipelineStats>,
}

impl Sequencer {
    /// Runs until the operation stream disconnects. A disconnect of the
    /// external load or position stream mid-operation also winds the
    /// sequencer down, since the remaining records can never arrive.
    pub fn run(self) {
        while let Ok(op) = self.ops.recv() {
            match op.mode {
                Operation::WEIGHT_INIT => {
                    log::debug!("weight init: staging {} table writes", op.num);
                    for staged in 0..op.num {
                        let Ok(write) = self.loads.recv() else {
                            log::warn!(
                                "load stream closed {staged}/{} records into a weight init",
                                op.num
                            );
                            return;
                        };
                        if self.router.send(write).is_err() {
                            return;
                        }
                        self.stats.writes_admitted.fetch_add(1, Ordering::Relaxed);
                    }
                    self.stats.ops_executed.fetch_add(1, Ordering::Relaxed);
                }
                Operation::READ_POS => {
                    log::debug!("read pos: streaming {} samples", op.num);
                    for admitted in 0..op.num {
                        let Ok(sample) = self.positions.recv() else {
                            log::warn!(
                                "position stream closed {admitted}/{} samples into a batch",
                                op.num
                            );
                            return;
                        };
                        if self.encoder.send(sample).is_err() {
                            return;
                        }
                        self.stats.samples_admitted.fetch_add(1, Ordering::Relaxed);
                    }
                    self.stats.ops_executed.fetch_add(1, Ordering::Relaxed);
                }
                mode => {
                    // Unknown opcode: consume the record, forward nothing.
                    log::warn!("ignoring operation with unknown opcode {mode} (num = {})", op.num);
                    self.stats.ops_ignored.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        log::debug!("sequencer: operation stream closed, winding down");
    }
}
