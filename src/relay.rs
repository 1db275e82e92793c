//! Result relay: repacks the network's raw output into the compositor's
//! input shape.
//!
//! One record in, one record out, order preserved. The relay is the single
//! piece of glue between the two stages: the three color components are
//! copied positionally, the fourth value becomes the density, and the ray
//! step size is injected here.

use crate::link::{LinkReceiver, LinkSender};
use crate::types::{CompositeInput, NetworkOutput, PipelineStats};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Ray step size injected into every compositor record.
// TODO: derive the step from sample spacing once the position stream
// carries it; a fixed step is only correct for uniformly spaced samples.
pub const STEP_SIZE: f32 = 0.1;

pub struct Relay {
    pub inbound: LinkReceiver<NetworkOutput>,
    pub outbound: LinkSender<CompositeInput>,
    pub stats: Arc<PipelineStats>,
}

impl Relay {
    /// Runs until the network output link disconnects.
    pub fn run(self) {
        while let Ok(output) = self.inbound.recv() {
            let record = CompositeInput {
                emitted: output.color,
                density: output.density,
                step: STEP_SIZE,
            };
            if self.outbound.send(record).is_err() {
                return;
            }
            self.stats.outputs_relayed.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!("relay: network output stream closed, winding down");
    }
}
