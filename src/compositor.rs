//! Compositor stage: turns density into an alpha-weighted color
//! contribution.

use crate::link::{LinkReceiver, LinkSender};
use crate::types::{CompositeInput, FinalColor, PipelineStats};
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub struct Compositor {
    pub input: LinkReceiver<CompositeInput>,
    pub output: LinkSender<FinalColor>,
    pub stats: Arc<PipelineStats>,
}

impl Compositor {
    /// One sample's contribution: `alpha = 1 - exp(-density * step)` scales
    /// the emitted color.
    pub fn composite(record: &CompositeInput) -> FinalColor {
        let alpha = 1.0 - (-record.density * record.step).exp();
        FinalColor {
            c: [
                record.emitted[0] * alpha,
                record.emitted[1] * alpha,
                record.emitted[2] * alpha,
            ],
        }
    }

    /// Runs until the relay link disconnects.
    pub fn run(self) {
        while let Ok(record) = self.input.recv() {
            let color = Self::composite(&record);
            if self.output.send(color).is_err() {
                return;
            }
            self.stats.results_emitted.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!("compositor: input stream closed, winding down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_density_contributes_nothing() {
        let color = Compositor::composite(&CompositeInput {
            emitted: [1.0, 2.0, 3.0],
            density: 0.0,
            step: 0.1,
        });
        assert_eq!(color.c, [0.0; 3]);
    }

    #[test]
    fn contribution_saturates_with_density() {
        let record = |density| CompositeInput {
            emitted: [1.0, 1.0, 1.0],
            density,
            step: 0.1,
        };
        let thin = Compositor::composite(&record(0.5)).c[0];
        let dense = Compositor::composite(&record(500.0)).c[0];
        assert!(thin > 0.0 && thin < dense);
        assert!(dense <= 1.0, "alpha never exceeds one");
    }
}
