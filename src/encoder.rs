//! Feature encoder stage: sinusoidal expansion of sample positions.
//!
//! The encoder owns a `FREQ_DIM x 3` projection table, written through its
//! configuration port. A sample `p` is projected to `t = table * p` and
//! expanded to `[sin(pi*t), cos(pi*t)]`, giving a feature vector of width
//! [`FEATURE_DIM`].

use crate::link::{LinkReceiver, LinkSender};
use crate::types::{FeatureVector, PositionSample, TableWrite, FEATURE_DIM, FREQ_DIM};
use crossbeam_channel::Select;
use std::f32::consts::PI;

pub struct Encoder {
    table: Vec<[f32; 3]>,
    loads: LinkReceiver<TableWrite>,
    input: LinkReceiver<PositionSample>,
    output: LinkSender<FeatureVector>,
}

enum Event {
    Load(Option<TableWrite>),
    Sample(Option<PositionSample>),
}

impl Encoder {
    pub fn new(
        loads: LinkReceiver<TableWrite>,
        input: LinkReceiver<PositionSample>,
        output: LinkSender<FeatureVector>,
    ) -> Self {
        Self {
            table: vec![[0.0; 3]; FREQ_DIM],
            loads,
            input,
            output,
        }
    }

    /// Applies one routed table write to the projection table.
    pub(crate) fn apply(&mut self, write: TableWrite) {
        let (row, col) = (write.row as usize, write.col as usize);
        if row >= FREQ_DIM || col >= 3 {
            log::warn!("encoder: table write out of range ({row}, {col})");
            return;
        }
        self.table[row][col] = write.value;
    }

    /// Expands one sample into its sinusoidal feature vector.
    pub fn expand(&self, sample: &PositionSample) -> FeatureVector {
        let mut features = vec![0.0f32; FEATURE_DIM];
        for (i, row) in self.table.iter().enumerate() {
            let t = row[0] * sample.x + row[1] * sample.y + row[2] * sample.z;
            let phase = PI * t;
            features[i] = phase.sin();
            features[FREQ_DIM + i] = phase.cos();
        }
        FeatureVector(features.into_boxed_slice())
    }

    /// Runs until the sample input disconnects. The configuration port may
    /// close earlier (once the bulk load is done) without ending the stage.
    pub fn run(mut self) {
        let mut loads_open = true;
        loop {
            // Apply every write already routed before touching the data
            // stream, so a waiting sample never overtakes a waiting write.
            while loads_open {
                match self.loads.try_recv() {
                    Ok(Some(write)) => self.apply(write),
                    Ok(None) => break,
                    Err(_) => loads_open = false,
                }
            }

            let event = {
                let mut sel = Select::new();
                let load_idx = if loads_open {
                    Some(sel.recv(self.loads.raw()))
                } else {
                    None
                };
                let sample_idx = sel.recv(self.input.raw());
                let oper = sel.select();
                if Some(oper.index()) == load_idx {
                    Event::Load(oper.recv(self.loads.raw()).ok())
                } else {
                    debug_assert_eq!(oper.index(), sample_idx);
                    Event::Sample(oper.recv(self.input.raw()).ok())
                }
            };

            match event {
                Event::Load(Some(write)) => self.apply(write),
                Event::Load(None) => loads_open = false,
                Event::Sample(Some(sample)) => {
                    let features = self.expand(&sample);
                    if sample.is_last {
                        log::debug!("encoder: batch boundary");
                    }
                    if self.output.send(features).is_err() {
                        return;
                    }
                }
                Event::Sample(None) => {
                    log::debug!("encoder: sample stream closed, winding down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link;

    fn test_encoder() -> Encoder {
        let (_load_tx, load_rx) = link::bounded(1);
        let (_in_tx, in_rx) = link::bounded(1);
        let (out_tx, _out_rx) = link::bounded(1);
        Encoder::new(load_rx, in_rx, out_tx)
    }

    #[test]
    fn zero_table_expands_to_the_constant_vector() {
        let encoder = test_encoder();
        let features = encoder.expand(&PositionSample {
            x: 1.0,
            y: 2.0,
            z: 3.0,
            is_last: false,
        });
        assert_eq!(features.0.len(), FEATURE_DIM);
        // sin(0) on the first half, cos(0) on the second.
        assert!(features.0[..FREQ_DIM].iter().all(|&v| v == 0.0));
        assert!(features.0[FREQ_DIM..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn table_writes_select_the_projected_coordinate() {
        let mut encoder = test_encoder();
        encoder.apply(TableWrite {
            row: 2,
            col: 1,
            value: 0.5,
            for_encoder: true,
            for_hidden: false,
        });

        let features = encoder.expand(&PositionSample {
            x: 9.0,
            y: 1.0,
            z: 9.0,
            is_last: false,
        });
        let phase = PI * 0.5;
        assert_eq!(features.0[2], phase.sin());
        assert_eq!(features.0[FREQ_DIM + 2], phase.cos());
        // Untouched rows still project to zero.
        assert_eq!(features.0[3], 0.0);
    }

    #[test]
    fn out_of_range_write_is_dropped() {
        let mut encoder = test_encoder();
        encoder.apply(TableWrite {
            row: FREQ_DIM as u16,
            col: 0,
            value: 7.0,
            for_encoder: true,
            for_hidden: false,
        });
        let features = encoder.expand(&PositionSample {
            x: 1.0,
            y: 0.0,
            z: 0.0,
            is_last: false,
        });
        assert!(features.0[..FREQ_DIM].iter().all(|&v| v == 0.0));
    }
}
