//! Network evaluator stage: a two-layer feed-forward map from features to
//! color and density.
//!
//! Two tables arrive through the configuration port: `for_hidden` writes
//! land in the `HIDDEN_DIM x FEATURE_DIM` hidden layer, the rest in the
//! `OUT_DIM x HIDDEN_DIM` output layer. Evaluation is
//! `out = W_out * relu(W_hidden * features)`; the first three outputs are
//! the color channels, the fourth is the density.

use crate::link::{LinkReceiver, LinkSender};
use crate::types::{FeatureVector, NetworkOutput, TableWrite, FEATURE_DIM, HIDDEN_DIM, OUT_DIM};
use crossbeam_channel::Select;

pub struct Network {
    hidden: Vec<f32>,
    output_layer: Vec<f32>,
    loads: LinkReceiver<TableWrite>,
    input: LinkReceiver<FeatureVector>,
    output: LinkSender<NetworkOutput>,
}

enum Event {
    Load(Option<TableWrite>),
    Features(Option<FeatureVector>),
}

impl Network {
    pub fn new(
        loads: LinkReceiver<TableWrite>,
        input: LinkReceiver<FeatureVector>,
        output: LinkSender<NetworkOutput>,
    ) -> Self {
        Self {
            hidden: vec![0.0; HIDDEN_DIM * FEATURE_DIM],
            output_layer: vec![0.0; OUT_DIM * HIDDEN_DIM],
            loads,
            input,
            output,
        }
    }

    /// Applies one routed table write to the layer it targets.
    pub(crate) fn apply(&mut self, write: TableWrite) {
        let (row, col) = (write.row as usize, write.col as usize);
        if write.for_hidden {
            if row >= HIDDEN_DIM || col >= FEATURE_DIM {
                log::warn!("network: hidden-layer write out of range ({row}, {col})");
                return;
            }
            self.hidden[row * FEATURE_DIM + col] = write.value;
        } else {
            if row >= OUT_DIM || col >= HIDDEN_DIM {
                log::warn!("network: output-layer write out of range ({row}, {col})");
                return;
            }
            self.output_layer[row * HIDDEN_DIM + col] = write.value;
        }
    }

    /// Evaluates one feature vector.
    pub fn evaluate(&self, features: &FeatureVector) -> NetworkOutput {
        let mut activations = vec![0.0f32; HIDDEN_DIM];
        for (i, activation) in activations.iter_mut().enumerate() {
            let row = &self.hidden[i * FEATURE_DIM..(i + 1) * FEATURE_DIM];
            let mut sum = 0.0;
            for (w, x) in row.iter().zip(features.0.iter()) {
                sum += w * x;
            }
            *activation = sum.max(0.0);
        }

        let mut out = [0.0f32; OUT_DIM];
        for (i, value) in out.iter_mut().enumerate() {
            let row = &self.output_layer[i * HIDDEN_DIM..(i + 1) * HIDDEN_DIM];
            let mut sum = 0.0;
            for (w, a) in row.iter().zip(activations.iter()) {
                sum += w * a;
            }
            *value = sum;
        }

        NetworkOutput {
            color: [out[0], out[1], out[2]],
            density: out[3],
        }
    }

    /// Runs until the feature input disconnects.
    pub fn run(mut self) {
        let mut loads_open = true;
        loop {
            // Pending table writes take precedence over waiting features.
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
                let features_idx = sel.recv(self.input.raw());
                let oper = sel.select();
                if Some(oper.index()) == load_idx {
                    Event::Load(oper.recv(self.loads.raw()).ok())
                } else {
                    debug_assert_eq!(oper.index(), features_idx);
                    Event::Features(oper.recv(self.input.raw()).ok())
                }
            };

            match event {
                Event::Load(Some(write)) => self.apply(write),
                Event::Load(None) => loads_open = false,
                Event::Features(Some(features)) => {
                    let output = self.evaluate(&features);
                    if self.output.send(output).is_err() {
                        return;
                    }
                }
                Event::Features(None) => {
                    log::debug!("network: feature stream closed, winding down");
                    return;
                }
            }
        }
    }
}
