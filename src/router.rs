//! Memory-request router: fans the staged table-write stream out to the
//! stage that owns the targeted table.
//!
//! Routing inspects a single tag. `for_encoder` selects the encoder path;
//! everything else, including records with no recognized destination, takes
//! the network path. When both outbound links are full the blocking send
//! stalls the router, which in turn stops it draining the staging buffer —
//! backpressure propagates upstream with no record dropped.

use crate::link::{LinkReceiver, LinkSender};
use crate::types::{PipelineStats, TableWrite};
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub struct Router {
    pub inbound: LinkReceiver<TableWrite>,
    pub encoder: LinkSender<TableWrite>,
    pub network: LinkSender<TableWrite>,
    pub stats: Arc<PipelineStats>,
}

impl Router {
    /// Runs until the staging buffer disconnects.
    pub fn run(self) {
        while let Ok(write) = self.inbound.recv() {
            log::trace!(
                "routing table write ({}, {}) to the {}",
                write.row,
                write.col,
                if write.for_encoder { "encoder" } else { "network" }
            );
            let (target, delivered) = if write.for_encoder {
                (&self.encoder, &self.stats.writes_to_encoder)
            } else {
                (&self.network, &self.stats.writes_to_network)
            };
            if target.send(write).is_err() {
                return;
            }
            delivered.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!("router: staging buffer closed, winding down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link;
    use std::thread;

    fn write(row: u16, for_encoder: bool) -> TableWrite {
        TableWrite {
            row,
            col: 0,
            value: 0.5,
            for_encoder,
            for_hidden: false,
        }
    }

    #[test]
    fn routes_each_record_exactly_once_preserving_order() {
        let (in_tx, in_rx) = link::bounded(16);
        let (enc_tx, enc_rx) = link::bounded(16);
        let (net_tx, net_rx) = link::bounded(16);
        let stats = Arc::new(PipelineStats::default());

        let router = Router {
            inbound: in_rx,
            encoder: enc_tx,
            network: net_tx,
            stats: stats.clone(),
        };
        let handle = thread::spawn(move || router.run());

        // Interleaved destinations; order must hold within each path.
        for (row, to_encoder) in [(0, true), (1, false), (2, true), (3, false)] {
            in_tx.send(write(row, to_encoder)).unwrap();
        }
        drop(in_tx);
        handle.join().unwrap();

        assert_eq!(enc_rx.recv().unwrap().row, 0);
        assert_eq!(enc_rx.recv().unwrap().row, 2);
        assert_eq!(net_rx.recv().unwrap().row, 1);
        assert_eq!(net_rx.recv().unwrap().row, 3);
        assert!(matches!(enc_rx.try_recv(), Ok(None) | Err(_)), "no duplicate on the encoder path");
        assert!(matches!(net_rx.try_recv(), Ok(None) | Err(_)), "no duplicate on the network path");

        let snap = stats.snapshot();
        assert_eq!(snap.writes_to_encoder, 2);
        assert_eq!(snap.writes_to_network, 2);
    }

    #[test]
    fn untagged_records_default_to_the_network_path() {
        let (in_tx, in_rx) = link::bounded(4);
        let (enc_tx, _enc_rx) = link::bounded(4);
        let (net_tx, net_rx) = link::bounded(4);

        let router = Router {
            inbound: in_rx,
            encoder: enc_tx,
            network: net_tx,
            stats: Arc::new(PipelineStats::default()),
        };
        let handle = thread::spawn(move || router.run());

        in_tx
            .send(TableWrite {
                row: 7,
                col: 7,
                value: 1.0,
                for_encoder: false,
                for_hidden: false,
            })
            .unwrap();
        drop(in_tx);
        handle.join().unwrap();

        assert_eq!(net_rx.recv().unwrap().row, 7);
    }
}
