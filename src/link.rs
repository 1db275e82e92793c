//! Point-to-point link primitives for the pipeline fabric.
//!
//! Two link flavors connect the pipeline's activities:
//!
//! - [`bounded`]: a capacity-limited FIFO. `send` blocks while the link is
//!   full, `recv` blocks while it is empty, `try_recv` never blocks. Used
//!   wherever producer and consumer run at independent paces.
//! - [`rendezvous`]: a zero-capacity link. `send` completes only once the
//!   peer is at `recv`, so a transfer couples the two activities for that
//!   step. Used for the direct hand-offs between adjacent activities.
//!
//! Every link is single-purpose wiring between exactly one producing and one
//! consuming activity. Disconnection is not a fault: when the far end of a
//! link is dropped, pending operations return [`Disconnected`] and the owning
//! activity winds down. That cascade is the pipeline's shutdown mechanism.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use thiserror::Error;

/// The peer end of the link has been dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("link disconnected")]
pub struct Disconnected;

/// Sending half of a link.
pub struct LinkSender<T>(Sender<T>);

/// Receiving half of a link.
pub struct LinkReceiver<T>(Receiver<T>);

impl<T> Clone for LinkSender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Clone for LinkReceiver<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Creates a bounded FIFO link. `capacity` must be at least 1.
pub fn bounded<T>(capacity: usize) -> (LinkSender<T>, LinkReceiver<T>) {
    assert!(capacity >= 1, "bounded link capacity must be at least 1");
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (LinkSender(tx), LinkReceiver(rx))
}

/// Creates a zero-capacity rendezvous link.
pub fn rendezvous<T>() -> (LinkSender<T>, LinkReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (LinkSender(tx), LinkReceiver(rx))
}

impl<T> LinkSender<T> {
    /// Sends one item, blocking while the link is full.
    pub fn send(&self, value: T) -> Result<(), Disconnected> {
        self.0.send(value).map_err(|_| Disconnected)
    }
}

impl<T> LinkReceiver<T> {
    /// Receives one item, blocking while the link is empty.
    pub fn recv(&self) -> Result<T, Disconnected> {
        self.0.recv().map_err(|_| Disconnected)
    }

    /// Non-blocking receive. `Ok(None)` means the link is currently empty,
    /// which is the normal idle outcome, not an error.
    pub fn try_recv(&self) -> Result<Option<T>, Disconnected> {
        match self.0.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Disconnected),
        }
    }

    /// Receive with a bounded wait. `Ok(None)` means the timeout elapsed
    /// with the link still empty.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<Option<T>, Disconnected> {
        match self.0.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(None),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(Disconnected),
        }
    }

    /// Number of items currently buffered in the link.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw channel handle, for multi-source waits inside the crate.
    pub(crate) fn raw(&self) -> &Receiver<T> {
        &self.0
    }
}
