//! Background persistence thread
//!
//! Runs the rebalance-and-flush cycle on a fixed tick until told to stop.
//! A failed cycle is logged and retried on the next tick; in-memory state
//! stays correct while persistence lags.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, Sender};

use crate::error::Result;

use super::manager::PoolInner;

/// Handle to the running persistence thread
pub(crate) struct Persister {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Persister {
    /// Start the thread; the first cycle runs one `interval` from now
    pub(crate) fn spawn(inner: Arc<PoolInner>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded(1);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("objpool-persist".to_string())
            .spawn(move || run(inner, ticker, stop_rx))?;

        Ok(Self { stop_tx, handle })
    }

    /// Signal the thread and wait for it; a cycle in progress completes first
    pub(crate) fn stop(self) {
        // A full channel or a gone receiver both mean the thread is already stopping
        let _ = self.stop_tx.try_send(());

        if self.handle.join().is_err() {
            tracing::error!("Persistence thread panicked");
        }
    }
}

fn run(inner: Arc<PoolInner>, ticker: Receiver<std::time::Instant>, stop_rx: Receiver<()>) {
    tracing::debug!("Persistence thread started");

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => match inner.persist() {
                Ok(stats) => tracing::debug!(
                    drained = stats.drained,
                    borrowed = stats.borrowed,
                    written = stats.written,
                    "Periodic flush complete"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Periodic flush failed, retrying next cycle"
                ),
            },
        }
    }

    tracing::debug!("Persistence thread stopped");
}
