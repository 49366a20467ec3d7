//! Background delivery of eviction notifications
//!
//! Evicted entries are handed to a dedicated worker thread through a
//! bounded channel so listeners never run under the cache lock. Queuing
//! never blocks the evicting caller: when the channel is full the
//! notification is dropped and counted. A flush marker sent down the same
//! channel lets callers wait until everything queued ahead of it has been
//! delivered.

use crate::error::{CacheError, CacheResult};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// Callback invoked with every evicted entry: `(key, value, cost)`.
///
/// Runs on the notification worker. A listener slower than the eviction
/// rate loses notifications once `buffer_items` are queued.
pub type EvictionListener<K, V> = Arc<dyn Fn(&K, &V, i64) + Send + Sync>;

pub(crate) enum Notice<K, V> {
    Evicted { key: K, value: V, cost: i64 },
    Flush(Sender<()>),
}

pub(crate) struct Notifier<K, V> {
    sender: Mutex<Option<Sender<Notice<K, V>>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    worker: ThreadId,
    has_listener: bool,
}

impl<K, V> Notifier<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    pub(crate) fn start(
        buffer_items: usize,
        listener: Option<EvictionListener<K, V>>,
    ) -> CacheResult<Self> {
        let (tx, rx) = bounded(buffer_items);
        let has_listener = listener.is_some();
        let handle = thread::Builder::new()
            .name("kached-cache-notify".into())
            .spawn(move || run(&rx, listener.as_ref()))?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
            has_listener,
        })
    }
}

impl<K, V> Notifier<K, V> {
    /// Queue evicted entries for delivery without blocking.
    ///
    /// Returns how many notifications were dropped.
    pub(crate) fn evicted(&self, entries: Vec<(K, V, i64)>) -> usize {
        if !self.has_listener || entries.is_empty() {
            return 0;
        }
        let total = entries.len();
        let Some(tx) = self.sender.lock().clone() else {
            return total;
        };

        let mut dropped = 0;
        for (queued, (key, value, cost)) in entries.into_iter().enumerate() {
            match tx.try_send(Notice::Evicted { key, value, cost }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => dropped += 1,
                Err(TrySendError::Disconnected(_)) => {
                    warn!("Eviction notification dropped: worker stopped");
                    dropped += total - queued;
                    break;
                }
            }
        }
        if dropped > 0 {
            debug!("Dropped {} eviction notifications: listener is behind", dropped);
        }
        dropped
    }

    /// Block until all notifications queued before this call are delivered.
    ///
    /// Returns immediately when called from a listener, since the worker
    /// cannot acknowledge a marker queued behind the notice it is handling.
    pub(crate) fn flush(&self) {
        if self.on_worker() {
            debug!("Flush from the notification worker ignored");
            return;
        }
        let Some(tx) = self.sender.lock().clone() else {
            return;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx.send(Notice::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Close the channel and join the worker once it has drained
    pub(crate) fn shutdown(&self) -> CacheResult<()> {
        drop(self.sender.lock().take());
        if self.on_worker() {
            // The worker exits on its own once the channel is empty
            drop(self.handle.lock().take());
            return Ok(());
        }
        match self.handle.lock().take() {
            Some(handle) => handle.join().map_err(|_| CacheError::WorkerPanicked),
            None => Ok(()),
        }
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker
    }
}

impl<K, V> Drop for Notifier<K, V> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Eviction notification worker failed: {}", e);
        }
    }
}

fn run<K, V>(rx: &Receiver<Notice<K, V>>, listener: Option<&EvictionListener<K, V>>) {
    debug!("Eviction notification worker started");
    for notice in rx {
        match notice {
            Notice::Evicted { key, value, cost } => {
                if let Some(listener) = listener {
                    listener(&key, &value, cost);
                }
            }
            Notice::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Eviction notification worker stopped");
}
