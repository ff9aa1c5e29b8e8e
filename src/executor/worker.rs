//! Stream workers and the shared per-phase slot array
//!
//! Each worker owns exactly one slot for the lifetime of a phase and is the
//! only writer of its byte counter. Everybody else reads relaxed snapshots.
//! A worker never returns an error: transfer failures end the worker and are
//! recorded in its slot, partial bytes stay counted.
//! Every await a worker makes is raced against the session's [`CancelSignal`].

use crate::client::Transport;
use crate::error::AppError;
use crate::models::metrics::StreamReport;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Session-wide stop request
///
/// Cloned into every loop of a session. `cancelled()` resolves as soon as
/// `cancel()` has been called, including calls made before it was awaited.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Wait until the signal fires
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender outlives the receiver, so the wait cannot fail
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Live state of one transfer stream
#[derive(Debug, Default)]
pub struct StreamSlot {
    bytes: AtomicU64,
    active: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl StreamSlot {
    /// Bytes transferred so far
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn add_bytes(&self, count: u64) {
        self.bytes.fetch_add(count, Ordering::Relaxed);
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    fn record_error(&self, error: &AppError) {
        let mut last_error = self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last_error = Some(error.to_string());
    }
}

/// Fixed-length slot array for one phase
///
/// A fresh array is created for every phase so counters never leak between
/// download and upload.
#[derive(Debug)]
pub struct StreamSlots {
    slots: Vec<StreamSlot>,
}

impl StreamSlots {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| StreamSlot::default()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamSlot> {
        self.slots.get(index)
    }

    /// Sum of all slot counters at this instant
    pub fn total_bytes(&self) -> u64 {
        self.slots.iter().map(StreamSlot::bytes).sum()
    }

    /// Streams still transferring
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    /// Final per-stream state, in slot order
    pub fn reports(&self) -> Vec<StreamReport> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| StreamReport {
                index,
                bytes: slot.bytes(),
                error: slot.last_error(),
            })
            .collect()
    }
}

/// One concurrently running transfer bound to a slot
pub struct StreamWorker {
    index: usize,
    transport: Arc<dyn Transport>,
    slots: Arc<StreamSlots>,
    cancel: CancelSignal,
}

impl StreamWorker {
    pub fn new(
        index: usize,
        transport: Arc<dyn Transport>,
        slots: Arc<StreamSlots>,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            index,
            transport,
            slots,
            cancel,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Read one streamed download into the slot counter
    ///
    /// Stops at end of stream, on the first error, or as soon as the session
    /// is cancelled, even while waiting on a stalled read. Returns the bytes
    /// counted.
    pub async fn run_download(self, byte_count: u64) -> u64 {
        let Some(slot) = self.slots.get(self.index) else {
            return 0;
        };
        slot.set_active(true);

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            opened = self.transport.open_download(byte_count) => Some(opened),
        };

        match opened {
            Some(Ok(mut chunks)) => loop {
                let chunk = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    chunk = chunks.next() => chunk,
                };
                match chunk {
                    Some(Ok(chunk)) => slot.add_bytes(chunk.len() as u64),
                    Some(Err(error)) => {
                        slot.record_error(&error);
                        break;
                    }
                    None => break,
                }
            },
            Some(Err(error)) => slot.record_error(&error),
            None => {}
        }

        slot.set_active(false);
        slot.bytes()
    }

    /// Send fixed-size chunks while `keep_going` is set
    ///
    /// The flag is only checked between chunks, so a chunk in flight when the
    /// flag clears still completes and counts. Cancellation abandons the chunk
    /// in flight without counting it. A failed chunk ends the worker.
    pub async fn run_upload(self, payload: Bytes, keep_going: Arc<AtomicBool>) -> u64 {
        let Some(slot) = self.slots.get(self.index) else {
            return 0;
        };
        slot.set_active(true);

        while keep_going.load(Ordering::Relaxed) && !self.cancel.is_cancelled() {
            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                sent = self.transport.send_upload_chunk(payload.clone()) => sent,
            };
            match sent {
                Ok(()) => slot.add_bytes(payload.len() as u64),
                Err(error) => {
                    slot.record_error(&error);
                    break;
                }
            }
        }

        slot.set_active(false);
        slot.bytes()
    }
}

/// Deterministic upload chunk shared by all upload workers
///
/// The first 1024 bytes cycle through `0..255`; the rest repeats that block.
pub fn build_upload_payload(size: usize) -> Bytes {
    const SEED_LEN: usize = 1024;
    let mut payload = vec![0u8; size];
    for (i, byte) in payload.iter_mut().take(SEED_LEN).enumerate() {
        *byte = (i % 255) as u8;
    }
    let mut filled = size.min(SEED_LEN);
    while filled < size {
        let copy = filled.min(size - filled);
        payload.copy_within(0..copy, filled);
        filled += copy;
    }
    Bytes::from(payload)
}
