//! Output surface port.
//!
//! [`OutputSink`] stands in for the editor's output channel: spawned
//! process output and classified telemetry records are appended here.
//! Implementations must be thread-safe; `append` is called from reader
//! tasks.

use std::collections::VecDeque;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Maximum number of appended chunks kept by [`BufferSink`].
const MAX_CHUNKS: usize = 5000;

/// Destination for streamed output lines.
pub trait OutputSink: Send + Sync {
    /// Append a chunk of text (chunks carry their own trailing newlines).
    fn append(&self, text: &str);

    /// Clear the surface.
    fn clear(&self);

    /// Bring the surface to the foreground. No-op by default.
    fn show(&self) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl OutputSink for NoopSink {
    fn append(&self, _text: &str) {}
    fn clear(&self) {}
}

/// In-memory sink: a capped ring buffer of chunks with broadcast fan-out
/// for live subscribers.
#[derive(Debug)]
pub struct BufferSink {
    chunks: RwLock<VecDeque<String>>,
    tx: broadcast::Sender<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self {
            chunks: RwLock::new(VecDeque::with_capacity(64)),
            tx,
        }
    }

    /// Everything currently buffered, concatenated.
    pub fn contents(&self) -> String {
        self.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicked appender leaves the buffer intact; recover from poison.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, VecDeque<String>> {
        self.chunks
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, VecDeque<String>> {
        self.chunks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Subscribe to chunks appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for BufferSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for BufferSink {
    fn append(&self, text: &str) {
        {
            let mut chunks = self.write();
            if chunks.len() >= MAX_CHUNKS {
                chunks.pop_front();
            }
            chunks.push_back(text.to_string());
        }
        // Ignore send errors: no live subscribers is fine
        let _ = self.tx.send(text.to_string());
    }

    fn clear(&self) {
        self.write().clear();
    }
}
