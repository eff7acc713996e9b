//! The response sink abstraction.
//!
//! The sink is the ultimate external destination of a render, typically an
//! HTTP response. The engine never constructs one; it consumes the narrow
//! surface defined by [`ResponseSink`]: realize a raw writer, probe the
//! committed state, and accept a content length before commitment.
//!
//! Realizing the raw writer finalizes response state on most servers, so
//! the engine reaches for it as late as possible: [`SinkWriter`] defers the
//! first [`ResponseSink::writer`] call until content physically moves.

pub mod memory;

pub use memory::MemorySink;

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::target::OutputTarget;

/// Shared handle to a response sink.
pub type SinkHandle = Rc<RefCell<dyn ResponseSink>>;

/// The external destination a render is eventually written to.
pub trait ResponseSink {
    /// Realizes the raw writer.
    ///
    /// The first call may finalize response state, so callers defer it
    /// until bytes actually have to move.
    ///
    /// # Errors
    /// Returns an error if the writer cannot be realized.
    fn writer(&mut self) -> io::Result<&mut dyn Write>;

    /// Whether the response has started going out. Once committed, length
    /// metadata can no longer be set.
    fn is_committed(&self) -> bool;

    /// Reports the total body length. Only meaningful before commitment.
    fn set_content_length(&mut self, len: u64);

    /// Whether this sink buffers on its own, making engine-side buffering
    /// redundant.
    fn is_buffering_aware(&self) -> bool {
        false
    }
}

/// Writer stage that lazily realizes the sink's raw writer.
pub struct SinkWriter {
    sink: SinkHandle,
}

impl std::fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkWriter").finish_non_exhaustive()
    }
}

impl SinkWriter {
    /// Creates a stage over the given sink.
    #[must_use]
    pub fn new(sink: SinkHandle) -> Self {
        Self { sink }
    }
}

impl OutputTarget for SinkWriter {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let mut sink = self.sink.borrow_mut();
        sink.writer()?.write_all(s.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sink = self.sink.borrow_mut();
        sink.writer()?.flush()
    }
}
