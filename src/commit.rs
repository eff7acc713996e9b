//! The buffered commit writer.
//!
//! This stage decouples what the renderer writes from what is physically
//! sent. Content accumulates in a growable buffer until a threshold, so
//! response metadata that depends on total size (the byte length) can be
//! committed before any bytes move, while oversized output still streams
//! in chunks. The sink's raw writer is realized lazily, on the first
//! physical flush, to avoid committing response state early.
//!
//! Lifecycle: `Open → (writes)* → Closing → Closed`. There is no reopen.
//! `close()` is re-entrant: the sticky latch plus an internal
//! already-flushed check make repeated calls flush effectively once.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::buffer::{BufferHandle, StreamBuffer};
use crate::config::EngineConfig;
use crate::counter::{BoundedByteCounter, CounterHandle};
use crate::latch::ErrorLatch;
use crate::sink::{SinkHandle, SinkWriter};
use crate::target::{self, OutputTarget, TargetHandle};

/// Shared handle to a [`BufferedCommitWriter`].
pub type CommitHandle = Rc<RefCell<BufferedCommitWriter>>;

/// Sink-facing stage with optional buffering and deferred length commit.
pub struct BufferedCommitWriter {
    out: TargetHandle,
    sink: SinkHandle,
    buffer: Option<BufferHandle>,
    counter: Option<CounterHandle>,
    latch: ErrorLatch,
    flushed: bool,
    layout_pass: bool,
}

impl std::fmt::Debug for BufferedCommitWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedCommitWriter")
            .field("out", &self.out)
            .field("buffer", &self.buffer)
            .field("counter", &self.counter)
            .field("latch", &self.latch)
            .field("flushed", &self.flushed)
            .field("layout_pass", &self.layout_pass)
            .finish_non_exhaustive()
    }
}

impl BufferedCommitWriter {
    /// Builds the stage for `sink` per the engine configuration.
    ///
    /// With buffering or length counting enabled — and a sink that does
    /// not buffer on its own — writes go into a growable buffer whose
    /// overflow target is the lazily realized sink writer, teeing into a
    /// byte counter when counting is on. Otherwise writes go straight to
    /// the sink.
    #[must_use]
    pub fn get_instance(sink: SinkHandle, config: &EngineConfig) -> CommitHandle {
        let wants_buffer = config.buffering_enabled || config.length_counting_enabled;
        let buffering_aware = sink.borrow().is_buffering_aware();

        if wants_buffer && !buffering_aware {
            let mut buffer =
                StreamBuffer::new(config.buffer_threshold_bytes, config.auto_flush_enabled);

            let counter = if config.length_counting_enabled {
                let counter = BoundedByteCounter::new(config.counter_bound()).into_handle();
                let tee: TargetHandle = counter.clone();
                buffer.connect_to(tee);
                Some(counter)
            } else {
                None
            };

            let lazy_sink: TargetHandle = target::handle(SinkWriter::new(Rc::clone(&sink)));
            buffer.connect_to(lazy_sink);

            let buffer = buffer.into_handle();
            let out: TargetHandle = buffer.clone();
            Rc::new(RefCell::new(Self {
                out,
                sink,
                buffer: Some(buffer),
                counter,
                latch: ErrorLatch::new(),
                flushed: false,
                layout_pass: false,
            }))
        } else {
            let out: TargetHandle = target::handle(SinkWriter::new(Rc::clone(&sink)));
            Rc::new(RefCell::new(Self {
                out,
                sink,
                buffer: None,
                counter: None,
                latch: ErrorLatch::new(),
                flushed: false,
                layout_pass: false,
            }))
        }
    }

    /// Builds the stage with the default configuration and an explicit
    /// buffer threshold.
    #[must_use]
    pub fn with_threshold(sink: SinkHandle, threshold_bytes: usize) -> CommitHandle {
        let config = EngineConfig {
            buffer_threshold_bytes: threshold_bytes,
            ..EngineConfig::default()
        };
        Self::get_instance(sink, &config)
    }

    /// Writes a string as character data.
    pub fn write_str(&mut self, s: &str) {
        if self.latch.is_tripped() || s.is_empty() {
            return;
        }
        let result = self.out.borrow_mut().write_str(s);
        if let Err(e) = result {
            self.latch.record("commit", &e);
        }
    }

    /// Writes a single character.
    pub fn write_char(&mut self, c: char) {
        let mut buf = [0_u8; 4];
        self.write_str(c.encode_utf8(&mut buf));
    }

    /// Pushes pending buffered content toward the sink writer without
    /// committing the sink.
    pub fn flush(&mut self) {
        if self.latch.is_tripped() {
            return;
        }
        let result = self.out.borrow_mut().flush();
        if let Err(e) = result {
            self.latch.record("commit", &e);
        }
    }

    /// Marks this render as a nested layout pass: content may still be
    /// generated by an enclosing stage, so `close()` flushes the sink
    /// without committing length metadata.
    pub fn mark_layout_pass(&mut self) {
        self.layout_pass = true;
    }

    /// Whether any write has failed. Once true, true for this stage's
    /// lifetime.
    #[must_use]
    pub fn check_error(&self) -> bool {
        self.latch.is_tripped()
    }

    /// Trips the latch by hand.
    pub fn set_error(&mut self) {
        self.latch.trip();
    }

    /// Flushes pending content and, when possible, commits the deferred
    /// length metadata.
    ///
    /// With counting active, a still-uncommitted sink, and no error: the
    /// counted total is reported to the sink before the sink is flushed,
    /// so the length can go out ahead of the body. Otherwise, a layout
    /// pass still flushes the sink, just without length metadata.
    pub fn close(&mut self) {
        self.flush();

        if self.can_commit_length() {
            let size = self
                .counter
                .as_ref()
                .and_then(|counter| counter.borrow().size());
            if let Some(size) = size.filter(|size| *size > 0) {
                self.sink.borrow_mut().set_content_length(size as u64);
            }
            self.flush_sink();
        } else if !self.latch.is_tripped() && self.layout_pass {
            self.flush_sink();
        }
    }

    fn can_commit_length(&self) -> bool {
        self.counter.is_some() && !self.sink.borrow().is_committed() && !self.latch.is_tripped()
    }

    fn flush_sink(&mut self) {
        if self.flushed {
            return;
        }
        let result = {
            let mut sink = self.sink.borrow_mut();
            sink.writer().and_then(io::Write::flush)
        };
        match result {
            Ok(()) => self.flushed = true,
            Err(e) => self.latch.record("commit", &e),
        }
    }

    /// The internal buffer, when the buffered path is active.
    #[must_use]
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer.as_ref().map(Rc::clone)
    }
}

impl OutputTarget for BufferedCommitWriter {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        BufferedCommitWriter::write_str(self, s);
        Ok(())
    }

    fn write_char(&mut self, c: char) -> io::Result<()> {
        BufferedCommitWriter::write_char(self, c);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        BufferedCommitWriter::flush(self);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        BufferedCommitWriter::close(self);
        Ok(())
    }

    /// The commit writer is invisible to identity checks; pushing it puts
    /// its buffer (or sink writer) behind the facade.
    fn allows_unwrapping(&self) -> bool {
        true
    }

    fn inner_target(&self) -> Option<TargetHandle> {
        Some(Rc::clone(&self.out))
    }
}
