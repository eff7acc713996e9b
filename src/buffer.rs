//! Growable character buffer with chunked overflow flushing.
//!
//! A [`StreamBuffer`] accumulates character data up to a threshold. Once
//! connected targets exist and the threshold is crossed, content streams
//! downstream in chunks of half the threshold, so very large output never
//! has to fit in memory while small output never touches the sink before
//! close. An unconnected buffer simply grows: that is the shape used for
//! per-frame accumulation during nested rendering.
//!
//! The buffer deliberately opts out of the unwrapping capability. It must
//! stay addressable so pre-rendered content can stream into it through
//! [`StreamBuffer::write_to`] without materializing an intermediate string.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::target::{OutputTarget, TargetHandle};

/// Shared handle to a [`StreamBuffer`].
pub type BufferHandle = Rc<RefCell<StreamBuffer>>;

/// Growable character buffer, optionally connected to downstream targets.
#[derive(Debug)]
pub struct StreamBuffer {
    data: String,
    threshold: usize,
    chunk_size: usize,
    auto_flush: bool,
    targets: Vec<TargetHandle>,
}

impl StreamBuffer {
    /// Creates a buffer sized to `threshold` bytes with a chunk flush unit
    /// of `threshold / 2`.
    #[must_use]
    pub fn new(threshold: usize, auto_flush: bool) -> Self {
        Self {
            data: String::with_capacity(threshold),
            threshold: threshold.max(1),
            chunk_size: (threshold / 2).max(1),
            auto_flush,
            targets: Vec::new(),
        }
    }

    /// Creates an unconnected accumulating buffer with the given capacity.
    #[must_use]
    pub fn accumulating(capacity: usize) -> Self {
        Self::new(capacity, false)
    }

    /// Wraps the buffer into a shared handle.
    #[must_use]
    pub fn into_handle(self) -> BufferHandle {
        Rc::new(RefCell::new(self))
    }

    /// Connects a downstream target. Connection order is delivery order.
    ///
    /// A target must never be the buffer itself.
    pub fn connect_to(&mut self, target: TargetHandle) {
        self.targets.push(target);
    }

    /// Bytes currently pending in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no pending content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The pending content.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Streams the pending content directly into `target`.
    ///
    /// This is the pre-rendered content fast path: no intermediate string
    /// is materialized and the buffer keeps its content.
    ///
    /// # Errors
    /// Returns the target's write error.
    pub fn write_to(&self, target: &mut dyn OutputTarget) -> io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        target.write_str(&self.data)
    }

    /// Appends character data, streaming chunks downstream past the
    /// threshold.
    ///
    /// # Errors
    /// Returns the first downstream write error; content already handed
    /// downstream is not recalled.
    pub fn push_str(&mut self, s: &str) -> io::Result<()> {
        self.data.push_str(s);
        if self.targets.is_empty() {
            return Ok(());
        }
        if self.auto_flush {
            return self.flush_pending();
        }
        if self.data.len() >= self.threshold {
            return self.flush_chunks();
        }
        Ok(())
    }

    /// Pushes all pending content downstream, leaving the buffer empty.
    ///
    /// Does not flush the downstream targets themselves; committing the
    /// sink is the commit writer's decision.
    ///
    /// # Errors
    /// Returns the first downstream write error.
    pub fn flush_pending(&mut self) -> io::Result<()> {
        if self.targets.is_empty() || self.data.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.data);
        self.deliver(&pending)
    }

    fn flush_chunks(&mut self) -> io::Result<()> {
        while self.data.len() >= self.chunk_size {
            let split = ceil_char_boundary(&self.data, self.chunk_size);
            let chunk: String = self.data.drain(..split).collect();
            self.deliver(&chunk)?;
        }
        Ok(())
    }

    fn deliver(&mut self, chunk: &str) -> io::Result<()> {
        for target in &self.targets {
            target.borrow_mut().write_str(chunk)?;
        }
        Ok(())
    }
}

impl OutputTarget for StreamBuffer {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending()
    }

    fn is_buffer_target(&self) -> bool {
        true
    }

    fn buffered_len(&self) -> usize {
        self.data.len()
    }
}

/// Smallest char boundary in `s` at or above `index`, capped at `s.len()`.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::handle;

    #[derive(Debug)]
    struct Probe {
        written: String,
        writes: usize,
    }

    impl Probe {
        fn shared() -> Rc<RefCell<Probe>> {
            Rc::new(RefCell::new(Probe {
                written: String::new(),
                writes: 0,
            }))
        }
    }

    impl OutputTarget for Probe {
        fn write_str(&mut self, s: &str) -> io::Result<()> {
            self.written.push_str(s);
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_accumulates_below_threshold() {
        let probe = Probe::shared();
        let mut buffer = StreamBuffer::new(16, false);
        buffer.connect_to(probe.clone());

        buffer.push_str("0123456789").unwrap();
        assert_eq!(buffer.len(), 10);
        assert!(probe.borrow().written.is_empty());
    }

    #[test]
    fn test_chunked_flush_past_threshold() {
        let probe = Probe::shared();
        let mut buffer = StreamBuffer::new(8, false);
        buffer.connect_to(probe.clone());

        buffer.push_str("abcdefghij").unwrap();
        // Chunks of 4 stream out until less than a chunk remains.
        assert!(buffer.len() < 4);
        assert_eq!(probe.borrow().written, "abcdefgh");

        buffer.flush_pending().unwrap();
        assert_eq!(probe.borrow().written, "abcdefghij");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_chunk_split_respects_char_boundaries() {
        let probe = Probe::shared();
        let mut buffer = StreamBuffer::new(3, false);
        buffer.connect_to(probe.clone());

        buffer.push_str("ééé").unwrap();
        buffer.flush_pending().unwrap();
        assert_eq!(probe.borrow().written, "ééé");
    }

    #[test]
    fn test_unconnected_buffer_grows() {
        let mut buffer = StreamBuffer::accumulating(4);
        buffer.push_str("a very long string well past the capacity").unwrap();
        assert_eq!(buffer.as_str(), "a very long string well past the capacity");
    }

    #[test]
    fn test_auto_flush_propagates_eagerly() {
        let probe = Probe::shared();
        let mut buffer = StreamBuffer::new(1024, true);
        buffer.connect_to(probe.clone());

        buffer.push_str("a").unwrap();
        assert_eq!(probe.borrow().written, "a");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_write_to_streams_and_keeps_content() {
        let mut buffer = StreamBuffer::accumulating(16);
        buffer.push_str("kept").unwrap();

        let sink = handle(StreamBuffer::accumulating(16));
        buffer.write_to(&mut *sink.borrow_mut()).unwrap();

        assert_eq!(buffer.as_str(), "kept");
        assert_eq!(sink.borrow().buffered_len(), 4);
    }

    #[test]
    fn test_multiple_targets_see_same_chunks() {
        let first = Probe::shared();
        let second = Probe::shared();
        let mut buffer = StreamBuffer::new(4, false);
        buffer.connect_to(first.clone());
        buffer.connect_to(second.clone());

        buffer.push_str("abcdefgh").unwrap();
        buffer.flush_pending().unwrap();
        assert_eq!(first.borrow().written, "abcdefgh");
        assert_eq!(second.borrow().written, "abcdefgh");
    }

    #[test]
    fn test_empty_flush_touches_nothing() {
        let probe = Probe::shared();
        let mut buffer = StreamBuffer::new(8, false);
        buffer.connect_to(probe.clone());

        buffer.flush_pending().unwrap();
        assert_eq!(probe.borrow().writes, 0);
    }
}
