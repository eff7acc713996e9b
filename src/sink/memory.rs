//! In-memory response sink.
//!
//! Reference implementation of [`ResponseSink`] for embedded usage and
//! tests. It records every byte handed to the raw writer, tracks the
//! commit point, and can be told to reject writes so sticky-error paths
//! can be exercised.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use super::ResponseSink;

/// In-memory sink recording everything the engine sends.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Vec<u8>,
    committed: bool,
    committed_len: usize,
    content_length: Option<u64>,
    writer_realized: bool,
    fail_writes: bool,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink wrapped in a shared cell, for handing to the engine
    /// while keeping an inspection handle.
    #[must_use]
    pub fn shared() -> Rc<RefCell<MemorySink>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Every byte handed to the raw writer so far.
    #[must_use]
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// The bytes visible on the wire, i.e. received up to the last flush.
    #[must_use]
    pub fn sent(&self) -> &[u8] {
        &self.received[..self.committed_len]
    }

    /// The reported content length, if any was set.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether the raw writer was ever realized.
    #[must_use]
    pub fn writer_realized(&self) -> bool {
        self.writer_realized
    }

    /// Makes every subsequent write fail with `BrokenPipe`, simulating a
    /// client disconnect.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
        }
        self.received.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
        }
        self.committed = true;
        self.committed_len = self.received.len();
        Ok(())
    }
}

impl ResponseSink for MemorySink {
    fn writer(&mut self) -> io::Result<&mut dyn Write> {
        self.writer_realized = true;
        Ok(self)
    }

    fn is_committed(&self) -> bool {
        self.committed
    }

    fn set_content_length(&mut self, len: u64) {
        if self.committed {
            tracing::debug!(len, "content length ignored on a committed response");
            return;
        }
        self.content_length = Some(len);
    }
}
