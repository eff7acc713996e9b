//! The facade writer.
//!
//! External rendering code holds exactly one writer handle for the whole
//! render: the facade. It forwards every operation to the current top of
//! the redirection stack, so a nested stage can steal the output without
//! its caller noticing. The facade embeds the sticky latch: sink failures
//! make it inert instead of unwinding the render.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use crate::content::Content;
use crate::latch::ErrorLatch;
use crate::target::{self, same_target, unwrap_chain, NullTarget, OutputTarget, TargetHandle};

const CRLF: &str = "\r\n";

/// Shared handle to a [`FacadeWriter`].
pub type FacadeHandle = Rc<RefCell<FacadeWriter>>;

/// The single stable writer handle external code writes through.
#[derive(Debug)]
pub struct FacadeWriter {
    out: TargetHandle,
    latch: ErrorLatch,
    used: bool,
    cache: Option<ResolvedCache>,
}

/// Resolved-buffer-target cache, keyed by delegate identity. Purely a
/// performance shortcut; correctness never depends on it.
#[derive(Debug)]
struct ResolvedCache {
    keyed_on: TargetHandle,
    resolved: TargetHandle,
}

impl FacadeWriter {
    /// Creates a facade delegating to a discarding target until the first
    /// frame is pushed.
    #[must_use]
    pub fn new_handle() -> FacadeHandle {
        Rc::new(RefCell::new(Self {
            out: target::handle(NullTarget),
            latch: ErrorLatch::new(),
            used: false,
            cache: None,
        }))
    }

    /// Retargets the facade. The redirection stack calls this with the
    /// unwrapped form of the live top frame.
    pub fn set_delegate(&mut self, target: TargetHandle) {
        self.out = target;
    }

    /// The current delegate.
    #[must_use]
    pub fn delegate(&self) -> TargetHandle {
        Rc::clone(&self.out)
    }

    /// Writes a string as character data.
    pub fn write_str(&mut self, s: &str) {
        self.used = true;
        if self.latch.is_tripped() || s.is_empty() {
            return;
        }
        let result = self.out.borrow_mut().write_str(s);
        if let Err(e) = result {
            self.latch.record("facade", &e);
        }
    }

    /// Writes a single character.
    pub fn write_char(&mut self, c: char) {
        let mut buf = [0_u8; 4];
        self.write_str(c.encode_utf8(&mut buf));
    }

    /// Writes a bounded segment of `s`: `len` characters starting at
    /// character offset `offset`. Out-of-range segments are clamped.
    pub fn write_segment(&mut self, s: &str, offset: usize, len: usize) {
        self.used = true;
        if self.latch.is_tripped() || len == 0 {
            return;
        }
        let segment: String = s.chars().skip(offset).take(len).collect();
        self.write_str(&segment);
    }

    /// Appends a string, chainable.
    pub fn append(&mut self, s: impl AsRef<str>) -> &mut Self {
        self.write_str(s.as_ref());
        self
    }

    /// Writes a string followed by a line terminator.
    pub fn write_line(&mut self, s: &str) {
        self.write_str(s);
        self.write_str(CRLF);
    }

    /// Concatenates an arbitrary value onto the output.
    ///
    /// Dispatch, in order: nothing at all; plain text; a pre-rendered
    /// buffer via its direct streaming path; a self-describing writable
    /// object handed the current resolved target; anything displayable.
    pub fn print(&mut self, value: impl Into<Content>) {
        self.used = true;
        if self.latch.is_tripped() {
            return;
        }
        match value.into() {
            Content::Empty => {}
            Content::Text(s) => self.write_str(&s),
            Content::Buffered(buffer) => {
                let resolved = self.resolve_buffer_target(true);
                let result = buffer.borrow().write_to(&mut *resolved.borrow_mut());
                if let Err(e) = result {
                    self.latch.record("facade", &e);
                }
            }
            Content::Writable(writable) => {
                let result = writable.write_to(&mut *self.out.borrow_mut());
                if let Err(e) = result {
                    self.latch.record("facade", &e);
                }
            }
            Content::Value(v) => self.write_str(&v.to_string()),
        }
    }

    /// Flushes through the current delegate.
    pub fn flush(&mut self) {
        if self.latch.is_tripped() {
            return;
        }
        let result = self.out.borrow_mut().flush();
        if let Err(e) = result {
            self.latch.record("facade", &e);
        }
    }

    /// Whether any write has failed. Errors are cumulative: once true,
    /// true for the facade's lifetime.
    #[must_use]
    pub fn check_error(&self) -> bool {
        self.latch.is_tripped()
    }

    /// Trips the latch by hand.
    pub fn set_error(&mut self) {
        self.latch.trip();
    }

    /// Whether anything touched this facade. Also true when the resolved
    /// buffer target holds content that bypassed the facade.
    #[must_use]
    pub fn is_used(&self) -> bool {
        if self.used {
            return true;
        }
        let resolved = self.resolve_uncached();
        let stage = resolved.borrow();
        stage.is_buffer_target() && stage.buffered_len() > 0
    }

    /// Clears the usage flag, returning its previous value.
    pub fn reset_used(&mut self) -> bool {
        std::mem::replace(&mut self.used, false)
    }

    /// Resolves the innermost real buffer behind the current delegate,
    /// falling back to the delegate itself.
    ///
    /// The result is cached keyed on delegate identity; push/pop retarget
    /// the facade, which invalidates the cache by failing the identity
    /// comparison.
    fn resolve_buffer_target(&mut self, mark_used: bool) -> TargetHandle {
        let current = Rc::clone(&self.out);
        if mark_used {
            if let Some(cache) = &self.cache {
                if same_target(&cache.keyed_on, &current) {
                    return Rc::clone(&cache.resolved);
                }
            }
        }

        let unwrapped = unwrap_chain(&current, mark_used);
        let resolved = if unwrapped.borrow().is_buffer_target() {
            unwrapped
        } else {
            Rc::clone(&current)
        };

        if mark_used {
            self.cache = Some(ResolvedCache {
                keyed_on: current,
                resolved: Rc::clone(&resolved),
            });
        }
        resolved
    }

    fn resolve_uncached(&self) -> TargetHandle {
        let unwrapped = unwrap_chain(&self.out, false);
        if unwrapped.borrow().is_buffer_target() {
            unwrapped
        } else {
            Rc::clone(&self.out)
        }
    }
}

impl OutputTarget for FacadeWriter {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        FacadeWriter::write_str(self, s);
        Ok(())
    }

    fn write_char(&mut self, c: char) -> io::Result<()> {
        FacadeWriter::write_char(self, c);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        FacadeWriter::flush(self);
        Ok(())
    }

    fn mark_used(&mut self) {
        self.used = true;
    }

    // The facade never participates in unwrapping: the chain must
    // terminate here so the stack's loop guard can recognize anything
    // that resolves to the facade.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::StreamBuffer;
    use crate::content::Writable;

    fn facade_over_buffer() -> (FacadeHandle, crate::buffer::BufferHandle) {
        let buffer = StreamBuffer::accumulating(64).into_handle();
        let facade = FacadeWriter::new_handle();
        let delegate: TargetHandle = buffer.clone();
        facade.borrow_mut().set_delegate(delegate);
        (facade, buffer)
    }

    #[derive(Debug)]
    struct FailingTarget;

    impl OutputTarget for FailingTarget {
        fn write_str(&mut self, _s: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    struct Greeting;

    impl Writable for Greeting {
        fn write_to(&self, target: &mut dyn OutputTarget) -> io::Result<()> {
            target.write_str("hi")
        }
    }

    #[test]
    fn test_writes_reach_delegate() {
        let (facade, buffer) = facade_over_buffer();
        let mut f = facade.borrow_mut();
        f.write_str("A");
        f.write_char('B');
        f.append("C").append("D");
        f.write_segment("xyzw", 1, 2);
        drop(f);
        assert_eq!(buffer.borrow().as_str(), "ABCDyz");
    }

    #[test]
    fn test_write_line_uses_crlf() {
        let (facade, buffer) = facade_over_buffer();
        facade.borrow_mut().write_line("row");
        assert_eq!(buffer.borrow().as_str(), "row\r\n");
    }

    #[test]
    fn test_print_empty_marks_used_writes_nothing() {
        let (facade, buffer) = facade_over_buffer();
        let mut f = facade.borrow_mut();
        assert!(!f.is_used());
        f.print(Content::Empty);
        assert!(f.is_used());
        drop(f);
        assert!(buffer.borrow().is_empty());
    }

    #[test]
    fn test_print_option_none_is_empty() {
        let (facade, buffer) = facade_over_buffer();
        let value: Option<&str> = None;
        facade.borrow_mut().print(value);
        assert!(buffer.borrow().is_empty());
        assert!(facade.borrow().is_used());
    }

    #[test]
    fn test_print_display_value() {
        let (facade, buffer) = facade_over_buffer();
        facade.borrow_mut().print(Content::value(1234_u32));
        assert_eq!(buffer.borrow().as_str(), "1234");
    }

    #[test]
    fn test_print_writable_gets_real_target() {
        let (facade, buffer) = facade_over_buffer();
        facade.borrow_mut().print(Content::writable(Greeting));
        assert_eq!(buffer.borrow().as_str(), "hi");
    }

    #[test]
    fn test_print_prerendered_buffer_streams() {
        let (facade, buffer) = facade_over_buffer();
        let pre = StreamBuffer::accumulating(16).into_handle();
        pre.borrow_mut().push_str("pre-rendered").unwrap();

        facade.borrow_mut().print(pre);
        assert_eq!(buffer.borrow().as_str(), "pre-rendered");
    }

    #[test]
    fn test_error_latch_makes_facade_inert() {
        let facade = FacadeWriter::new_handle();
        facade
            .borrow_mut()
            .set_delegate(target::handle(FailingTarget));

        let mut f = facade.borrow_mut();
        f.write_str("first");
        assert!(f.check_error());

        // Retry with different input: still inert, still in error.
        f.write_str("second");
        f.flush();
        assert!(f.check_error());
        assert!(f.is_used());
    }

    #[test]
    fn test_retarget_recovers_nothing() {
        // A fresh delegate does not reset the latch; only a fresh facade
        // would.
        let facade = FacadeWriter::new_handle();
        facade
            .borrow_mut()
            .set_delegate(target::handle(FailingTarget));
        facade.borrow_mut().write_str("x");
        assert!(facade.borrow().check_error());

        let (_, buffer) = facade_over_buffer();
        let delegate: TargetHandle = buffer.clone();
        facade.borrow_mut().set_delegate(delegate);
        facade.borrow_mut().write_str("y");
        assert!(facade.borrow().check_error());
        assert!(buffer.borrow().is_empty());
    }

    #[test]
    fn test_is_used_probes_buffer_content() {
        let (facade, buffer) = facade_over_buffer();
        assert!(!facade.borrow().is_used());

        // Content that reached the buffer without going through the facade
        // still counts as usage.
        buffer.borrow_mut().push_str("direct").unwrap();
        assert!(facade.borrow().is_used());
    }

    #[test]
    fn test_reset_used() {
        let (facade, _buffer) = facade_over_buffer();
        facade.borrow_mut().write_str("x");
        assert!(facade.borrow_mut().reset_used());
        // Usage flag cleared, but buffer content still reports used.
        assert!(facade.borrow().is_used());
    }
}
