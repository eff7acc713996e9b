//! The writer contract shared by every redirection stage.
//!
//! [`OutputTarget`] defines the write operations plus the wrapped-writer
//! capability: a participating stage can expose its inner target so the
//! redirection stack resolves through it, or opt out to stay addressable
//! (buffers must stay addressable so pre-rendered content can stream into
//! them directly).
//!
//! Stages are held behind [`TargetHandle`]s. Identity of a handle is the
//! identity of its allocation: [`same_target`] compares data pointers, and
//! structural equality must never be substituted here — two distinct
//! buffers with equal contents are distinct targets.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// Shared handle to a writer stage.
///
/// One render is confined to one thread, so stages are shared with
/// `Rc<RefCell<_>>` rather than a lock.
pub type TargetHandle = Rc<RefCell<dyn OutputTarget>>;

/// A writer stage in the redirection chain.
pub trait OutputTarget: std::fmt::Debug {
    /// Writes a string as character data.
    ///
    /// # Errors
    /// Returns the underlying sink error, which calling stages absorb into
    /// their sticky latch.
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    /// Writes a single character.
    ///
    /// # Errors
    /// See [`OutputTarget::write_str`].
    fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0_u8; 4];
        self.write_str(c.encode_utf8(&mut buf))
    }

    /// Flushes buffered content toward the next stage.
    ///
    /// # Errors
    /// See [`OutputTarget::write_str`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Closes the stage. The default flushes.
    ///
    /// # Errors
    /// See [`OutputTarget::write_str`].
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }

    /// Whether the stack's unwrap routine may look through this stage.
    fn allows_unwrapping(&self) -> bool {
        false
    }

    /// The inner target this stage forwards to, if it participates in
    /// unwrapping.
    fn inner_target(&self) -> Option<TargetHandle> {
        None
    }

    /// Marks the stage as used without writing anything.
    fn mark_used(&mut self) {}

    /// Whether this stage is a growable buffer that accepts the direct
    /// streaming fast path.
    fn is_buffer_target(&self) -> bool {
        false
    }

    /// Bytes currently held by this stage's internal buffer; zero for
    /// unbuffered stages.
    fn buffered_len(&self) -> usize {
        0
    }
}

/// Wraps a stage into a shared [`TargetHandle`].
pub fn handle<T: OutputTarget + 'static>(stage: T) -> TargetHandle {
    Rc::new(RefCell::new(stage))
}

/// Reference-identity comparison of two handles.
///
/// Compares data pointers only. Fat-pointer equality would also compare
/// vtable addresses, which are not stable across codegen units.
#[must_use]
pub fn same_target(a: &TargetHandle, b: &TargetHandle) -> bool {
    std::ptr::eq(Rc::as_ptr(a).cast::<u8>(), Rc::as_ptr(b).cast::<u8>())
}

/// Fully unwraps a handle along the wrapped-writer capability chain.
#[must_use]
pub fn unwrap_target(writer: &TargetHandle) -> TargetHandle {
    unwrap_chain(writer, false)
}

/// Unwraps a handle, optionally marking each looked-through stage as used.
///
/// Follows `inner_target()` while `allows_unwrapping()` holds, stopping at
/// the first stage that opts out or has no inner target.
#[must_use]
pub fn unwrap_chain(writer: &TargetHandle, mark_used: bool) -> TargetHandle {
    let mut current = Rc::clone(writer);
    loop {
        let next = {
            let stage = current.borrow();
            if stage.allows_unwrapping() {
                stage.inner_target()
            } else {
                None
            }
        };
        match next {
            Some(inner) => {
                if mark_used {
                    current.borrow_mut().mark_used();
                }
                current = inner;
            }
            None => return current,
        }
    }
}

/// A target that discards everything written to it.
///
/// The facade starts out delegating here until the first frame is pushed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTarget;

impl OutputTarget for NullTarget {
    fn write_str(&mut self, _s: &str) -> io::Result<()> {
        Ok(())
    }
}
