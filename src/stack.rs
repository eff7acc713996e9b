//! The redirection stack.
//!
//! Each render owns one stack of writer frames. Pushing a writer makes it
//! the effective output target behind the facade; popping restores the
//! previous one. A frame records both the writer as pushed and its fully
//! unwrapped form, so identity checks see what the collaborator pushed
//! while writes skip the wrapping.
//!
//! Loop guard: pushing anything that is, or unwraps to, the facade itself
//! duplicates the current top frame instead of creating a self-referential
//! frame, so forwarding depth never grows.

use std::rc::Rc;

use crate::context::ContextId;
use crate::error::{EngineResult, ProtocolError};
use crate::facade::{FacadeHandle, FacadeWriter};
use crate::target::{same_target, unwrap_target, TargetHandle};

/// A pushed writer together with its fully unwrapped form.
#[derive(Clone)]
pub struct StackFrame {
    original: TargetHandle,
    unwrapped: TargetHandle,
}

impl StackFrame {
    /// The writer exactly as pushed.
    #[must_use]
    pub fn original(&self) -> TargetHandle {
        Rc::clone(&self.original)
    }

    /// The writer with all unwrapping-capable stages looked through.
    #[must_use]
    pub fn unwrapped(&self) -> TargetHandle {
        Rc::clone(&self.unwrapped)
    }
}

/// Per-render stack of writer frames behind one facade.
pub struct RedirectionStack {
    context: ContextId,
    frames: Vec<StackFrame>,
    facade: FacadeHandle,
    facade_target: TargetHandle,
    auto_sync: bool,
}

impl RedirectionStack {
    /// Creates a stack with `top` as its first frame.
    ///
    /// Returns the stack and the ambient writer the context should expose:
    /// the pushed writer under auto-sync, otherwise the facade.
    pub(crate) fn new(
        context: ContextId,
        top: TargetHandle,
        auto_sync: bool,
    ) -> (Self, TargetHandle) {
        let facade = FacadeWriter::new_handle();
        let facade_target: TargetHandle = facade.clone();
        let mut stack = Self {
            context,
            frames: Vec::new(),
            facade,
            facade_target,
            auto_sync,
        };
        let ambient = match stack.push(top) {
            Some(pushed) => pushed,
            None => Rc::clone(&stack.facade_target),
        };
        (stack, ambient)
    }

    /// Pushes a writer, making it the effective target.
    ///
    /// Returns the writer the ambient reference should be re-synced to,
    /// when the stack runs in auto-sync mode.
    pub fn push(&mut self, writer: TargetHandle) -> Option<TargetHandle> {
        self.push_checked(writer, false)
    }

    /// Pushes a writer; with `check_existing`, emits a diagnostic when the
    /// same writer identity already sits in the stack (non-fatal).
    pub fn push_checked(
        &mut self,
        writer: TargetHandle,
        check_existing: bool,
    ) -> Option<TargetHandle> {
        if same_target(&writer, &self.facade_target) && self.duplicate_top() {
            return None;
        }

        if check_existing {
            for frame in &self.frames {
                if same_target(&frame.original, &writer) {
                    tracing::warn!(
                        context = %self.context,
                        depth = self.frames.len(),
                        "writer pushed onto the redirection stack a second time"
                    );
                }
            }
        }

        let unwrapped = unwrap_target(&writer);
        if same_target(&unwrapped, &self.facade_target) && self.duplicate_top() {
            return None;
        }

        self.frames.push(StackFrame {
            original: Rc::clone(&writer),
            unwrapped: Rc::clone(&unwrapped),
        });
        self.facade.borrow_mut().set_delegate(unwrapped);

        if self.auto_sync {
            Some(writer)
        } else {
            None
        }
    }

    /// Pops the top frame, restoring the previous target.
    ///
    /// Returns the writer the ambient reference should be re-synced to,
    /// when the stack runs in auto-sync mode.
    ///
    /// # Errors
    /// `ProtocolError::EmptyPop` when no frame is left.
    pub fn pop(&mut self) -> EngineResult<Option<TargetHandle>> {
        let auto_sync = self.auto_sync;
        self.pop_sync(auto_sync)
    }

    /// Pops the top frame; with `force_sync`, additionally reports the new
    /// top's *original* target so an external collaborator can observe the
    /// exact object that was pushed, not its unwrapped form.
    ///
    /// # Errors
    /// `ProtocolError::EmptyPop` when no frame is left.
    pub fn pop_sync(&mut self, force_sync: bool) -> EngineResult<Option<TargetHandle>> {
        if self.frames.pop().is_none() {
            return Err(ProtocolError::EmptyPop {
                context: self.context,
            }
            .into());
        }
        if let Some(top) = self.frames.last() {
            self.facade.borrow_mut().set_delegate(top.unwrapped());
            if force_sync {
                return Ok(Some(top.original()));
            }
        }
        Ok(None)
    }

    /// The stable writer handle callers write through. Never a raw frame.
    #[must_use]
    pub fn current_writer(&self) -> FacadeHandle {
        Rc::clone(&self.facade)
    }

    /// The top frame's writer exactly as pushed.
    #[must_use]
    pub fn current_original_writer(&self) -> Option<TargetHandle> {
        self.frames.last().map(StackFrame::original)
    }

    /// The bottom frame's original target, for ambient restoration at
    /// teardown.
    #[must_use]
    pub fn restore_to_original(&self) -> Option<TargetHandle> {
        self.frames.first().map(StackFrame::original)
    }

    /// Current frame count.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether all frames were popped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn facade(&self) -> FacadeHandle {
        Rc::clone(&self.facade)
    }

    pub(crate) fn facade_target(&self) -> TargetHandle {
        Rc::clone(&self.facade_target)
    }

    /// Duplicates the top frame (loop guard). Returns false on an empty
    /// stack, where duplication is impossible and the push proceeds.
    fn duplicate_top(&mut self) -> bool {
        match self.frames.last().cloned() {
            Some(top) => {
                self.frames.push(top);
                true
            }
            None => false,
        }
    }
}
