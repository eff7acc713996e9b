//! Per-render execution scope.
//!
//! The original system resolved its output stack through ambient
//! request-scoped lookup. Here the scope is an explicit value: every core
//! call takes the [`ExecutionContext`] for the render it belongs to, and a
//! thin adapter at the system boundary maps the host framework's request
//! object to one of these. The context owns at most one redirection stack
//! and the ambient "current writer" reference collaborators observe.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineResult, ProtocolError};
use crate::facade::FacadeHandle;
use crate::stack::RedirectionStack;
use crate::target::TargetHandle;

/// Stable identifier for an execution context, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Creates a new random context ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One per logical render. Created on first access by the boundary
/// adapter, discarded when the render ends.
pub struct ExecutionContext {
    id: ContextId,
    stack: Option<RedirectionStack>,
    out: Option<TargetHandle>,
    default_target: Option<TargetHandle>,
    torn_down: bool,
}

impl ExecutionContext {
    /// Creates a context with no default target.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ContextId::new(),
            stack: None,
            out: None,
            default_target: None,
            torn_down: false,
        }
    }

    /// Creates a context whose facade can be get-or-created from
    /// `target`, typically the commit writer over the response sink.
    #[must_use]
    pub fn with_default_target(target: TargetHandle) -> Self {
        let mut ctx = Self::new();
        ctx.default_target = Some(target);
        ctx
    }

    /// This context's identifier.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The ambient writer reference collaborators observe. Kept in sync by
    /// push/pop when the stack runs in auto-sync or force-sync mode.
    #[must_use]
    pub fn current_out(&self) -> Option<TargetHandle> {
        self.out.as_ref().map(Rc::clone)
    }

    /// Whether a stack currently exists.
    #[must_use]
    pub fn has_stack(&self) -> bool {
        self.stack.is_some()
    }

    /// Frame count of the current stack, if one exists.
    #[must_use]
    pub fn stack_depth(&self) -> Option<usize> {
        self.stack.as_ref().map(RedirectionStack::depth)
    }

    /// Creates the redirection stack with `top` as its first frame.
    ///
    /// # Errors
    /// `ProtocolError::StackExists` if the context already owns one.
    pub fn create_stack(
        &mut self,
        top: TargetHandle,
        auto_sync: bool,
    ) -> EngineResult<FacadeHandle> {
        if self.stack.is_some() {
            return Err(ProtocolError::StackExists { context: self.id }.into());
        }
        let (stack, ambient) = RedirectionStack::new(self.id, top, auto_sync);
        let facade = stack.facade();
        self.out = Some(ambient);
        self.stack = Some(stack);
        self.torn_down = false;
        Ok(facade)
    }

    /// The facade for this render, creating the stack from the default
    /// target on first access.
    ///
    /// # Errors
    /// `ProtocolError::TornDown` after teardown;
    /// `ProtocolError::NoDefaultTarget` when no stack exists and no
    /// default target was configured.
    pub fn current_facade(&mut self) -> EngineResult<FacadeHandle> {
        if let Some(stack) = &self.stack {
            return Ok(stack.facade());
        }
        if self.torn_down {
            return Err(ProtocolError::TornDown { context: self.id }.into());
        }
        match self.default_target.clone() {
            Some(target) => self.create_stack(target, false),
            None => Err(ProtocolError::NoDefaultTarget { context: self.id }.into()),
        }
    }

    /// Pushes a writer onto this render's stack.
    ///
    /// # Errors
    /// See [`ExecutionContext::current_facade`] for missing-stack errors.
    pub fn push(&mut self, writer: TargetHandle) -> EngineResult<()> {
        let synced = self.stack_mut()?.push(writer);
        self.apply_sync(synced);
        Ok(())
    }

    /// Pushes a writer, with a diagnostic on duplicate identity.
    ///
    /// # Errors
    /// See [`ExecutionContext::push`].
    pub fn push_checked(&mut self, writer: TargetHandle, check_existing: bool) -> EngineResult<()> {
        let synced = self.stack_mut()?.push_checked(writer, check_existing);
        self.apply_sync(synced);
        Ok(())
    }

    /// Runs `body` with `writer` pushed, popping when it returns.
    ///
    /// Nested stages should prefer this over bare push/pop: the pop
    /// happens on every non-panicking exit, so early returns inside
    /// `body` cannot unbalance the stack. A panicking render discards
    /// the whole context.
    ///
    /// # Errors
    /// See [`ExecutionContext::push`] and [`ExecutionContext::pop`].
    pub fn with_pushed<T>(
        &mut self,
        writer: TargetHandle,
        body: impl FnOnce(&mut Self) -> T,
    ) -> EngineResult<T> {
        self.push(writer)?;
        let result = body(self);
        self.pop()?;
        Ok(result)
    }

    /// Pops the top frame.
    ///
    /// # Errors
    /// `ProtocolError::EmptyPop` on an empty stack, plus missing-stack
    /// errors.
    pub fn pop(&mut self) -> EngineResult<()> {
        let synced = self.stack_mut()?.pop()?;
        self.apply_sync(synced);
        Ok(())
    }

    /// Pops the top frame, optionally force-syncing the ambient reference
    /// to the restored frame's original target.
    ///
    /// # Errors
    /// See [`ExecutionContext::pop`].
    pub fn pop_sync(&mut self, force_sync: bool) -> EngineResult<()> {
        let synced = self.stack_mut()?.pop_sync(force_sync)?;
        self.apply_sync(synced);
        Ok(())
    }

    /// Resets the ambient reference to the bottom frame's original target.
    /// Used at teardown.
    ///
    /// # Errors
    /// Missing-stack errors.
    pub fn restore_ambient_to_original(&mut self) -> EngineResult<()> {
        let original = self.stack_mut()?.restore_to_original();
        self.apply_sync(original);
        Ok(())
    }

    /// Tears the stack down at end of render.
    ///
    /// # Errors
    /// `ProtocolError::TornDown` on double teardown (or teardown before
    /// any stack existed).
    pub fn remove_stack(&mut self) -> EngineResult<()> {
        if self.stack.take().is_none() {
            return Err(ProtocolError::TornDown { context: self.id }.into());
        }
        self.torn_down = true;
        Ok(())
    }

    fn stack_mut(&mut self) -> EngineResult<&mut RedirectionStack> {
        let id = self.id;
        let torn_down = self.torn_down;
        match self.stack.as_mut() {
            Some(stack) => Ok(stack),
            None if torn_down => Err(ProtocolError::TornDown { context: id }.into()),
            None => Err(ProtocolError::NoStack { context: id }.into()),
        }
    }

    fn apply_sync(&mut self, synced: Option<TargetHandle>) {
        if let Some(writer) = synced {
            self.out = Some(writer);
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("stack_depth", &self.stack_depth())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}
