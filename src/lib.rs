//! # pagesink — request-scoped output redirection and buffering
//!
//! pagesink is the output engine for a server-side page-rendering system
//! that composes nested templates and layouts: a page inside a decorator
//! inside another decorator, all writing through one stable handle.
//!
//! ## Core Concepts
//!
//! - **ExecutionContext**: the per-render scope owning one redirection stack
//! - **FacadeWriter**: the single writer handle external code holds; always
//!   forwards to the current top of the stack
//! - **RedirectionStack**: push a writer to steal the output, pop to give it
//!   back; identity-safe, loop-guarded
//! - **BufferedCommitWriter**: accumulates output ahead of the sink and
//!   defers commitment, so total byte length can be reported before any
//!   bytes are sent
//! - **Sticky error state**: a broken sink makes a stage inert instead of
//!   crashing an in-progress render
//!
//! ## Usage
//!
//! ```rust
//! use pagesink::{
//!     BufferedCommitWriter, EngineConfig, ExecutionContext, MemorySink, SinkHandle,
//!     TargetHandle,
//! };
//!
//! let sink = MemorySink::shared();
//! let config = EngineConfig {
//!     length_counting_enabled: true,
//!     buffer_threshold_bytes: 16,
//!     ..EngineConfig::default()
//! };
//!
//! let sink_handle: SinkHandle = sink.clone();
//! let commit = BufferedCommitWriter::get_instance(sink_handle, &config);
//! let top: TargetHandle = commit.clone();
//!
//! let mut ctx = ExecutionContext::with_default_target(top);
//! let facade = ctx.current_facade().unwrap();
//! facade.borrow_mut().write_str("0123456789");
//!
//! // Nothing reaches the sink until the commit writer closes.
//! assert!(sink.borrow().received().is_empty());
//!
//! ctx.remove_stack().unwrap();
//! commit.borrow_mut().close();
//!
//! assert_eq!(sink.borrow().received(), b"0123456789");
//! assert_eq!(sink.borrow().content_length(), Some(10));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod commit;
pub mod config;
pub mod content;
pub mod context;
pub mod counter;
pub mod error;
pub mod facade;
pub mod latch;
pub mod sink;
pub mod stack;
pub mod target;

// Re-export primary types at crate root for convenience
pub use buffer::{BufferHandle, StreamBuffer};
pub use commit::{BufferedCommitWriter, CommitHandle};
pub use config::{EngineConfig, DEFAULT_BUFFER_THRESHOLD};
pub use content::{Content, Writable};
pub use context::{ContextId, ExecutionContext};
pub use counter::{BoundedByteCounter, CounterHandle};
pub use error::{EngineError, EngineResult, ProtocolError};
pub use facade::{FacadeHandle, FacadeWriter};
pub use latch::ErrorLatch;
pub use sink::{MemorySink, ResponseSink, SinkHandle, SinkWriter};
pub use stack::{RedirectionStack, StackFrame};
pub use target::{
    handle, same_target, unwrap_chain, unwrap_target, NullTarget, OutputTarget, TargetHandle,
};
