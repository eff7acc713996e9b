//! Values that can be concatenated onto the output.
//!
//! The facade's `print` accepts a closed set of shapes rather than probing
//! runtime types: nothing at all, plain text, a pre-rendered buffer with a
//! direct streaming path, a self-describing writable object, or anything
//! displayable as a last resort.

use std::fmt;
use std::io;
use std::rc::Rc;

use crate::buffer::BufferHandle;
use crate::target::OutputTarget;

/// A value that knows how to render itself into a writer stage.
pub trait Writable {
    /// Renders this value into `target`.
    ///
    /// # Errors
    /// Returns the target's write error.
    fn write_to(&self, target: &mut dyn OutputTarget) -> io::Result<()>;
}

/// A value to concatenate onto the output.
pub enum Content {
    /// Nothing. Writing it produces no bytes but still marks the stage as
    /// used, so instrumentation can tell "never touched" from "touched".
    Empty,
    /// Plain text, written as character data.
    Text(String),
    /// A pre-rendered buffer, streamed directly without materializing an
    /// intermediate string.
    Buffered(BufferHandle),
    /// A self-describing writable object, handed the current resolved
    /// target rather than the facade.
    Writable(Rc<dyn Writable>),
    /// Anything else, rendered through its `Display` form.
    Value(Box<dyn fmt::Display>),
}

impl Content {
    /// Wraps any displayable value.
    pub fn value(value: impl fmt::Display + 'static) -> Self {
        Self::Value(Box::new(value))
    }

    /// Wraps a writable object.
    pub fn writable(writable: impl Writable + 'static) -> Self {
        Self::Writable(Rc::new(writable))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Buffered(_) => f.write_str("Buffered(..)"),
            Self::Writable(_) => f.write_str("Writable(..)"),
            Self::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<char> for Content {
    fn from(c: char) -> Self {
        Self::Text(c.to_string())
    }
}

impl From<BufferHandle> for Content {
    fn from(buffer: BufferHandle) -> Self {
        Self::Buffered(buffer)
    }
}

/// Absent values are written as nothing, never as the text "None".
impl<T: Into<Content>> From<Option<T>> for Content {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}
