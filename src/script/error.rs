//! Script exceptions and parse errors.

use std::fmt;

use thiserror::Error;

use crate::cursor::CursorError;

/// Exception kinds a script can raise or trigger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Base exception type
    Exception,
    /// Unknown name
    NameError,
    /// Operation applied to a value of the wrong type
    TypeError,
    /// Right type, unacceptable value
    ValueError,
    /// Sequence index out of range
    IndexError,
    /// Missing dictionary key
    KeyError,
    /// Division or modulo by zero
    ZeroDivisionError,
    /// Missing attribute or method
    AttributeError,
    /// Call depth limit exceeded
    RecursionError,
    /// Integer arithmetic overflow
    OverflowError,
    /// Value would exceed the allocation limit
    MemoryError,
    /// Module could not be imported
    ImportError,
    /// Failed `assert` statement
    AssertionError,
    /// Generic runtime failure
    RuntimeError,
    /// Cursor misuse in linked-list mode
    CursorError,
    /// Cancellation: `raise KeyboardInterrupt` or an expired deadline
    Interrupted,
}

impl ErrorKind {
    /// Every kind a script can name
    pub const ALL: [Self; 16] = [
        Self::Exception,
        Self::NameError,
        Self::TypeError,
        Self::ValueError,
        Self::IndexError,
        Self::KeyError,
        Self::ZeroDivisionError,
        Self::AttributeError,
        Self::RecursionError,
        Self::OverflowError,
        Self::MemoryError,
        Self::ImportError,
        Self::AssertionError,
        Self::RuntimeError,
        Self::CursorError,
        Self::Interrupted,
    ];

    /// Name as seen by scripts and in diagnostics
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::AttributeError => "AttributeError",
            Self::RecursionError => "RecursionError",
            Self::OverflowError => "OverflowError",
            Self::MemoryError => "MemoryError",
            Self::ImportError => "ImportError",
            Self::AssertionError => "AssertionError",
            Self::RuntimeError => "RuntimeError",
            Self::CursorError => "CursorError",
            Self::Interrupted => "KeyboardInterrupt",
        }
    }

    /// Look up a kind by its script-visible name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether this kind signals voluntary cancellation rather than a fault
    #[must_use]
    pub const fn is_cancellation(self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception raised while running a script
///
/// `line` is filled in by the innermost statement or call that sees the error
/// first, and is never overwritten on the way out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptError {
    /// Exception kind
    pub kind: ErrorKind,
    /// Message, possibly empty
    pub message: String,
    /// Source line where the exception originated
    pub line: Option<usize>,
}

impl ScriptError {
    /// Create an exception without a line
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    /// Attach `line` unless a more specific line is already known
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    /// Whether the exception signals cancellation
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        self.kind.is_cancellation()
    }

    /// `Line <n>. <Kind>: <message>`, the form reported to callers
    #[must_use]
    pub fn describe(&self) -> String {
        format!("Line {}. {self}", self.line.unwrap_or(0))
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueError, message)
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexError, message)
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<CursorError> for ScriptError {
    fn from(err: CursorError) -> Self {
        let line = err.line();
        Self::new(ErrorKind::CursorError, err.to_string()).at_line(line)
    }
}

/// Source text that does not parse
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    /// Line of the offending token
    pub line: usize,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// `Line <n>. SyntaxError: <message>`, the form reported to callers
    #[must_use]
    pub fn describe(&self) -> String {
        format!("Line {}. SyntaxError: {}", self.line, self.message)
    }
}
