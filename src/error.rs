//! Compiler error types.
//!
//! All errors are fatal at the function boundary: a failing function aborts
//! the whole compilation and no partial assembly is returned. Each variant
//! carries enough context (function name, offending source line, one-phrase
//! kind) to produce a useful diagnostic without a separate location type.

use std::fmt;

/// Errors produced while compiling one translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Malformed global, duplicate label, unsupported signature, unexpected EOF.
    Parse {
        /// Function the error was discovered in, if parsing had entered one.
        function: Option<String>,
        /// The source line as written, before normalization.
        line: String,
        message: String,
    },
    /// Unrecognized instruction form, call arity violation, missing float alias.
    ISel {
        function: String,
        line: String,
        message: String,
    },
    /// Register pool exhausted with no spillable candidate.
    Alloc { function: String, message: String },
}

impl CompileError {
    pub fn parse(function: Option<&str>, line: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::Parse {
            function: function.map(str::to_string),
            line: line.into(),
            message: message.into(),
        }
    }

    pub fn isel(function: &str, line: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::ISel {
            function: function.to_string(),
            line: line.into(),
            message: message.into(),
        }
    }

    pub fn alloc(function: &str, message: impl Into<String>) -> Self {
        CompileError::Alloc {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// The one-phrase error kind, independent of the carried context.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Parse { .. } => "parse error",
            CompileError::ISel { .. } => "instruction selection error",
            CompileError::Alloc { .. } => "register allocator exhausted",
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse {
                function,
                line,
                message,
            } => match function {
                Some(name) => write!(f, "{} in `{}`: {} (at `{}`)", self.kind(), name, message, line),
                None => write!(f, "{}: {} (at `{}`)", self.kind(), message, line),
            },
            CompileError::ISel {
                function,
                line,
                message,
            } => write!(f, "{} in `{}`: {} (at `{}`)", self.kind(), function, message, line),
            CompileError::Alloc { function, message } => {
                write!(f, "{} in `{}`: {}", self.kind(), function, message)
            }
        }
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, CompileError>;
