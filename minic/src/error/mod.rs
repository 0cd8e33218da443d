//! Error types and exit statuses

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Exit status reported when a program uses an undeclared variable.
pub const EXIT_UNDECLARED: i32 = 10;

/// Compile error
#[derive(Debug, Error)]
pub enum CompileError {
    /// An identifier reached lowering without a matching declaration. The
    /// semantic stage rejects such programs first; lowering refuses to
    /// emit code for them rather than produce a malformed program.
    #[error("variable \"{name}\" accessed before being declared (line {line}, column {column})")]
    Undeclared { name: String, line: u64, column: u64 },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("malformed syntax tree: {message}")]
    Ast { message: String },
}

impl CompileError {
    pub fn undeclared(name: impl Into<String>, line: u64, column: u64) -> Self {
        Self::Undeclared {
            name: name.into(),
            line,
            column,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn ast_error(message: impl Into<String>) -> Self {
        Self::Ast {
            message: message.into(),
        }
    }

    /// Process exit status the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Undeclared { .. } => EXIT_UNDECLARED,
            Self::Io { .. } | Self::Ast { .. } => 1,
        }
    }
}
