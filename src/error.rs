//! Error types for nx binding operations.
//!
//! Callers distinguish failure kinds by variant, never by message text:
//! a `Validation` error never reached the external program, an `Invocation`
//! error is the program's own refusal, and `OutputParse` is a contract break
//! between the program and the binding.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for nx binding operations
#[derive(Error, Debug)]
pub enum BindingError {
    /// Caller-supplied arguments violate the command grammar. Raised before
    /// any process is launched.
    #[error("invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    /// The external program exited non-zero. `stderr` is whitespace-trimmed.
    #[error("nx exited with code {exit_code}: {stderr}")]
    Invocation { exit_code: i32, stderr: String },

    /// The external program exited 0 but its stdout could not be taken as
    /// the declared output: invalid JSON, or text that is not UTF-8.
    #[error("unparseable output from nx: {0}")]
    OutputParse(String),

    /// No candidate executable exists on disk.
    #[error("nx-cli executable not found. Searched paths:\n{}", format_candidates(.candidates))]
    NotFound { candidates: Vec<PathBuf> },

    /// The command is known but its binding is not available yet.
    #[error("command '{0}' is not implemented")]
    NotImplemented(String),

    /// The child process could not be started at all.
    #[error("failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    /// Invalid binding configuration
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Filesystem error outside the child process (fixtures, work dirs)
    #[error("I/O error: {0}")]
    Io(String),
}

/// Local argument-contract violations for a mirrored command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required identifier was empty
    #[error("{name} is required")]
    EmptyIdentifier { name: String },

    /// A value that nx-cli would parse as an option instead
    #[error("{name} must not start with '-': '{value}'")]
    FlagLikeValue { name: String, value: String },

    /// An enumerated option received a value outside its closed set
    #[error("invalid {option}: '{value}'. Must be one of: {}", .accepted.join(", "))]
    InvalidChoice {
        option: String,
        value: String,
        accepted: Vec<String>,
    },

    /// A numeric option received a non-numeric value
    #[error("invalid {option}: '{value}' is not a non-negative integer")]
    NotANumber { option: String, value: String },

    /// Two options that narrow the same output were both set
    #[error("cannot specify both {first} and {second}")]
    MutuallyExclusive { first: String, second: String },

    /// Wrong number of positional values
    #[error("'{command}' takes {expected} positional argument(s), got {got}")]
    Arity {
        command: String,
        expected: usize,
        got: usize,
    },

    /// Flag not part of the command's grammar
    #[error("unknown flag for '{command}': --{flag}")]
    UnknownFlag { command: String, flag: String },

    /// Switch flag given a value, or value flag given as a bare switch
    #[error("flag --{flag} {expected}")]
    FlagShape { flag: String, expected: String },

    /// No such mirrored command
    #[error("unknown command: '{0}'")]
    UnknownCommand(String),
}

impl BindingError {
    /// True for errors raised locally, before any process launch.
    pub fn is_validation(&self) -> bool {
        matches!(self, BindingError::Validation(_))
    }

    /// Exit code of the external program, for `Invocation` errors.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BindingError::Invocation { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|c| format!("  {}", c.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for nx binding operations
pub type Result<T> = std::result::Result<T, BindingError>;
