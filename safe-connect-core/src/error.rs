//! Error types with secret-free diagnostics.
//!
//! Every variant describes *which* stage failed and how, never *what* it was
//! handling. Provider output, the expanded connection command, and anything
//! derived from them are never carried in an error value.

use thiserror::Error;

/// Exit code used for internal failures (pipe, spawn, I/O, configuration).
pub const INTERNAL_EXIT_CODE: i32 = 1;

/// Main error type for safe-connect operations.
///
/// # Security
/// Messages name the failing stage and program path only. Secret material
/// never reaches `Display` or `Debug` output.
#[derive(Debug, Error)]
pub enum SafeConnectError {
    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A command string produced no executable path
    #[error("Unusable {role} command: command string is empty")]
    UnusableCommand { role: String },

    /// Creating a child process failed
    #[error("Unable to execute \"{program}\"")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Pipe, read, write or wait failure
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A credential provider wrote nothing to its output
    #[error("Could not get {role}: provider produced no output")]
    NoOutput { role: String },

    /// Provider output did not fit the secret buffer and truncation is disabled
    #[error("Could not get {role}: provider output exceeds {capacity} bytes")]
    SecretTooLong { role: String, capacity: usize },

    /// A credential provider exited with a nonzero status
    #[error("{role} provider exited with status {code}")]
    ProviderFailed { role: String, code: i32 },

    /// A child process was terminated by a signal
    #[error("\"{program}\" was terminated by signal {signal} ({name})")]
    ChildSignaled {
        program: String,
        signal: i32,
        name: String,
    },

    /// The client exited nonzero while the session was still feeding it
    #[error("Client exited with status {code} during the session")]
    ClientFailed { code: i32 },
}

/// Convenience type alias for Results with SafeConnectError
pub type Result<T> = std::result::Result<T, SafeConnectError>;

impl SafeConnectError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a spawn error for the given program path
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Process exit code this error should terminate the run with.
    ///
    /// Provider and client statuses are propagated verbatim, signal deaths
    /// follow the shell convention of `128 + signal`, and everything else is
    /// an internal failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ProviderFailed { code, .. } | Self::ClientFailed { code } => *code,
            Self::ChildSignaled { signal, .. } => 128_i32.saturating_add(*signal),
            Self::Configuration { .. }
            | Self::UnusableCommand { .. }
            | Self::Spawn { .. }
            | Self::Io { .. }
            | Self::NoOutput { .. }
            | Self::SecretTooLong { .. } => INTERNAL_EXIT_CODE,
        }
    }
}
