//! Command string tokenization.
//!
//! Provider and client commands are plain whitespace-separated strings. There
//! is no quoting, escaping, globbing or pipe support: the first token is the
//! executable path and every following token is passed through verbatim as
//! one argument. Commands that need anything richer belong in a wrapper
//! script.

use crate::error::{Result, SafeConnectError};
use std::fmt;
use std::path::{Path, PathBuf};

/// One program invocation: executable path followed by its arguments.
///
/// The vector is owned by whichever stage spawns the program and is dropped
/// once the child has been launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgVector {
    program: PathBuf,
    args: Vec<String>,
}

impl ArgVector {
    /// Builds a vector from an already separated program and arguments.
    ///
    /// The program is kept as a path, so a non-UTF-8 installation root is
    /// executed exactly as configured.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Executable path (first token).
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Positional arguments following the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Appends further arguments.
    pub fn extend<I>(&mut self, extra: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(extra.into_iter().map(Into::into));
    }

    /// Number of tokens including the executable.
    pub fn len(&self) -> usize {
        self.args.len().saturating_add(1)
    }

    /// Always false: a vector holds at least its executable.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Builds a `tokio` command for this invocation.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for ArgVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Splits a command string into an [`ArgVector`].
///
/// `role` names the command in the error ("username", "password", "client").
///
/// # Errors
/// Returns [`SafeConnectError::UnusableCommand`] when the string contains no
/// tokens.
///
/// # Example
/// ```rust
/// use safe_connect_core::command::tokenize;
///
/// let argv = tokenize("/usr/bin/env FOO=bar", "username")?;
/// assert_eq!(argv.program(), std::path::Path::new("/usr/bin/env"));
/// assert_eq!(argv.args(), ["FOO=bar"]);
/// # Ok::<(), safe_connect_core::SafeConnectError>(())
/// ```
pub fn tokenize(command: &str, role: &str) -> Result<ArgVector> {
    let mut tokens = command.split_whitespace();
    let program = tokens.next().ok_or_else(|| SafeConnectError::UnusableCommand {
        role: role.to_string(),
    })?;

    let argv = ArgVector::new(program, tokens.map(str::to_string).collect());
    tracing::debug!("Tokenized {} command into {} arguments", role, argv.len());
    Ok(argv)
}
