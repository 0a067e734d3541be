//! Credential provider runner.
//!
//! A provider is any executable that prints one line (the credential) on
//! stdout and exits 0. The runner spawns it with stdout wired to a pipe and
//! reads until the first newline, a full buffer, or the provider's exit.
//! It never waits for end-of-stream, which a background process started by
//! the provider may hold off indefinitely. One trailing newline is stripped
//! and the child reaped; a nonzero exit is terminal for the whole run.

use crate::command::{ArgVector, tokenize};
use crate::config::{SessionConfig, TruncationPolicy};
use crate::error::{Result, SafeConnectError};
use crate::process::supervisor::{ChildRole, Race, Supervisor};
use crate::secret::SecretBuf;
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes read per call while draining output past the first line.
const DRAIN_CHUNK: usize = 512;

/// How long output is still collected after a provider has exited cleanly.
const EXIT_GRACE: Duration = Duration::from_millis(100);

/// Which credential a provider produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRole {
    /// Database username
    Username,
    /// Database password
    Password,
}

impl fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username => write!(f, "username"),
            Self::Password => write!(f, "password"),
        }
    }
}

/// Source of one credential line.
///
/// Implementations must fail rather than return a partial or guessed value:
/// the orchestrator treats any error as terminal.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Credential this provider produces.
    fn role(&self) -> CredentialRole;

    /// Produces the credential, trailing newline removed.
    async fn acquire(&self) -> Result<SecretBuf>;
}

/// Reads into `secret` until a newline has been read, the buffer is full or
/// the stream ends, whichever comes first.
///
/// Bytes read before the future is dropped stay in `secret`, so the read
/// can be abandoned when the provider exits and resumed afterwards.
///
/// # Errors
/// Returns the underlying I/O error if reading fails
pub async fn read_line_into<R>(reader: &mut R, secret: &mut SecretBuf) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    while !secret.is_full() {
        let start = secret.len();
        let count = reader.read(secret.spare_mut()).await?;
        if count == 0 {
            break;
        }
        secret.advance(count);
        if secret.as_bytes()[start..].contains(&b'\n') {
            break;
        }
    }
    Ok(())
}

/// Reads and discards until end-of-stream.
///
/// Returns the number of bytes discarded.
///
/// # Errors
/// Returns the underlying I/O error if reading fails
pub async fn drain<R>(reader: &mut R) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut scratch = SecretBuf::with_capacity(DRAIN_CHUNK);
    let mut discarded = 0_usize;
    loop {
        let count = reader.read(scratch.spare_mut()).await?;
        if count == 0 {
            return Ok(discarded);
        }
        discarded = discarded.saturating_add(count);
    }
}

/// Runs an external program and captures its first line of output.
#[derive(Debug, Clone)]
pub struct ProgramProvider {
    role: CredentialRole,
    argv: ArgVector,
    capacity: usize,
    truncation: TruncationPolicy,
}

impl ProgramProvider {
    /// Creates a provider for an already tokenized command.
    pub fn new(
        role: CredentialRole,
        argv: ArgVector,
        capacity: usize,
        truncation: TruncationPolicy,
    ) -> Self {
        Self {
            role,
            argv,
            capacity,
            truncation,
        }
    }

    /// Tokenizes the configured command for `role`.
    ///
    /// # Errors
    /// Returns [`SafeConnectError::UnusableCommand`] for an empty command
    pub fn from_config(role: CredentialRole, config: &SessionConfig) -> Result<Self> {
        let command = match role {
            CredentialRole::Username => &config.username_program,
            CredentialRole::Password => &config.password_program,
        };
        let argv = tokenize(command, &role.to_string())?;
        Ok(Self::new(role, argv, config.secret_capacity, config.truncation))
    }

    /// Argument vector the provider is executed with.
    pub fn argv(&self) -> &ArgVector {
        &self.argv
    }

    fn command(&self) -> tokio::process::Command {
        let mut command = self.argv.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        command
    }
}

#[async_trait]
impl CredentialProvider for ProgramProvider {
    fn role(&self) -> CredentialRole {
        self.role
    }

    async fn acquire(&self) -> Result<SecretBuf> {
        tracing::debug!("Exec {} program: {}", self.role, self.argv);

        let mut supervisor = Supervisor::spawn(
            self.command(),
            self.argv.program(),
            ChildRole::Provider(self.role),
        )?;
        let mut stdout = supervisor.take_stdout()?;

        // One spare byte tells a line that fits apart from an oversized one.
        let mut secret = SecretBuf::with_capacity(self.capacity.saturating_add(1));

        let read = match supervisor
            .race(read_line_into(&mut stdout, &mut secret))
            .await?
        {
            Race::Completed(read) => {
                // Keep the pipe flowing until the provider is gone. A clean
                // exit ends this even while a background process it left
                // behind still holds the write end.
                if let Race::Completed(Ok(discarded)) = supervisor.race(drain(&mut stdout)).await?
                    && discarded > 0
                {
                    tracing::debug!("Discarded {} bytes after the {} line", discarded, self.role);
                }
                read
            }
            Race::Exited(exit) => {
                supervisor.check(exit)?;
                // Output written before a clean exit is already in the pipe.
                tokio::time::timeout(EXIT_GRACE, read_line_into(&mut stdout, &mut secret))
                    .await
                    .unwrap_or(Ok(()))
            }
        };
        drop(stdout);

        // The exit status outranks whatever was (or was not) read.
        let exit = supervisor.finish().await?;
        supervisor.check(exit)?;
        read.map_err(|e| {
            SafeConnectError::io(format!("reading {} provider output", self.role), e)
        })?;

        if secret.is_empty() {
            return Err(SafeConnectError::NoOutput {
                role: self.role.to_string(),
            });
        }

        secret.strip_trailing_newline();
        if secret.len() > self.capacity {
            match self.truncation {
                TruncationPolicy::Truncate => {
                    tracing::warn!(
                        "{} provider output exceeds {} bytes; truncated",
                        self.role,
                        self.capacity
                    );
                    secret.truncate(self.capacity);
                }
                TruncationPolicy::Reject => {
                    secret.scrub();
                    return Err(SafeConnectError::SecretTooLong {
                        role: self.role.to_string(),
                        capacity: self.capacity,
                    });
                }
            }
        }

        tracing::debug!("Got {} ({} bytes)", self.role, secret.len());
        Ok(secret)
    }
}
