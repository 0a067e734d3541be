//! Ownership and supervision of a single child process.
//!
//! A `Supervisor` is the only place a child's exit status is collected. While
//! the orchestrator is blocked on a pipe, `guard` watches the child at the
//! same time, so a child that dies abnormally aborts the run instead of
//! leaving the orchestrator stuck on a descriptor nobody will ever write to.
//! There is exactly one reaper per child, so an explicit wait can never race
//! an asynchronous one.

use crate::error::{INTERNAL_EXIT_CODE, Result, SafeConnectError};
use crate::process::provider::CredentialRole;
use crate::signals::{fault_label, signal_name};
use std::fmt;
use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// What a supervised child is for. Decides how its failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRole {
    /// A credential provider program
    Provider(CredentialRole),
    /// The interactive client
    Client,
}

impl fmt::Display for ChildRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(role) => write!(f, "{} provider", role),
            Self::Client => write!(f, "client"),
        }
    }
}

/// How a child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Exit status 0
    Success,
    /// Nonzero exit status
    Code(i32),
    /// Terminated by a signal
    Signal(i32),
}

impl ChildExit {
    /// Classifies an OS exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(signal) = status.signal() {
            return Self::Signal(signal);
        }

        match status.code() {
            Some(0) => Self::Success,
            Some(code) => Self::Code(code),
            None => Self::Code(INTERNAL_EXIT_CODE),
        }
    }

    /// True for a clean exit.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Exit code the orchestrator should terminate with for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Code(code) => *code,
            Self::Signal(signal) => 128_i32.saturating_add(*signal),
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "clean exit (code 0)"),
            Self::Code(code) => write!(f, "error exit (code {})", code),
            Self::Signal(signal) => write!(f, "signal {} ({})", signal, signal_name(*signal)),
        }
    }
}

/// Result of racing a future against the child's termination.
#[derive(Debug)]
pub enum Race<T> {
    /// The future finished while the child was still running (or had exited
    /// cleanly and the future was driven to completion).
    Completed(T),
    /// The child terminated first; the future was dropped.
    Exited(ChildExit),
}

/// Owns one child process handle for its whole lifetime.
///
/// The child is spawned with `kill_on_drop`, so abandoning a supervisor on an
/// error path never leaves a provider or client running unattended.
#[derive(Debug)]
pub struct Supervisor {
    child: Child,
    program: PathBuf,
    role: ChildRole,
    exit: Option<ChildExit>,
}

impl Supervisor {
    /// Spawns `command` and takes ownership of the resulting child.
    ///
    /// # Errors
    /// Returns [`SafeConnectError::Spawn`] when the program cannot be
    /// executed (missing, not executable, resource exhaustion).
    pub fn spawn(mut command: Command, program: impl AsRef<Path>, role: ChildRole) -> Result<Self> {
        let program = program.as_ref();
        command.kill_on_drop(true);
        let child = command
            .spawn()
            .map_err(|e| SafeConnectError::spawn(program.display().to_string(), e))?;

        tracing::debug!(
            "Spawned {} \"{}\" (pid {})",
            role,
            program.display(),
            child.id().map_or_else(|| "unknown".to_string(), |id| id.to_string())
        );

        Ok(Self {
            child,
            program: program.to_path_buf(),
            role,
            exit: None,
        })
    }

    /// Role this child was spawned for.
    pub fn role(&self) -> ChildRole {
        self.role
    }

    /// Program path the child was spawned from.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Exit status, once it has been collected.
    pub fn exit(&self) -> Option<ChildExit> {
        self.exit
    }

    /// Takes the read end of the child's stdout pipe.
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.child.stdout.take().ok_or_else(|| {
            SafeConnectError::io(
                format!("capturing output of {}", self.role),
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout was not piped"),
            )
        })
    }

    /// Takes the write end of the child's stdin pipe.
    ///
    /// Must be taken before any wait: `tokio` closes a stdin handle still held
    /// by the child object when waiting.
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.child.stdin.take().ok_or_else(|| {
            SafeConnectError::io(
                format!("feeding input to {}", self.role),
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin was not piped"),
            )
        })
    }

    /// Drives `fut` while watching the child.
    ///
    /// If the child terminates abnormally before `fut` completes, `fut` is
    /// dropped and the child's failure is returned. A clean exit does not
    /// interrupt `fut`.
    ///
    /// # Errors
    /// Returns the child's failure, or an I/O error if waiting itself fails
    pub async fn guard<F>(&mut self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::pin!(fut);

        match self.exit {
            None => {
                tokio::select! {
                    output = &mut fut => return Ok(output),
                    status = self.child.wait() => {
                        let exit = self.record(status)?;
                        self.check(exit)?;
                    }
                }
            }
            Some(exit) => {
                self.check(exit)?;
            }
        }

        Ok(fut.await)
    }

    /// Drives `fut` until either it completes or the child terminates,
    /// whichever happens first.
    ///
    /// # Errors
    /// Returns an I/O error if waiting on the child fails
    pub async fn race<F>(&mut self, fut: F) -> Result<Race<F::Output>>
    where
        F: Future,
    {
        if let Some(exit) = self.exit {
            return Ok(Race::Exited(exit));
        }

        tokio::select! {
            output = fut => Ok(Race::Completed(output)),
            status = self.child.wait() => Ok(Race::Exited(self.record(status)?)),
        }
    }

    /// Blocks until the child terminates and returns how it ended.
    ///
    /// # Errors
    /// Returns an I/O error if waiting on the child fails
    pub async fn finish(&mut self) -> Result<ChildExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }

        let status = self.child.wait().await;
        self.record(status)
    }

    /// Converts a non-clean exit into the matching error.
    ///
    /// # Errors
    /// Returns the role-specific failure for anything but a clean exit
    pub fn check(&self, exit: ChildExit) -> Result<ChildExit> {
        match exit {
            ChildExit::Success => Ok(exit),
            ChildExit::Code(code) => Err(match self.role {
                ChildRole::Provider(role) => SafeConnectError::ProviderFailed {
                    role: role.to_string(),
                    code,
                },
                ChildRole::Client => SafeConnectError::ClientFailed { code },
            }),
            ChildExit::Signal(signal) => Err(SafeConnectError::ChildSignaled {
                program: self.program.display().to_string(),
                signal,
                name: signal_name(signal).to_string(),
            }),
        }
    }

    fn record(&mut self, status: std::io::Result<ExitStatus>) -> Result<ChildExit> {
        let status = status.map_err(|e| {
            SafeConnectError::io(format!("waiting for {} to terminate", self.role), e)
        })?;
        let exit = ChildExit::from_status(status);

        match exit {
            ChildExit::Success => tracing::debug!("{} exited cleanly", self.role),
            ChildExit::Code(code) => {
                tracing::debug!("{} exited with status {}", self.role, code);
            }
            ChildExit::Signal(signal) => match fault_label(signal) {
                Some(label) => tracing::error!(
                    "{} in {} \"{}\"",
                    label,
                    self.role,
                    self.program.display()
                ),
                None => tracing::warn!(
                    "{} \"{}\" terminated by {}",
                    self.role,
                    self.program.display(),
                    exit
                ),
            },
        }

        self.exit = Some(exit);
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn test_child_exit_classification() {
        assert_eq!(ChildExit::from_status(ExitStatus::from_raw(0)), ChildExit::Success);
        assert_eq!(
            ChildExit::from_status(ExitStatus::from_raw(7 << 8)),
            ChildExit::Code(7)
        );
        assert_eq!(
            ChildExit::from_status(ExitStatus::from_raw(11)),
            ChildExit::Signal(11)
        );
    }

    #[test]
    fn test_child_exit_codes() {
        assert_eq!(ChildExit::Success.exit_code(), 0);
        assert_eq!(ChildExit::Code(3).exit_code(), 3);
        assert_eq!(ChildExit::Signal(9).exit_code(), 137);
        assert!(ChildExit::Signal(8).to_string().contains("SIGFPE"));
    }

    #[tokio::test]
    async fn test_finish_reports_exit_code() {
        let mut supervisor = Supervisor::spawn(
            shell("exit 5"),
            "/bin/sh",
            ChildRole::Provider(CredentialRole::Username),
        )
        .unwrap();
        assert_eq!(supervisor.finish().await.unwrap(), ChildExit::Code(5));
        assert_eq!(supervisor.exit(), Some(ChildExit::Code(5)));

        let err = supervisor.check(ChildExit::Code(5)).unwrap_err();
        assert!(matches!(err, SafeConnectError::ProviderFailed { code: 5, .. }));
    }

    #[tokio::test]
    async fn test_guard_aborts_on_abnormal_exit() {
        let mut supervisor = Supervisor::spawn(
            shell("exit 9"),
            "/bin/sh",
            ChildRole::Provider(CredentialRole::Password),
        )
        .unwrap();

        let err = supervisor
            .guard(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 9);
    }

    #[tokio::test]
    async fn test_guard_keeps_driving_after_clean_exit() {
        let mut supervisor =
            Supervisor::spawn(shell("exit 0"), "/bin/sh", ChildRole::Client).unwrap();

        let value = supervisor
            .guard(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                42
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_race_reports_child_exit_first() {
        let mut supervisor =
            Supervisor::spawn(shell("exit 3"), "/bin/sh", ChildRole::Client).unwrap();

        let outcome = supervisor.race(std::future::pending::<()>()).await.unwrap();
        assert!(matches!(outcome, Race::Exited(ChildExit::Code(3))));

        let err = supervisor.check(ChildExit::Code(3)).unwrap_err();
        assert!(matches!(err, SafeConnectError::ClientFailed { code: 3 }));
    }

    #[tokio::test]
    async fn test_signal_death_is_classified() {
        let mut supervisor =
            Supervisor::spawn(shell("kill -SEGV $$"), "/bin/sh", ChildRole::Client).unwrap();

        let exit = supervisor.finish().await.unwrap();
        assert_eq!(exit, ChildExit::Signal(11));
        let err = supervisor.check(exit).unwrap_err();
        assert_eq!(err.exit_code(), 139);
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let err = Supervisor::spawn(
            Command::new("/nonexistent/provider"),
            "/nonexistent/provider",
            ChildRole::Provider(CredentialRole::Username),
        )
        .unwrap_err();
        assert!(matches!(err, SafeConnectError::Spawn { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
