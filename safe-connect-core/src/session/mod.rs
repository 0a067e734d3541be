//! Session orchestration.
//!
//! A session runs its stages strictly in order:
//!
//! 1. username provider (spawn, capture, reap)
//! 2. password provider (spawn, capture, reap)
//! 3. client spawn with a pipe on its stdin
//! 4. preamble and connect line written to the pipe, secrets scrubbed
//! 5. the user's input relayed to the pipe until end-of-input
//! 6. client reaped; its status becomes the session's status
//!
//! Any failure ends the session with that stage's status. Nothing is
//! retried: a credential is fetched at most once per session.

mod secrets;
mod state;

pub use secrets::{CONNECT_PREFIX, SessionSecrets};
pub use state::SessionState;

use crate::command::ArgVector;
use crate::config::SessionConfig;
use crate::error::{Result, SafeConnectError};
use crate::process::{
    ChildExit, ChildRole, CredentialProvider, CredentialRole, ProgramProvider, Race, Supervisor,
};
use crate::template::placeholder_counts;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes copied per read from the user's input to the client.
pub const RELAY_CHUNK: usize = 4096;

/// How a session that reached the client ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Status to exit the process with
    pub exit_code: i32,
    /// State the session finished in
    pub final_state: SessionState,
}

/// Builds `<client_home>/bin/<program> <no-login-flag> [extra args...]`.
///
/// The installation root is kept as one token, so it may contain spaces.
pub fn client_argv(config: &SessionConfig) -> ArgVector {
    let mut argv = ArgVector::new(
        config.client_executable(),
        vec![config.client.no_login_flag.clone()],
    );
    argv.extend(config.client.extra_args.iter().cloned());
    argv
}

/// Copies `input` to `output` a chunk at a time until end-of-input.
///
/// Each chunk is flushed immediately so an interactive client sees every
/// line as soon as it is typed.
///
/// # Errors
/// Returns the first read or write error
pub async fn relay<R, W>(input: &mut R, output: &mut W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut chunk = [0_u8; RELAY_CHUNK];
    let mut total = 0_u64;

    loop {
        let count = input.read(&mut chunk).await?;
        if count == 0 {
            return Ok(total);
        }
        output.write_all(&chunk[..count]).await?;
        output.flush().await?;
        total = total.saturating_add(count as u64);
    }
}

/// One credential-acquisition and client session.
pub struct Session<'a> {
    config: &'a SessionConfig,
    username: Box<dyn CredentialProvider + 'a>,
    password: Box<dyn CredentialProvider + 'a>,
    state: SessionState,
}

impl<'a> Session<'a> {
    /// Creates a session that runs the configured provider programs.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid config, or an unusable
    /// command error for an empty provider command
    pub fn new(config: &'a SessionConfig) -> Result<Self> {
        config.validate()?;

        let (usernames, passwords) = placeholder_counts(&config.connect_template);
        if usernames == 0 && passwords == 0 {
            tracing::warn!("Connect template contains no credential placeholders");
        }
        tracing::debug!(
            "Template has {} username and {} password placeholders",
            usernames,
            passwords
        );

        let username = ProgramProvider::from_config(CredentialRole::Username, config)?;
        let password = ProgramProvider::from_config(CredentialRole::Password, config)?;
        Ok(Self::with_providers(
            config,
            Box::new(username),
            Box::new(password),
        ))
    }

    /// Creates a session with caller-supplied providers.
    pub fn with_providers(
        config: &'a SessionConfig,
        username: Box<dyn CredentialProvider + 'a>,
        password: Box<dyn CredentialProvider + 'a>,
    ) -> Self {
        Self {
            config,
            username,
            password,
            state: SessionState::Init,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the whole pipeline, relaying `input` to the client.
    ///
    /// On success the outcome carries the client's exit status. On failure
    /// the session is left in `Failed` and the error's `exit_code()` is the
    /// status to terminate with.
    ///
    /// # Errors
    /// Returns the first stage failure
    pub async fn run<R>(&mut self, input: &mut R) -> Result<SessionOutcome>
    where
        R: AsyncRead + Unpin,
    {
        match self.drive(input).await {
            Ok(exit_code) => Ok(SessionOutcome {
                exit_code,
                final_state: self.state,
            }),
            Err(e) => {
                self.advance(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn drive<R>(&mut self, input: &mut R) -> Result<i32>
    where
        R: AsyncRead + Unpin,
    {
        let config = self.config;

        let username = self.username.acquire().await?;
        self.advance(SessionState::UsernameAcquired);

        let password = self.password.acquire().await?;
        self.advance(SessionState::PasswordAcquired);

        // Owns both credentials from here on; dropping it on any path scrubs.
        let mut secrets = SessionSecrets::new(username, password);

        let argv = client_argv(config);
        tracing::debug!("Exec: {}", argv);
        let mut client = Supervisor::spawn(
            self.client_command(&argv),
            argv.program(),
            ChildRole::Client,
        )?;
        let mut stdin = client.take_stdin()?;
        self.advance(SessionState::ClientSpawned);

        let delivered = client
            .guard(secrets.deliver(
                &mut stdin,
                &config.connect_template,
                &config.client.preamble,
            ))
            .await;
        secrets.scrub();
        drop(secrets);

        match delivered {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Self::delivery_failure(&mut client, e).await),
            Err(e) => return Err(e),
        }

        self.advance(SessionState::Relaying);
        match client.race(relay(input, &mut stdin)).await? {
            Race::Completed(Ok(total)) => {
                tracing::debug!("Input closed after {} bytes; waiting for client", total);
            }
            Race::Completed(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("Client closed its input");
            }
            Race::Completed(Err(e)) => {
                return Err(SafeConnectError::io("relaying input to client", e));
            }
            Race::Exited(exit) => {
                tracing::debug!("Client terminated during relay: {}", exit);
            }
        }

        // Closing the pipe is the client's end-of-input.
        drop(stdin);
        let exit = client.finish().await?;
        self.advance(SessionState::Done);
        Ok(exit.exit_code())
    }

    fn client_command(&self, argv: &ArgVector) -> tokio::process::Command {
        let mut command = argv.to_command();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(var) = &self.config.client.home_env {
            command.env(var, &self.config.client_home);
        }
        command
    }

    /// A failed preamble write usually means the client died; prefer its
    /// status over the bare I/O error.
    async fn delivery_failure(client: &mut Supervisor, error: std::io::Error) -> SafeConnectError {
        if let Ok(exit) = client.finish().await
            && exit != ChildExit::Success
            && let Err(failure) = client.check(exit)
        {
            return failure;
        }
        SafeConnectError::io("writing connect command to client", error)
    }

    fn advance(&mut self, next: SessionState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!("Ignoring illegal session transition {} -> {}", self.state, next);
            return;
        }
        tracing::debug!("Session state: {} -> {}", self.state, next);
        self.state = next;
    }
}
