//! Session configuration.
//!
//! This module provides the immutable `SessionConfig` value that the command
//! line layer builds once and hands to the orchestrator by reference.
//!
//! # Security
//! The configuration never carries credentials. It only names the programs
//! that produce them and the template they are substituted into.

use crate::error::{Result, SafeConnectError};
use crate::secret::DEFAULT_SECRET_CAPACITY;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// What to do when a provider writes more than the secret buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Keep the first `secret_capacity` bytes and warn
    #[default]
    Truncate,
    /// Fail the run
    Reject,
}

/// Lines sent to the client around the connect command.
///
/// The connection string may contain characters the client would otherwise
/// treat as its own substitution syntax (`&` in SQL*Plus), so substitution is
/// switched off for the connect line and back on afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Preamble {
    /// Directive disabling client-side variable substitution
    pub disable_substitution: String,
    /// Directive re-enabling client-side variable substitution
    pub enable_substitution: String,
}

impl Default for Preamble {
    fn default() -> Self {
        Self {
            disable_substitution: "set define off;".to_string(),
            enable_substitution: "set define on;".to_string(),
        }
    }
}

/// How the interactive client is located and launched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Executable name under `<client_home>/bin`
    pub program: String,
    /// Flag that stops the client from prompting for a login on start
    pub no_login_flag: String,
    /// Environment variable exported to the client pointing at the home
    pub home_env: Option<String>,
    /// Extra arguments appended after the no-login flag
    pub extra_args: Vec<String>,
    /// Substitution directives surrounding the connect line
    pub preamble: Preamble,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program: "sqlplus".to_string(),
            no_login_flag: "/NOLOG".to_string(),
            home_env: Some("ORACLE_HOME".to_string()),
            extra_args: Vec::new(),
            preamble: Preamble::default(),
        }
    }
}

/// Validated, read-only input to a session.
///
/// # Example
/// ```rust
/// use safe_connect_core::config::SessionConfig;
///
/// let config = SessionConfig::new(
///     "{{username}}/\"{{password}}\"@PROD",
///     "/opt/oracle/product/19c",
///     "/usr/local/bin/db-user",
///     "/usr/local/bin/db-pass",
/// )
/// .with_debug(true);
///
/// assert!(config.validate().is_ok());
/// assert!(config.client_executable().ends_with("bin/sqlplus"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Connection-string template containing `{{username}}`/`{{password}}`
    pub connect_template: String,
    /// Client installation root
    pub client_home: PathBuf,
    /// Command printing the username on stdout
    pub username_program: String,
    /// Command printing the password on stdout
    pub password_program: String,
    /// Client launch settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Size of the buffer each provider line is captured into
    #[serde(default = "default_secret_capacity")]
    pub secret_capacity: usize,
    /// Handling of provider output longer than `secret_capacity`
    #[serde(default)]
    pub truncation: TruncationPolicy,
    /// Debug tracing of the pipeline (never of secret values)
    #[serde(default)]
    pub debug: bool,
}

fn default_secret_capacity() -> usize {
    DEFAULT_SECRET_CAPACITY
}

impl std::fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SessionConfig(client={}, username_program={}, password_program={})",
            self.client_executable().display(),
            self.username_program,
            self.password_program
        )
    }
}

impl SessionConfig {
    /// Creates a config with default client settings.
    pub fn new(
        connect_template: impl Into<String>,
        client_home: impl Into<PathBuf>,
        username_program: impl Into<String>,
        password_program: impl Into<String>,
    ) -> Self {
        Self {
            connect_template: connect_template.into(),
            client_home: client_home.into(),
            username_program: username_program.into(),
            password_program: password_program.into(),
            client: ClientConfig::default(),
            secret_capacity: DEFAULT_SECRET_CAPACITY,
            truncation: TruncationPolicy::default(),
            debug: false,
        }
    }

    /// Builder method to replace the client settings.
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Builder method to set the client executable name.
    pub fn with_client_program(mut self, program: impl Into<String>) -> Self {
        self.client.program = program.into();
        self
    }

    /// Builder method to append extra client arguments.
    pub fn with_client_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.client.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Builder method to set the secret buffer capacity.
    pub fn with_secret_capacity(mut self, capacity: usize) -> Self {
        self.secret_capacity = capacity;
        self
    }

    /// Builder method to set the truncation policy.
    pub fn with_truncation(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    /// Builder method to enable debug tracing.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Path of the client executable: `<client_home>/bin/<program>`.
    pub fn client_executable(&self) -> PathBuf {
        self.client_home.join("bin").join(&self.client.program)
    }

    /// Installation root as a path.
    pub fn client_home(&self) -> &Path {
        &self.client_home
    }

    /// Validates that every value the core depends on is present.
    ///
    /// # Errors
    /// Returns a configuration error naming the first missing or invalid value
    pub fn validate(&self) -> Result<()> {
        if self.connect_template.trim().is_empty() {
            return Err(SafeConnectError::configuration(
                "connect template cannot be empty",
            ));
        }

        if self.client_home.as_os_str().is_empty() {
            return Err(SafeConnectError::configuration(
                "client home cannot be empty",
            ));
        }

        if self.username_program.trim().is_empty() {
            return Err(SafeConnectError::configuration(
                "username program cannot be empty",
            ));
        }

        if self.password_program.trim().is_empty() {
            return Err(SafeConnectError::configuration(
                "password program cannot be empty",
            ));
        }

        if self.client.program.is_empty() {
            return Err(SafeConnectError::configuration(
                "client program cannot be empty",
            ));
        }

        if self.client.program.contains('/') {
            return Err(SafeConnectError::configuration(
                "client program must be a name under <client home>/bin, not a path",
            ));
        }

        if self.client.no_login_flag.is_empty() {
            return Err(SafeConnectError::configuration(
                "client no-login flag cannot be empty",
            ));
        }

        if self.client.home_env.as_deref() == Some("") {
            return Err(SafeConnectError::configuration(
                "client home environment variable name cannot be empty",
            ));
        }

        if self.secret_capacity == 0 {
            return Err(SafeConnectError::configuration(
                "secret capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}
