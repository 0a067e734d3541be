//! Library module for safe-connect
//!
//! Command-line parsing and configuration loading live here so they can be
//! tested; the binary itself is in main.rs.

use anyhow::Context;
use clap::{Args, Parser};
use safe_connect_core::{
    ClientConfig, SafeConnectError, SessionConfig, TruncationPolicy, secret::DEFAULT_SECRET_CAPACITY,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "safe-connect")]
#[command(about = "Launch a database client without exposing credentials in process listings")]
#[command(version)]
#[command(long_about = "
safe-connect - credential-safe launcher for interactive database clients

The username and password are obtained at runtime from provider programs,
substituted into a connection template and written to the client's stdin.
They never appear on any command line or in any environment variable.
Your own terminal input is relayed to the client afterwards.

PROVIDER PROGRAMS:
  A provider prints exactly one line (the credential) on stdout and exits 0.
  Provider commands are split on whitespace and executed directly: pipes,
  quotes and shell syntax are not supported. Wrap anything more elaborate
  in a script.

TEMPLATE PLACEHOLDERS:
  {{username}} and {{password}} are replaced verbatim (case-sensitive).

EXAMPLES:
  safe-connect -o /opt/oracle/product/19c \\
      -u /usr/local/bin/get_oracle_username \\
      -p /usr/local/bin/get_oracle_password \\
      -t '{{username}}/\"{{password}}\"@\"(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=db1)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=pdb1)))\"'
  safe-connect --config /etc/safe-connect/prod.json
")]
pub struct Cli {
    /// Connection-string template
    #[arg(
        short = 't',
        long,
        env = "SAFE_CONNECT_TEMPLATE",
        value_name = "TEMPLATE",
        help = "Connection template containing {{username}} and {{password}}"
    )]
    pub connect_template: Option<String>,

    /// Client installation root
    #[arg(
        short = 'o',
        long,
        visible_alias = "oraclehome",
        env = "SAFE_CONNECT_CLIENT_HOME",
        value_name = "DIR",
        help = "Client installation root; <DIR>/bin/<client> is executed"
    )]
    pub client_home: Option<PathBuf>,

    /// Username provider command
    #[arg(
        short = 'u',
        long,
        visible_alias = "usernameprogram",
        value_name = "CMD",
        help = "Path and arguments of the program printing the username"
    )]
    pub username_program: Option<String>,

    /// Password provider command
    #[arg(
        short = 'p',
        long,
        visible_alias = "passwordprogram",
        value_name = "CMD",
        help = "Path and arguments of the program printing the password"
    )]
    pub password_program: Option<String>,

    /// Client executable name
    #[arg(long, value_name = "NAME", help = "Client executable under <client home>/bin [default: sqlplus]")]
    pub client: Option<String>,

    /// No-login flag passed to the client
    #[arg(long, value_name = "FLAG", allow_hyphen_values = true, help = "Flag that starts the client without a login [default: /NOLOG]")]
    pub no_login_flag: Option<String>,

    /// Environment variable pointing the client at its home
    #[arg(long, value_name = "VAR", conflicts_with = "no_home_env", help = "Variable set to the client home for the client [default: ORACLE_HOME]")]
    pub home_env: Option<String>,

    /// Do not export the client home to the client
    #[arg(long, help = "Do not set any home variable for the client")]
    pub no_home_env: bool,

    /// Extra client arguments
    #[arg(long = "client-arg", value_name = "ARG", allow_hyphen_values = true, help = "Extra argument for the client (repeatable)")]
    pub client_args: Vec<String>,

    /// Secret buffer size
    #[arg(long, value_name = "BYTES", help = "Maximum bytes captured from each provider [default: 512]")]
    pub secret_capacity: Option<usize>,

    /// Fail instead of truncating long provider output
    #[arg(long, help = "Fail when a provider prints more than the secret capacity")]
    pub reject_oversized_secrets: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE", help = "JSON configuration file; command-line values take precedence")]
    pub config: Option<PathBuf>,

    /// Debug tracing
    #[arg(short, long, help = "Print debug messages (never credential values)")]
    pub debug: bool,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Verbosity controls shared by all invocations
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all diagnostics except errors")]
    pub quiet: bool,
}

/// Session settings read from a `--config` file.
///
/// Every field is optional; whatever the command line leaves unset is taken
/// from here, and whatever is still missing afterwards is a usage error.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Connection-string template
    pub connect_template: Option<String>,
    /// Client installation root
    pub client_home: Option<PathBuf>,
    /// Username provider command
    pub username_program: Option<String>,
    /// Password provider command
    pub password_program: Option<String>,
    /// Client launch settings
    pub client: Option<ClientConfig>,
    /// Secret buffer size
    pub secret_capacity: Option<usize>,
    /// Handling of oversized provider output
    pub truncation: Option<TruncationPolicy>,
    /// Debug tracing
    pub debug: Option<bool>,
}

/// Reads and parses a JSON configuration file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid JSON for
/// [`FileConfig`]
pub fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

impl Cli {
    /// Merges the command line over `file` and validates the result.
    ///
    /// # Errors
    /// Returns a configuration error listing every missing required value,
    /// or the first validation failure
    pub fn session_config(&self, file: FileConfig) -> safe_connect_core::Result<SessionConfig> {
        let connect_template = self.connect_template.clone().or(file.connect_template);
        let client_home = self.client_home.clone().or(file.client_home);
        let username_program = self.username_program.clone().or(file.username_program);
        let password_program = self.password_program.clone().or(file.password_program);

        let mut missing = Vec::new();
        if connect_template.is_none() {
            missing.push("You must specify a connection template (-t)");
        }
        if client_home.is_none() {
            missing.push("You must specify the client home (-o)");
        }
        if username_program.is_none() {
            missing.push("You must specify a username program (-u)");
        }
        if password_program.is_none() {
            missing.push("You must specify a password program (-p)");
        }

        let (
            Some(connect_template),
            Some(client_home),
            Some(username_program),
            Some(password_program),
        ) = (connect_template, client_home, username_program, password_program)
        else {
            return Err(SafeConnectError::configuration(missing.join("; ")));
        };

        let mut client = file.client.unwrap_or_default();
        if let Some(program) = &self.client {
            client.program.clone_from(program);
        }
        if let Some(flag) = &self.no_login_flag {
            client.no_login_flag.clone_from(flag);
        }
        if self.no_home_env {
            client.home_env = None;
        } else if let Some(var) = &self.home_env {
            client.home_env = Some(var.clone());
        }
        client.extra_args.extend(self.client_args.iter().cloned());

        let truncation = if self.reject_oversized_secrets {
            TruncationPolicy::Reject
        } else {
            file.truncation.unwrap_or_default()
        };

        let config = SessionConfig::new(
            connect_template,
            client_home,
            username_program,
            password_program,
        )
        .with_client(client)
        .with_secret_capacity(
            self.secret_capacity
                .or(file.secret_capacity)
                .unwrap_or(DEFAULT_SECRET_CAPACITY),
        )
        .with_truncation(truncation)
        .with_debug(self.debug || file.debug.unwrap_or(false));

        config.validate()?;
        Ok(config)
    }
}

/// Converts a session status into a process exit code.
///
/// Statuses outside `0..=255` cannot be represented and become 1.
pub fn exit_status(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
