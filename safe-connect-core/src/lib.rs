//! Core pipeline for safe-connect.
//!
//! safe-connect launches an interactive database client without ever placing
//! the username or password on a command line or in an environment variable,
//! where other users on the host could read them from process listings.
//! Both credentials come from external provider programs, are substituted
//! into a connection template, and are streamed into the client's stdin
//! before the user's own input is relayed through.
//!
//! # Security Guarantees
//! - Credentials only ever travel over pipes between parent and child
//! - Secret buffers are zeroed as soon as the client has them, and on drop
//! - Secrets never appear in logs, errors or `Debug` output
//! - A failing provider stops the run before anything else is started
//!
//! # Architecture
//! - `command`: whitespace tokenizer producing argument vectors
//! - `process`: child supervision and the credential provider runner
//! - `template`: `{{username}}`/`{{password}}` expansion
//! - `session`: the sequential orchestrator and its secret bundle
//! - `signals`: fatal fault diagnostics

pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod secret;
pub mod session;
pub mod signals;
pub mod template;

// Re-export commonly used types
pub use command::{ArgVector, tokenize};
pub use config::{ClientConfig, Preamble, SessionConfig, TruncationPolicy};
pub use error::{INTERNAL_EXIT_CODE, Result, SafeConnectError};
pub use logging::init_logging;
pub use process::{ChildExit, CredentialProvider, CredentialRole, ProgramProvider};
pub use secret::SecretBuf;
pub use session::{Session, SessionOutcome, SessionState};
pub use signals::install_fault_handlers;
