//! Child process plumbing.
//!
//! - `supervisor`: owns one child, watches it while the parent blocks on pipes
//! - `provider`: runs a credential provider and captures its output line

pub mod provider;
pub mod supervisor;

pub use provider::{CredentialProvider, CredentialRole, ProgramProvider, drain, read_line_into};
pub use supervisor::{ChildExit, ChildRole, Race, Supervisor};
