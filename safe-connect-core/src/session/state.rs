//! Session lifecycle states.

use std::fmt;

/// Where a session is in its strictly sequential pipeline.
///
/// `Done` and `Failed` are terminal. There is no transition back to an
/// earlier state: a failed session is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing acquired yet
    Init,
    /// Username provider succeeded
    UsernameAcquired,
    /// Password provider succeeded
    PasswordAcquired,
    /// Client running, preamble being written
    ClientSpawned,
    /// Copying the user's input to the client
    Relaying,
    /// Client terminated; its status is the session's status
    Done,
    /// A stage failed; the session's status is that stage's status
    Failed,
}

impl SessionState {
    /// True for `Done` and `Failed`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub const fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Init, Self::UsernameAcquired)
            | (Self::UsernameAcquired, Self::PasswordAcquired)
            | (Self::PasswordAcquired, Self::ClientSpawned)
            | (Self::ClientSpawned, Self::Relaying)
            | (Self::Relaying, Self::Done) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::UsernameAcquired => "username-acquired",
            Self::PasswordAcquired => "password-acquired",
            Self::ClientSpawned => "client-spawned",
            Self::Relaying => "relaying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
