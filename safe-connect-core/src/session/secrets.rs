//! The credentials of one session and the connect line built from them.
//!
//! `SessionSecrets` is the single owner of the username, the password and
//! the expanded connection command. It scrubs all three as soon as the
//! preamble has been handed to the client, and again when dropped, so every
//! exit path out of the orchestrator leaves zeroed memory behind.

use crate::config::Preamble;
use crate::secret::SecretBuf;
use crate::template::expand;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use zeroize::ZeroizeOnDrop;

/// Prefix of the line that logs the client in.
pub const CONNECT_PREFIX: &[u8] = b"connect ";

/// Username, password and connection command for one session.
#[derive(Debug)]
pub struct SessionSecrets {
    username: SecretBuf,
    password: SecretBuf,
    command: SecretBuf,
}

impl SessionSecrets {
    /// Takes ownership of both credentials.
    pub fn new(username: SecretBuf, password: SecretBuf) -> Self {
        Self {
            username,
            password,
            command: SecretBuf::with_capacity(0),
        }
    }

    /// Expands `template` into the connection command, replacing any earlier
    /// rendering.
    pub fn render(&mut self, template: &str) {
        self.command = expand(template, &self.username, &self.password);
    }

    /// The rendered connection command (empty before `render`).
    pub fn connection_command(&self) -> &[u8] {
        self.command.as_bytes()
    }

    /// Writes the substitution-off directive, the connect line and the
    /// substitution-on directive, each newline-terminated, then flushes.
    ///
    /// # Errors
    /// Returns the underlying I/O error; a dead client surfaces as
    /// `BrokenPipe`
    pub async fn write_preamble<W>(&self, writer: &mut W, preamble: &Preamble) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(preamble.disable_substitution.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
        writer.write_all(CONNECT_PREFIX).await?;
        writer.write_all(self.command.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer
            .write_all(preamble.enable_substitution.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Renders the command, writes the preamble and scrubs, in that order.
    ///
    /// Scrubbing happens whether or not the write succeeded.
    ///
    /// # Errors
    /// Returns the write error after scrubbing
    pub async fn deliver<W>(
        &mut self,
        writer: &mut W,
        template: &str,
        preamble: &Preamble,
    ) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.render(template);
        tracing::debug!(
            "Sending connect command to client ({} bytes)",
            self.command.len()
        );
        let written = self.write_preamble(writer, preamble).await;
        self.scrub();
        written
    }

    /// Zeroes username, password and connection command.
    pub fn scrub(&mut self) {
        self.username.scrub();
        self.password.scrub();
        self.command.scrub();
    }

    /// True when all three buffers are empty and all-zero.
    pub fn is_scrubbed(&self) -> bool {
        self.username.is_scrubbed() && self.password.is_scrubbed() && self.command.is_scrubbed()
    }
}

impl Drop for SessionSecrets {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl ZeroizeOnDrop for SessionSecrets {}
