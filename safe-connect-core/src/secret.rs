//! Scrubbable byte buffers for credentials and the connection command.
//!
//! `SecretBuf` owns a single heap allocation. When it has to grow, the new
//! allocation is filled first and the old one is zeroed before release, so
//! no stale copy of a secret is left behind in freed memory. The buffer is
//! scrubbed again when dropped.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Capacity of the buffer a single provider line is captured into.
pub const DEFAULT_SECRET_CAPACITY: usize = 512;

/// A bounded, explicitly scrubbable byte buffer.
///
/// # Security
/// - `Debug` never prints contents
/// - Growth never leaves an unscrubbed copy behind
/// - Dropping the buffer zeroes its whole allocation
pub struct SecretBuf {
    storage: Box<[u8]>,
    len: usize,
}

impl SecretBuf {
    /// Allocates a zero-filled buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0_u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Copies `bytes` into a new buffer sized exactly to fit.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::with_capacity(bytes.len());
        buf.push_bytes(bytes);
        buf
    }

    /// Bytes currently held.
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the underlying allocation.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// True when no more bytes fit without growing.
    pub fn is_full(&self) -> bool {
        self.len == self.storage.len()
    }

    /// Unused tail of the allocation, for reading into directly.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.len..]
    }

    /// Marks `count` bytes of the spare tail as filled.
    ///
    /// Clamped to the capacity.
    pub fn advance(&mut self, count: usize) {
        self.len = self.len.saturating_add(count).min(self.storage.len());
    }

    /// Appends bytes, growing the allocation geometrically when needed.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let needed = self.len.saturating_add(bytes.len());
        if needed > self.storage.len() {
            self.grow_to(needed);
        }
        let end = self.len + bytes.len();
        self.storage[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Removes exactly one trailing `\n`, if present.
    ///
    /// Returns whether a newline was removed.
    pub fn strip_trailing_newline(&mut self) -> bool {
        if self.as_bytes().last() == Some(&b'\n') {
            self.len -= 1;
            self.storage[self.len] = 0;
            true
        } else {
            false
        }
    }

    /// Shortens the buffer to `len` bytes, zeroing everything after it.
    ///
    /// Has no effect when `len` is not shorter than the current length.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            Zeroize::zeroize(&mut self.storage[len..self.len]);
            self.len = len;
        }
    }

    /// Overwrites the whole allocation with zero bytes and empties the buffer.
    pub fn scrub(&mut self) {
        Zeroize::zeroize(&mut self.storage[..]);
        self.len = 0;
    }

    /// True when the buffer is empty and every byte of its allocation is zero.
    pub fn is_scrubbed(&self) -> bool {
        self.len == 0 && self.storage.iter().all(|b| *b == 0)
    }

    fn grow_to(&mut self, needed: usize) {
        let mut capacity = self.storage.len().max(1);
        while capacity < needed {
            capacity = capacity.saturating_mul(2);
        }

        let mut next = vec![0_u8; capacity].into_boxed_slice();
        next[..self.len].copy_from_slice(&self.storage[..self.len]);
        let mut previous = std::mem::replace(&mut self.storage, next);
        Zeroize::zeroize(&mut previous[..]);
        tracing::trace!("Secret buffer grew to {} bytes", capacity);
    }
}

impl Zeroize for SecretBuf {
    fn zeroize(&mut self) {
        self.scrub();
    }
}

impl Drop for SecretBuf {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl ZeroizeOnDrop for SecretBuf {}

impl fmt::Debug for SecretBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuf([REDACTED; {} bytes])", self.len)
    }
}
