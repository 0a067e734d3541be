//! Connection-string template expansion.
//!
//! The template is scanned once, left to right. At each position the literal
//! tokens `{{username}}` and `{{password}}` are checked; a match appends the
//! corresponding secret verbatim and skips past the token, anything else is
//! copied one byte at a time. Secrets are never rescanned, so a secret that
//! itself contains `{{password}}` is emitted as-is.

use crate::secret::SecretBuf;

/// Placeholder replaced with the username.
pub const USERNAME_PLACEHOLDER: &str = "{{username}}";

/// Placeholder replaced with the password.
pub const PASSWORD_PLACEHOLDER: &str = "{{password}}";

/// Expands `template` with the given credentials into a scrubbable buffer.
///
/// The output starts at the template's length and grows geometrically as
/// secrets are appended.
///
/// # Example
/// ```rust
/// use safe_connect_core::secret::SecretBuf;
/// use safe_connect_core::template::expand;
///
/// let username = SecretBuf::from_bytes(b"alice");
/// let password = SecretBuf::from_bytes(b"s3cret!");
/// let command = expand("{{username}}/\"{{password}}\"@DB", &username, &password);
/// assert_eq!(command.as_bytes(), b"alice/\"s3cret!\"@DB");
/// ```
pub fn expand(template: &str, username: &SecretBuf, password: &SecretBuf) -> SecretBuf {
    let source = template.as_bytes();
    let mut output = SecretBuf::with_capacity(source.len());
    let mut position = 0;

    while position < source.len() {
        let rest = &source[position..];
        if rest.starts_with(USERNAME_PLACEHOLDER.as_bytes()) {
            output.push_bytes(username.as_bytes());
            position += USERNAME_PLACEHOLDER.len();
        } else if rest.starts_with(PASSWORD_PLACEHOLDER.as_bytes()) {
            output.push_bytes(password.as_bytes());
            position += PASSWORD_PLACEHOLDER.len();
        } else {
            output.push_bytes(&rest[..1]);
            position += 1;
        }
    }

    output
}

/// Counts the placeholders in a template without expanding it.
///
/// Returns `(username_count, password_count)`. Used for diagnostics only.
pub fn placeholder_counts(template: &str) -> (usize, usize) {
    let source = template.as_bytes();
    let mut counts = (0, 0);
    let mut position = 0;

    while position < source.len() {
        let rest = &source[position..];
        if rest.starts_with(USERNAME_PLACEHOLDER.as_bytes()) {
            counts.0 += 1;
            position += USERNAME_PLACEHOLDER.len();
        } else if rest.starts_with(PASSWORD_PLACEHOLDER.as_bytes()) {
            counts.1 += 1;
            position += PASSWORD_PLACEHOLDER.len();
        } else {
            position += 1;
        }
    }

    counts
}
