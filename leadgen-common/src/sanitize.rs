//! Sanitization of untrusted form input
//!
//! Every value submitted through the public intake form goes through
//! [`validate_input`] before it is stored or placed into a prompt.

use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde_json::Value;

/// Maximum accepted email length
pub const MAX_EMAIL_LEN: usize = 254;

/// Hard cap applied to every sanitized value before any per-field cap
pub const MAX_TEXT_LEN: usize = 1000;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is a valid regex")
});

/// Trim, strip NUL bytes, HTML-escape `< > & " '` and cap at [`MAX_TEXT_LEN`] characters
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\0' => {}
            other => out.push(other),
        }
    }
    let cut = out.char_indices().nth(MAX_TEXT_LEN).map(|(end, _)| end);
    if let Some(end) = cut {
        out.truncate(end);
    }
    out
}

/// Sanitize a JSON form value and cap it at `max_len` characters
///
/// Anything that is not a JSON string (missing, null, number, object)
/// becomes the empty string, which callers treat as "not provided".
pub fn validate_input(value: Option<&Value>, max_len: usize) -> String {
    match value {
        Some(Value::String(s)) => validate_str(s, max_len),
        _ => String::new(),
    }
}

/// Sanitize a plain string and cap it at `max_len` characters
pub fn validate_str(value: &str, max_len: usize) -> String {
    sanitize_text(value).chars().take(max_len).collect()
}

/// Basic email shape check (`local@domain.tld`, at most 254 chars)
pub fn validate_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

/// Public, non-sequential identifier used in shareable result links
///
/// 16 random bytes rendered as 32 lowercase hex characters.
pub fn generate_short_hash() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// True when `s` has the shape of a short hash
pub fn is_short_hash(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
