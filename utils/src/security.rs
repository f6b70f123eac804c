//! Security utilities for sanitization and redaction.
//!
//! These functions keep bearer tokens out of logs and keep backend-provided
//! text from smuggling terminal escape sequences into the interactive shell.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug)]
struct TokenRedactor {
    bearer: Regex,
    jwt: Regex,
}

impl TokenRedactor {
    fn new() -> Option<Self> {
        let bearer = Regex::new(r"(?i)\b(bearer)\s+[A-Za-z0-9\-._~+/]+=*").ok()?;
        let jwt = Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").ok()?;
        Some(Self { bearer, jwt })
    }

    fn redact<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        let pass = self.bearer.replace_all(raw, "$1 [REDACTED]");
        match self.jwt.replace_all(&pass, "[REDACTED]") {
            Cow::Borrowed(_) => pass,
            Cow::Owned(v) => Cow::Owned(v),
        }
    }
}

static TOKEN_REDACTOR: OnceLock<Option<TokenRedactor>> = OnceLock::new();

/// Redact bearer tokens and JWTs from a string.
///
/// - `Bearer <token>` → `Bearer [REDACTED]`
/// - `eyJ...` three-segment JWTs → `[REDACTED]`
#[must_use]
pub fn redact_tokens(raw: &str) -> String {
    match TOKEN_REDACTOR.get_or_init(TokenRedactor::new) {
        Some(redactor) => redactor.redact(raw).into_owned(),
        // Fail closed: if the patterns cannot be built, show nothing.
        None => "[REDACTED]".to_string(),
    }
}

/// Strip control characters (ANSI escapes included) from untrusted text.
///
/// Newlines and tabs are kept; everything else in the C0/C1 ranges and DEL is dropped.
#[must_use]
pub fn sanitize_display_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // CSI: ESC [ params final-byte
            if chars.peek() == Some(&'[') {
                chars.next();
                for next in chars.by_ref() {
                    if ('@'..='~').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if ch == '\n' || ch == '\t' || !ch.is_control() {
            out.push(ch);
        }
    }
    out
}
