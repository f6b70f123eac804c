//! Shared infrastructure utilities for the verifier client.
//!
//! This crate provides cross-cutting utilities that multiple verifier crates need
//! but that don't belong in the domain-pure `verifier-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename) and removal
//! - **`security`**: Bearer token redaction and terminal-safe display text

pub mod atomic_write;
pub mod security;

pub use atomic_write::{atomic_write, remove_if_exists};
pub use security::{redact_tokens, sanitize_display_text};
