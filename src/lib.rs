//! # Visiongate (authenticated object detection)
//!
//! `visiongate` is a small web service: users sign up, log in with a
//! cookie-backed session, and submit images to a pretrained object detector
//! that answers with an annotated JPEG.
//!
//! ## Accounts
//!
//! Credentials live in a single `users` table (PostgreSQL, or a local SQLite
//! file when no database is configured). Passwords are stored as bcrypt
//! hashes; inputs longer than 72 bytes are truncated before hashing.
//!
//! ## Sessions
//!
//! Sessions are held in process memory behind the [`auth::SessionStore`]
//! trait. The cookie carries the raw token, the registry only keeps its
//! SHA-256 digest. Sessions expire after a configurable TTL and are lost on
//! restart.
//!
//! ## Inference
//!
//! Uploaded images go through [`inference::InferencePool`], which bounds the
//! number of concurrent model calls, rejects work beyond a queue limit and
//! enforces a per-request timeout.

pub mod api;
pub mod auth;
pub mod cli;
pub mod inference;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
