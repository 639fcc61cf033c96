//! Caller identity and credential handling.
//!
//! - [`current_user`]: the `CurrentUser` extractor, resolved from a trusted proxy header
//! - [`password`]: Argon2 hashing of stored credentials

pub mod current_user;
pub mod password;
