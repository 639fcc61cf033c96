//! Database layer for data persistence and access.
//!
//! ```text
//! caller ──► validation ──► mutation::execute ──► conflict::ConflictTranslator
//!                               │                        (on unique violation)
//!                               ▼
//!                         one transaction, one statement, one row
//!
//! reads ──► query::build_filter ──► handlers (repositories) ──► PostgreSQL
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: repositories for each table
//! - [`models`]: database record structures
//! - [`mutation`]: the transactional single-statement engine
//! - [`query`]: whitelisted, parameterized filter construction
//! - [`conflict`]: unique-constraint to field translation
//! - [`errors`]: database-specific error types

pub mod conflict;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod mutation;
pub mod query;
