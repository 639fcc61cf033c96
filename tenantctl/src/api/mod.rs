//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers, plus the generic CRUD dispatcher they share
//! - **[`models`]**: Request/response data structures for API communication
//!
//! All routes live under `/api/v1` and are documented with `utoipa`; the
//! document is served at `/api/v1/openapi.json`.

pub mod handlers;
pub mod models;
