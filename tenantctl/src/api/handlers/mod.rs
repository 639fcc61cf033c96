//! HTTP request handlers.
//!
//! - [`crud`]: validate, authorize and mutate in a fixed order for any resource
//! - [`users`]: the `/users` routes
//!
//! Handlers take the caller as a [`CurrentUser`](crate::api::models::users::CurrentUser)
//! extractor, so an unidentified request is rejected before any handler body runs.

pub mod crud;
pub mod users;
