//! Request/response data structures.

pub mod users;
