//! Request and response shapes exchanged over the HTTP API.
//!
//! Everything here serializes as camelCase JSON via `serde`.

pub mod listing;
pub mod upload;
