//! HTTP middleware for axum.
//!
//! - `internal_auth` - Bearer shared-secret check for the internal API

pub mod internal_auth;

pub use internal_auth::{internal_auth_middleware, InternalToken};
