//! HTTP adapters - REST API implementations.

pub mod internal;
pub mod middleware;

pub use internal::{app_router, EngineAppState};
pub use middleware::InternalToken;
