//! HTTP adapter for the internal API called by the chat front end.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, EngineAppState};
pub use routes::{app_router, internal_routes};

#[cfg(test)]
mod tests;
