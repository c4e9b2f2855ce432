//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to external systems:
//! - `http` - Internal REST API for the chat front end
//! - `memory` - In-memory repositories (tests, local runs)
//! - `outline` - VPN management API clients
//! - `postgres` - PostgreSQL repositories
//! - `telegram` - Chat notifications

pub mod http;
pub mod memory;
pub mod outline;
pub mod postgres;
pub mod telegram;
