//! VPN management adapters.
//!
//! - `OutlineProvisioner` - HTTP client for Outline-compatible servers
//! - `MockProvisioner` - In-memory provisioner for tests
//! - `build_registry` - Per-country registry from provisioning config

mod client;
mod mock_provisioner;
mod registry;

pub use client::{OutlineConfig, OutlineProvisioner};
pub use mock_provisioner::MockProvisioner;
pub use registry::build_registry;
