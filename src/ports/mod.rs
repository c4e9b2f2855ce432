//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Repository Ports
//!
//! - `UserRepository` - Users keyed by external platform id
//! - `SubscriptionRepository` - Entitlement rows and their atomic writes
//! - `AccessKeyRepository` - Local records of remote credentials
//! - `PromocodeRepository` - Promocodes and per-user usages
//! - `PaymentRepository` - Append-only payment log
//! - `CountryRequestRepository` - Requests for locations not offered yet
//!
//! ## External Service Ports
//!
//! - `VpnProvisioner` - Remote VPN-management API, resolved per country
//!   through `ProvisionerRegistry`
//! - `Notifier` - Chat notifications

mod access_key_repository;
mod country_request_repository;
mod notifier;
mod payment_repository;
mod promocode_repository;
mod subscription_repository;
mod user_repository;
mod vpn_provisioner;

pub use access_key_repository::AccessKeyRepository;
pub use country_request_repository::CountryRequestRepository;
pub use notifier::{NotificationError, Notifier};
pub use payment_repository::PaymentRepository;
pub use promocode_repository::PromocodeRepository;
pub use subscription_repository::{Extension, SubscriptionRepository};
pub use user_repository::UserRepository;
pub use vpn_provisioner::{
    ProvisionerRegistry, ProvisioningError, RegisteredServer, RemoteCredential, VpnProvisioner,
};
