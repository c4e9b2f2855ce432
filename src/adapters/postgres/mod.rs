//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresUserRepository` - Users keyed by external chat id
//! - `PostgresSubscriptionRepository` - Entitlement windows and the expiry scan
//! - `PostgresAccessKeyRepository` - Local records of remote credentials
//! - `PostgresPromocodeRepository` - Promocodes and per-user usage rows
//! - `PostgresPaymentRepository` - Payment audit trail
//! - `PostgresCountryRequestRepository` - Requests for new locations

mod access_key_repository;
mod country_request_repository;
mod payment_repository;
mod pool;
mod promocode_repository;
mod subscription_repository;
mod user_repository;

pub use access_key_repository::PostgresAccessKeyRepository;
pub use country_request_repository::PostgresCountryRequestRepository;
pub use payment_repository::PostgresPaymentRepository;
pub use pool::{connect, run_migrations, DatabaseError};
pub use promocode_repository::PostgresPromocodeRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use user_repository::PostgresUserRepository;
