//! Access domain module.
//!
//! An access key is the local record of a credential provisioned on a
//! remote VPN-management server. For each (user, country) there is at
//! most one key whose `revoked_at` is unset; revocation is one-way.

mod access_key;
mod errors;

pub use access_key::{remote_key_name, AccessKey, NewAccessKey};
pub use errors::AccessKeyError;
