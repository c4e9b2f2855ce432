//! VPN Entitlements - Subscription, entitlement and access-key lifecycle engine
//!
//! This crate decides which user is entitled to VPN access for which
//! country and until when, binds that entitlement to a credential on a
//! remote VPN-management API, and reconciles the state as payments,
//! promocodes, referral bonuses and expirations occur.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
