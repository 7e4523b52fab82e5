//! Domain Layer
//!
//! Key derivation, policy values, and the counter store contract.

pub mod key;
pub mod policy;
pub mod repository;
