//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Client identification (network origin attribution from request headers)

pub mod client;
