//! Bastion Types - Shared domain types
//!
//! This crate contains domain types used across Bastion crates:
//! - Principal identity and identity normalization
//! - Role tags carried inside issued tokens

pub mod error;
pub mod principal;
pub mod role;

pub use error::*;
pub use principal::*;
pub use role::*;
