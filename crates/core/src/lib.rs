//! Shop Core - Shared types library.
//!
//! This crate provides common types used across all shop components:
//! - `storefront` - Public-facing site serving the checkout step
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and static data - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, statuses and countries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
