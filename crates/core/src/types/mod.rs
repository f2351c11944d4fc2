//! Core types for the shop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod country;
pub mod id;
pub mod price;
pub mod status;

pub use country::{COUNTRIES, Country, country_name};
pub use id::*;
pub use price::{CurrencyCode, CurrencyCodeError, Price};
pub use status::*;
