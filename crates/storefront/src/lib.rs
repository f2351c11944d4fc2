//! Shop Storefront library.
//!
//! This crate provides the checkout step as a library, allowing it to be
//! tested and reused. The [`checkout`] module holds the flow itself; the
//! remaining modules wire it to `PostgreSQL`, sessions and HTTP.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
