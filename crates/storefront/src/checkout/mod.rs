//! Checkout: address selection, surcharges, totals and order submission.
//!
//! # Flow
//!
//! 1. [`CheckoutFlow::start`] preselects the favorite shipping address and
//!    computes totals from the cart.
//! 2. The form changes the selection one field at a time; every carrier or
//!    payment method change recomputes totals from scratch.
//! 3. [`CheckoutFlow::submit`] validates everything, stores the addresses and
//!    creates the order through [`ports::OrderService`].
//!
//! The flow talks to its collaborators only through the traits in [`ports`],
//! so it runs the same against Postgres ([`crate::db`]) and memory
//! ([`memory::InMemoryShop`]).

pub mod flow;
pub mod memory;
pub mod ports;
pub mod selection;
pub mod totals;
pub mod validation;

pub use flow::{CheckoutError, CheckoutFlow, CheckoutOptions, CheckoutServices, CheckoutSnapshot};
pub use selection::{AddressChoice, CheckoutSelection, InvoiceChoice, Totals};
pub use validation::{FieldError, Rule, ValidationError};
