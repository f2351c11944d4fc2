//! Domain models for the checkout step.
//!
//! These types represent validated domain objects separate from database row
//! types (see `crate::db`).

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod session;

pub use address::{Address, AddressFields, InvoiceAddress, InvoiceAddressFields};
pub use cart::{CartContents, CartLine, CartSnapshot};
pub use catalog::{PaymentMethod, ShippingCarrier, Surcharge};
pub use order::{
    InvoiceAddressInput, NewOrder, Order, OrderAddress, OrderInvoiceAddress, OrderLine,
    ShippingAddressInput,
};
pub use session::{CurrentUser, keys as session_keys};
