//! Order domain types.
//!
//! Orders copy the address fields they were placed with, so editing the
//! address book afterwards never changes a past order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shop_core::{
    AddressId, InvoiceAddressId, OrderId, OrderStatus, PaymentMethodId, ShippingCarrierId, UserId,
};

use super::address::{Address, AddressFields, InvoiceAddressFields};
use super::cart::CartContents;
use super::catalog::{PaymentMethod, ShippingCarrier};

/// Shipping address as recorded on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddress {
    pub source_id: AddressId,
    pub fields: AddressFields,
}

/// Invoice address as recorded on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInvoiceAddress {
    pub source_id: InvoiceAddressId,
    pub fields: InvoiceAddressFields,
}

/// A product line copied from the cart into the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// A placed order waiting for (or past) the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub shipping_address: OrderAddress,
    /// `None` when the shipping address doubles as invoice address.
    pub invoice_address: Option<OrderInvoiceAddress>,
    pub shipping_carrier_id: ShippingCarrierId,
    pub payment_method_id: PaymentMethodId,
    /// Grand total, tax included.
    pub price: Decimal,
    /// Tax part of the grand total.
    pub taxes: Decimal,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

/// Where the order ships to.
#[derive(Debug, Clone)]
pub enum ShippingAddressInput {
    /// A stored address, carrying the fields submitted with the order.
    Stored(Address),
    /// An address to add to the user's book together with the order.
    New(AddressFields),
}

/// Which invoice address the order bills to.
#[derive(Debug, Clone)]
pub enum InvoiceAddressInput {
    New(InvoiceAddressFields),
    /// Overwrite a stored invoice address with the submitted fields.
    Update(InvoiceAddressId, InvoiceAddressFields),
}

/// Everything needed to create an order at the end of checkout.
///
/// Address writes it carries are stored in the same unit as the order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub shipping_address: ShippingAddressInput,
    pub invoice_address: Option<InvoiceAddressInput>,
    pub shipping_carrier: ShippingCarrier,
    pub payment_method: PaymentMethod,
    pub cart: CartContents,
    pub price: Decimal,
    pub taxes: Decimal,
}

impl NewOrder {
    /// Copy the cart lines into order lines.
    #[must_use]
    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.cart
            .lines
            .iter()
            .map(|line| OrderLine {
                product_name: line.product_name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            })
            .collect()
    }
}
