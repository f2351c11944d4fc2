//! Shipping carriers and payment methods offered at checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shop_core::{PaymentMethodId, ShippingCarrierId};

/// A flat-priced option that adds a surcharge to the order total.
pub trait Surcharge {
    /// Price before tax handling.
    fn price(&self) -> Decimal;

    /// Disabled options are hidden and never contribute to totals.
    fn is_enabled(&self) -> bool;
}

/// A shipping method with a flat price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingCarrier {
    pub id: ShippingCarrierId,
    pub name: String,
    pub price: Decimal,
    pub enabled: bool,
}

impl Surcharge for ShippingCarrier {
    fn price(&self) -> Decimal {
        self.price
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A payment option with a flat surcharge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub price: Decimal,
    pub enabled: bool,
}

impl Surcharge for PaymentMethod {
    fn price(&self) -> Decimal {
        self.price
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
