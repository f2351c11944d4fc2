//! Order price and tax aggregation.
//!
//! Totals are always rebuilt from the cart snapshot plus the selected
//! surcharges; nothing is ever added incrementally to a previous total.

use rust_decimal::Decimal;

use super::selection::Totals;
use crate::models::{CartSnapshot, PaymentMethod, ShippingCarrier, Surcharge};

/// Split a raw amount into what it adds to the price total and the tax total.
///
/// Tax is always `amount * tax_ratio`. It is added on top of the price only
/// when catalog prices do not already contain it.
#[must_use]
pub fn apply_tax(amount: Decimal, tax_ratio: Decimal, prices_include_tax: bool) -> (Decimal, Decimal) {
    let tax = amount * tax_ratio;
    let price = if prices_include_tax { amount } else { amount + tax };
    (price, tax)
}

/// Compute checkout totals: the cart plus carrier, then payment method.
///
/// Missing or disabled surcharges contribute nothing.
#[must_use]
pub fn compute_totals(
    cart: &CartSnapshot,
    shipping_carrier: Option<&ShippingCarrier>,
    payment_method: Option<&PaymentMethod>,
) -> Totals {
    let surcharges: [Option<&dyn Surcharge>; 2] = [
        shipping_carrier.map(|carrier| carrier as &dyn Surcharge),
        payment_method.map(|method| method as &dyn Surcharge),
    ];

    surcharges
        .into_iter()
        .flatten()
        .filter(|surcharge| surcharge.is_enabled())
        .fold(
            Totals {
                price: cart.total_price,
                taxes: cart.total_taxes,
            },
            |totals, surcharge| {
                let (price, tax) =
                    apply_tax(surcharge.price(), cart.tax_ratio, cart.prices_include_tax);
                Totals {
                    price: totals.price + price,
                    taxes: totals.taxes + tax,
                }
            },
        )
}
