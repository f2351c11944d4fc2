//! Cart domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shop_core::CartLineId;

/// One product line in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// Unit price times quantity, before tax handling.
    #[must_use]
    pub fn line_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The current contents of a user's cart, handed to order creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartContents {
    pub lines: Vec<CartLine>,
}

impl CartContents {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all line prices, before tax handling.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_price).sum()
    }
}

/// Cart totals plus the store tax settings they were computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Cart total, tax included.
    pub total_price: Decimal,
    /// Tax part of the cart total.
    pub total_taxes: Decimal,
    /// Fractional tax rate (e.g., 0.21).
    pub tax_ratio: Decimal,
    /// Whether catalog prices already contain tax.
    pub prices_include_tax: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtotal_sums_lines() {
        let cart = CartContents {
            lines: vec![
                CartLine {
                    id: CartLineId::new(1),
                    product_name: "Dried mango".to_string(),
                    unit_price: Decimal::new(450, 2),
                    quantity: 2,
                },
                CartLine {
                    id: CartLineId::new(2),
                    product_name: "Coconut chips".to_string(),
                    unit_price: Decimal::new(300, 2),
                    quantity: 1,
                },
            ],
        };
        assert_eq!(cart.subtotal(), Decimal::new(1200, 2));
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let cart = CartContents::default();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Decimal::ZERO);
    }
}
