//! Integration tests for the shop storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Checkout flow against the in-memory shop
//! cargo test -p shop-integration-tests
//!
//! # Postgres repositories (needs a migrated database)
//! STOREFRONT_DATABASE_URL=postgres://localhost/shop_test \
//!     cargo test -p shop-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Checkout flow end to end, in memory
//! - `postgres_repositories` - Repository round trips against `PostgreSQL`

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use shop_core::{CartLineId, UserId};
use shop_storefront::checkout::CheckoutServices;
use shop_storefront::checkout::memory::InMemoryShop;
use shop_storefront::checkout::ports::CartService;
use shop_storefront::config::TaxConfig;
use shop_storefront::db::RepositoryError;
use shop_storefront::models::{
    AddressFields, CartContents, CartLine, InvoiceAddressFields, PaymentMethod, ShippingCarrier,
};

/// The shopper most tests check out as.
pub const SHOPPER: UserId = UserId::new(1);

/// Someone else, owning addresses the shopper must not reach.
pub const OTHER_SHOPPER: UserId = UserId::new(2);

/// A complete shipping address.
#[must_use]
pub fn filled_address(city: &str) -> AddressFields {
    AddressFields {
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        country: "GB".to_string(),
        region: "Greater London".to_string(),
        city: city.to_string(),
        address: "12 St James's Square".to_string(),
        zip: "SW1Y 4JH".to_string(),
        phone: "+44 20 7946 0000".to_string(),
    }
}

/// A complete invoice address.
#[must_use]
pub fn filled_invoice(name: &str) -> InvoiceAddressFields {
    InvoiceAddressFields {
        vat: "GB123456789".to_string(),
        name: name.to_string(),
        phone: "+44 20 7946 0001".to_string(),
        country: "GB".to_string(),
        address: "1 Analytical Row".to_string(),
        region: "Greater London".to_string(),
        city: "London".to_string(),
        zip: "EC1A 1BB".to_string(),
    }
}

/// In-memory shop with a cart for [`SHOPPER`] and one enabled carrier and
/// payment method.
pub struct StockedShop {
    pub shop: InMemoryShop,
    pub carrier: ShippingCarrier,
    pub payment_method: PaymentMethod,
}

impl StockedShop {
    /// 10% tax on top of prices; cart of 2 x 45.00, carrier 5.00, payment 2.00.
    pub async fn new() -> Self {
        let shop = InMemoryShop::new(TaxConfig::new(Decimal::new(1, 1), false));
        shop.add_cart_line(SHOPPER, "Walnut desk organiser", Decimal::new(4500, 2), 2)
            .await;
        let carrier = shop
            .add_shipping_carrier("Courier", Decimal::new(5, 0), true)
            .await;
        let payment_method = shop
            .add_payment_method("Card", Decimal::new(2, 0), true)
            .await;
        Self {
            shop,
            carrier,
            payment_method,
        }
    }

    #[must_use]
    pub fn services(&self) -> CheckoutServices {
        self.shop.services()
    }
}

/// Cart with fixed totals, for checking the totals arithmetic in isolation.
#[derive(Debug, Clone, Copy)]
pub struct FixedCart {
    pub price: Decimal,
    pub taxes: Decimal,
}

#[async_trait]
impl CartService for FixedCart {
    async fn total_price(&self, _user_id: UserId) -> Result<Decimal, RepositoryError> {
        Ok(self.price)
    }

    async fn total_taxes(&self, _user_id: UserId) -> Result<Decimal, RepositoryError> {
        Ok(self.taxes)
    }

    async fn current(&self, _user_id: UserId) -> Result<CartContents, RepositoryError> {
        Ok(CartContents {
            lines: vec![CartLine {
                id: CartLineId::new(1),
                product_name: "Gift card".to_string(),
                unit_price: self.price,
                quantity: 1,
            }],
        })
    }
}

/// Replace the cart of `services` with fixed totals.
#[must_use]
pub fn with_fixed_cart(mut services: CheckoutServices, cart: FixedCart) -> CheckoutServices {
    services.cart = Arc::new(cart);
    services
}
