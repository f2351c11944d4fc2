//! Collaborators the checkout flow reads from and writes to.
//!
//! Postgres implementations live in `crate::db`; in-memory ones in
//! [`super::memory`].

use async_trait::async_trait;
use rust_decimal::Decimal;

use shop_core::{
    AddressId, COUNTRIES, Country, InvoiceAddressId, OrderId, PaymentMethodId, ShippingCarrierId,
    UserId,
};

use crate::db::RepositoryError;
use crate::models::{
    Address, AddressFields, CartContents, InvoiceAddress, InvoiceAddressFields, NewOrder, Order,
    PaymentMethod, ShippingCarrier,
};

/// A user's shipping and invoice addresses.
///
/// Every lookup is scoped to the owning user; an address owned by someone
/// else is reported as absent.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// All shipping addresses of the user, favorite first.
    async fn addresses_of(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError>;

    async fn address_for_user(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError>;

    /// Store a new shipping address. The user's first address becomes favorite.
    async fn create_address(
        &self,
        user_id: UserId,
        fields: &AddressFields,
    ) -> Result<Address, RepositoryError>;

    /// All invoice addresses of the user, oldest first.
    async fn invoice_addresses_of(
        &self,
        user_id: UserId,
    ) -> Result<Vec<InvoiceAddress>, RepositoryError>;

    async fn invoice_address_for_user(
        &self,
        user_id: UserId,
        id: InvoiceAddressId,
    ) -> Result<Option<InvoiceAddress>, RepositoryError>;

    async fn create_invoice_address(
        &self,
        user_id: UserId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError>;

    /// Overwrite the fields of an existing invoice address.
    ///
    /// Returns `RepositoryError::NotFound` if the user does not own `id`.
    async fn update_invoice_address(
        &self,
        user_id: UserId,
        id: InvoiceAddressId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError>;
}

#[async_trait]
pub trait ShippingCarrierCatalog: Send + Sync {
    /// Find a carrier whether enabled or not.
    async fn find_by_id(
        &self,
        id: ShippingCarrierId,
    ) -> Result<Option<ShippingCarrier>, RepositoryError>;

    async fn list_enabled(&self) -> Result<Vec<ShippingCarrier>, RepositoryError>;
}

#[async_trait]
pub trait PaymentMethodCatalog: Send + Sync {
    /// Find a payment method whether enabled or not.
    async fn find_by_id(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepositoryError>;

    async fn list_enabled(&self) -> Result<Vec<PaymentMethod>, RepositoryError>;
}

/// The user's cart.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Cart total, tax included.
    async fn total_price(&self, user_id: UserId) -> Result<Decimal, RepositoryError>;

    /// Tax part of the cart total.
    async fn total_taxes(&self, user_id: UserId) -> Result<Decimal, RepositoryError>;

    async fn current(&self, user_id: UserId) -> Result<CartContents, RepositoryError>;
}

/// Store-wide tax settings.
pub trait TaxPolicy: Send + Sync {
    fn tax_ratio(&self) -> Decimal;

    fn prices_include_tax(&self) -> bool;
}

#[async_trait]
pub trait OrderService: Send + Sync {
    /// Create the order, its lines, and empty the user's cart, atomically.
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn order_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Countries offered in the address forms.
pub trait CountryDirectory: Send + Sync {
    fn all(&self) -> Vec<Country>;
}

/// Country directory backed by the built-in ISO 3166 table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCountryDirectory;

impl CountryDirectory for StaticCountryDirectory {
    fn all(&self) -> Vec<Country> {
        COUNTRIES.to_vec()
    }
}
