//! In-memory implementations of every checkout collaborator.
//!
//! Used by tests and local demos. All data sits behind one lock, and order
//! creation holds it while it stores addresses, adds the order and clears the
//! cart, matching the database transaction it stands in for.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use shop_core::{
    AddressId, CartLineId, InvoiceAddressId, OrderId, OrderStatus, PaymentMethodId,
    ShippingCarrierId, UserId,
};

use super::flow::CheckoutServices;
use super::ports::{
    AddressBook, CartService, OrderService, PaymentMethodCatalog, ShippingCarrierCatalog,
    StaticCountryDirectory, TaxPolicy,
};
use super::totals::apply_tax;
use crate::config::TaxConfig;
use crate::db::RepositoryError;
use crate::models::{
    Address, AddressFields, CartContents, CartLine, InvoiceAddress, InvoiceAddressFields,
    InvoiceAddressInput, NewOrder, Order, OrderAddress, OrderInvoiceAddress, PaymentMethod,
    ShippingAddressInput, ShippingCarrier,
};

#[derive(Default)]
struct ShopData {
    last_id: i32,
    addresses: Vec<Address>,
    invoice_addresses: Vec<InvoiceAddress>,
    shipping_carriers: Vec<ShippingCarrier>,
    payment_methods: Vec<PaymentMethod>,
    cart_lines: BTreeMap<UserId, Vec<CartLine>>,
    orders: Vec<Order>,
    writes: usize,
    orders_unavailable: bool,
}

impl ShopData {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn insert_address(&mut self, user_id: UserId, fields: &AddressFields) -> Address {
        let favorite = !self.addresses.iter().any(|address| address.user_id == user_id);
        let address = Address {
            id: AddressId::new(self.next_id()),
            user_id,
            fields: fields.clone(),
            favorite,
        };
        self.addresses.push(address.clone());
        self.writes += 1;
        address
    }

    fn insert_invoice_address(
        &mut self,
        user_id: UserId,
        fields: &InvoiceAddressFields,
    ) -> InvoiceAddress {
        let invoice_address = InvoiceAddress {
            id: InvoiceAddressId::new(self.next_id()),
            user_id,
            fields: fields.clone(),
        };
        self.invoice_addresses.push(invoice_address.clone());
        self.writes += 1;
        invoice_address
    }

    fn owns_invoice_address(&self, user_id: UserId, id: InvoiceAddressId) -> bool {
        self.invoice_addresses
            .iter()
            .any(|invoice_address| invoice_address.id == id && invoice_address.user_id == user_id)
    }

    fn overwrite_invoice_address(
        &mut self,
        user_id: UserId,
        id: InvoiceAddressId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError> {
        let invoice_address = self
            .invoice_addresses
            .iter_mut()
            .find(|invoice_address| invoice_address.id == id && invoice_address.user_id == user_id)
            .ok_or(RepositoryError::NotFound)?;
        invoice_address.fields = fields.clone();
        let updated = invoice_address.clone();
        self.writes += 1;
        Ok(updated)
    }
}

/// A whole shop held in memory.
///
/// Cloning shares the same data.
#[derive(Clone)]
pub struct InMemoryShop {
    data: Arc<RwLock<ShopData>>,
    tax: TaxConfig,
}

impl InMemoryShop {
    #[must_use]
    pub fn new(tax: TaxConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(ShopData::default())),
            tax,
        }
    }

    /// Checkout services all backed by this shop.
    #[must_use]
    pub fn services(&self) -> CheckoutServices {
        CheckoutServices {
            addresses: Arc::new(self.clone()),
            shipping_carriers: Arc::new(self.clone()),
            payment_methods: Arc::new(self.clone()),
            cart: Arc::new(self.clone()),
            taxes: Arc::new(self.tax),
            orders: Arc::new(self.clone()),
            countries: Arc::new(StaticCountryDirectory),
        }
    }

    /// Seed a shipping address without counting it as a checkout write.
    pub async fn add_address(&self, user_id: UserId, fields: AddressFields, favorite: bool) -> Address {
        let mut data = self.data.write().await;
        let address = Address {
            id: AddressId::new(data.next_id()),
            user_id,
            fields,
            favorite,
        };
        data.addresses.push(address.clone());
        address
    }

    /// Seed an invoice address without counting it as a checkout write.
    pub async fn add_invoice_address(
        &self,
        user_id: UserId,
        fields: InvoiceAddressFields,
    ) -> InvoiceAddress {
        let mut data = self.data.write().await;
        let invoice_address = InvoiceAddress {
            id: InvoiceAddressId::new(data.next_id()),
            user_id,
            fields,
        };
        data.invoice_addresses.push(invoice_address.clone());
        invoice_address
    }

    pub async fn add_shipping_carrier(
        &self,
        name: &str,
        price: Decimal,
        enabled: bool,
    ) -> ShippingCarrier {
        let mut data = self.data.write().await;
        let carrier = ShippingCarrier {
            id: ShippingCarrierId::new(data.next_id()),
            name: name.to_string(),
            price,
            enabled,
        };
        data.shipping_carriers.push(carrier.clone());
        carrier
    }

    pub async fn add_payment_method(&self, name: &str, price: Decimal, enabled: bool) -> PaymentMethod {
        let mut data = self.data.write().await;
        let method = PaymentMethod {
            id: PaymentMethodId::new(data.next_id()),
            name: name.to_string(),
            price,
            enabled,
        };
        data.payment_methods.push(method.clone());
        method
    }

    pub async fn add_cart_line(
        &self,
        user_id: UserId,
        product_name: &str,
        unit_price: Decimal,
        quantity: u32,
    ) -> CartLine {
        let mut data = self.data.write().await;
        let line = CartLine {
            id: CartLineId::new(data.next_id()),
            product_name: product_name.to_string(),
            unit_price,
            quantity,
        };
        data.cart_lines.entry(user_id).or_default().push(line.clone());
        line
    }

    /// All orders created so far.
    pub async fn orders(&self) -> Vec<Order> {
        self.data.read().await.orders.clone()
    }

    /// Number of writes made through the collaborator traits.
    pub async fn writes(&self) -> usize {
        self.data.read().await.writes
    }

    /// Make order creation fail, as if the store were down.
    pub async fn set_orders_unavailable(&self, unavailable: bool) {
        self.data.write().await.orders_unavailable = unavailable;
    }

    async fn cart_subtotal(&self, user_id: UserId) -> Decimal {
        self.data
            .read()
            .await
            .cart_lines
            .get(&user_id)
            .map_or(Decimal::ZERO, |lines| lines.iter().map(CartLine::line_price).sum())
    }
}

#[async_trait]
impl AddressBook for InMemoryShop {
    async fn addresses_of(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let data = self.data.read().await;
        let mut addresses: Vec<Address> = data
            .addresses
            .iter()
            .filter(|address| address.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by_key(|address| (!address.favorite, address.id));
        Ok(addresses)
    }

    async fn address_for_user(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .addresses
            .iter()
            .find(|address| address.id == id && address.user_id == user_id)
            .cloned())
    }

    async fn create_address(
        &self,
        user_id: UserId,
        fields: &AddressFields,
    ) -> Result<Address, RepositoryError> {
        Ok(self.data.write().await.insert_address(user_id, fields))
    }

    async fn invoice_addresses_of(
        &self,
        user_id: UserId,
    ) -> Result<Vec<InvoiceAddress>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .invoice_addresses
            .iter()
            .filter(|invoice_address| invoice_address.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn invoice_address_for_user(
        &self,
        user_id: UserId,
        id: InvoiceAddressId,
    ) -> Result<Option<InvoiceAddress>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .invoice_addresses
            .iter()
            .find(|invoice_address| invoice_address.id == id && invoice_address.user_id == user_id)
            .cloned())
    }

    async fn create_invoice_address(
        &self,
        user_id: UserId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError> {
        Ok(self.data.write().await.insert_invoice_address(user_id, fields))
    }

    async fn update_invoice_address(
        &self,
        user_id: UserId,
        id: InvoiceAddressId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError> {
        self.data
            .write()
            .await
            .overwrite_invoice_address(user_id, id, fields)
    }
}

#[async_trait]
impl ShippingCarrierCatalog for InMemoryShop {
    async fn find_by_id(
        &self,
        id: ShippingCarrierId,
    ) -> Result<Option<ShippingCarrier>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .shipping_carriers
            .iter()
            .find(|carrier| carrier.id == id)
            .cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<ShippingCarrier>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .shipping_carriers
            .iter()
            .filter(|carrier| carrier.enabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentMethodCatalog for InMemoryShop {
    async fn find_by_id(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .payment_methods
            .iter()
            .find(|method| method.id == id)
            .cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .payment_methods
            .iter()
            .filter(|method| method.enabled)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CartService for InMemoryShop {
    async fn total_price(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        let subtotal = self.cart_subtotal(user_id).await;
        Ok(apply_tax(subtotal, self.tax.tax_ratio(), self.tax.prices_include_tax()).0)
    }

    async fn total_taxes(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        let subtotal = self.cart_subtotal(user_id).await;
        Ok(apply_tax(subtotal, self.tax.tax_ratio(), self.tax.prices_include_tax()).1)
    }

    async fn current(&self, user_id: UserId) -> Result<CartContents, RepositoryError> {
        let data = self.data.read().await;
        Ok(CartContents {
            lines: data.cart_lines.get(&user_id).cloned().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl OrderService for InMemoryShop {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut data = self.data.write().await;
        if data.orders_unavailable {
            return Err(RepositoryError::Unavailable("order store is down".to_string()));
        }
        // Every check happens before the first write.
        if let Some(InvoiceAddressInput::Update(id, _)) = &order.invoice_address
            && !data.owns_invoice_address(order.user_id, *id)
        {
            return Err(RepositoryError::NotFound);
        }

        let lines = order.order_lines();
        let shipping_address = match order.shipping_address {
            ShippingAddressInput::Stored(address) => address,
            ShippingAddressInput::New(fields) => data.insert_address(order.user_id, &fields),
        };
        let invoice_address = match order.invoice_address {
            None => None,
            Some(InvoiceAddressInput::New(fields)) => {
                Some(data.insert_invoice_address(order.user_id, &fields))
            }
            Some(InvoiceAddressInput::Update(id, fields)) => {
                Some(data.overwrite_invoice_address(order.user_id, id, &fields)?)
            }
        };

        let created = Order {
            id: OrderId::new(data.next_id()),
            user_id: order.user_id,
            status: OrderStatus::PendingPayment,
            shipping_address: OrderAddress {
                source_id: shipping_address.id,
                fields: shipping_address.fields,
            },
            invoice_address: invoice_address.map(|invoice_address| OrderInvoiceAddress {
                source_id: invoice_address.id,
                fields: invoice_address.fields,
            }),
            shipping_carrier_id: order.shipping_carrier.id,
            payment_method_id: order.payment_method.id,
            price: order.price,
            taxes: order.taxes,
            lines,
            created_at: Utc::now(),
        };
        data.orders.push(created.clone());
        data.cart_lines.remove(&order.user_id);
        data.writes += 1;
        Ok(created)
    }

    async fn order_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let data = self.data.read().await;
        Ok(data
            .orders
            .iter()
            .find(|order| order.id == id && order.user_id == user_id)
            .cloned())
    }
}
