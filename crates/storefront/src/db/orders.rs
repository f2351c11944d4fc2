//! Order repository.
//!
//! An order is written in one transaction together with its lines and any
//! address it adds or updates, and the same transaction empties the user's
//! cart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use shop_core::{
    AddressId, InvoiceAddressId, OrderId, OrderStatus, PaymentMethodId, ShippingCarrierId, UserId,
};

use super::addresses::{insert_address, insert_invoice_address, overwrite_invoice_address};
use super::{RepositoryError, map_write_error, quantity_from_db, quantity_to_db};
use crate::checkout::ports::OrderService;
use crate::models::{
    AddressFields, InvoiceAddressFields, InvoiceAddressInput, NewOrder, Order, OrderAddress,
    OrderInvoiceAddress, OrderLine, ShippingAddressInput,
};

const ORDER_COLUMNS: &str = "id, user_id, status, \
    shipping_address_id, ship_firstname, ship_lastname, ship_country, ship_region, \
    ship_city, ship_address, ship_zip, ship_phone, \
    invoice_address_id, invoice_vat, invoice_name, invoice_phone, invoice_country, \
    invoice_address, invoice_region, invoice_city, invoice_zip, \
    shipping_carrier_id, payment_method_id, price, taxes, created_at";

#[derive(FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: OrderStatus,
    shipping_address_id: i32,
    ship_firstname: String,
    ship_lastname: String,
    ship_country: String,
    ship_region: String,
    ship_city: String,
    ship_address: String,
    ship_zip: String,
    ship_phone: String,
    invoice_address_id: Option<i32>,
    invoice_vat: Option<String>,
    invoice_name: Option<String>,
    invoice_phone: Option<String>,
    invoice_country: Option<String>,
    invoice_address: Option<String>,
    invoice_region: Option<String>,
    invoice_city: Option<String>,
    invoice_zip: Option<String>,
    shipping_carrier_id: i32,
    payment_method_id: i32,
    price: Decimal,
    taxes: Decimal,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        let invoice_address = self.invoice_address_id.map(|id| OrderInvoiceAddress {
            source_id: InvoiceAddressId::new(id),
            fields: InvoiceAddressFields {
                vat: self.invoice_vat.unwrap_or_default(),
                name: self.invoice_name.unwrap_or_default(),
                phone: self.invoice_phone.unwrap_or_default(),
                country: self.invoice_country.unwrap_or_default(),
                address: self.invoice_address.unwrap_or_default(),
                region: self.invoice_region.unwrap_or_default(),
                city: self.invoice_city.unwrap_or_default(),
                zip: self.invoice_zip.unwrap_or_default(),
            },
        });

        Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            status: self.status,
            shipping_address: OrderAddress {
                source_id: AddressId::new(self.shipping_address_id),
                fields: AddressFields {
                    firstname: self.ship_firstname,
                    lastname: self.ship_lastname,
                    country: self.ship_country,
                    region: self.ship_region,
                    city: self.ship_city,
                    address: self.ship_address,
                    zip: self.ship_zip,
                    phone: self.ship_phone,
                },
            },
            invoice_address,
            shipping_carrier_id: ShippingCarrierId::new(self.shipping_carrier_id),
            payment_method_id: PaymentMethodId::new(self.payment_method_id),
            price: self.price,
            taxes: self.taxes,
            lines,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct OrderLineRow {
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

/// Repository for `storefront.order` and `storefront.order_line`.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lines_of(&self, order_id: i32) -> Result<Vec<OrderLine>, RepositoryError> {
        sqlx::query_as::<_, OrderLineRow>(
            "SELECT product_name, unit_price, quantity FROM storefront.order_line \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect()
    }
}

#[async_trait]
impl OrderService for OrderRepository {
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let lines = order.order_lines();

        // Rolled back on drop, so an early return leaves no address behind.
        let mut tx = self.pool.begin().await?;

        let shipping_address = match &order.shipping_address {
            ShippingAddressInput::Stored(address) => address.clone(),
            ShippingAddressInput::New(fields) => {
                insert_address(&mut *tx, order.user_id, fields).await?
            }
        };
        let invoice = match &order.invoice_address {
            None => None,
            Some(InvoiceAddressInput::New(fields)) => {
                Some(insert_invoice_address(&mut *tx, order.user_id, fields).await?)
            }
            Some(InvoiceAddressInput::Update(id, fields)) => {
                Some(overwrite_invoice_address(&mut *tx, order.user_id, *id, fields).await?)
            }
        };
        let invoice = invoice.as_ref();
        let ship = &shipping_address.fields;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.order ( \
                 user_id, status, \
                 shipping_address_id, ship_firstname, ship_lastname, ship_country, ship_region, \
                 ship_city, ship_address, ship_zip, ship_phone, \
                 invoice_address_id, invoice_vat, invoice_name, invoice_phone, invoice_country, \
                 invoice_address, invoice_region, invoice_city, invoice_zip, \
                 shipping_carrier_id, payment_method_id, price, taxes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18, $19, $20, $21, $22, $23, $24) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id.as_i32())
        .bind(OrderStatus::PendingPayment)
        .bind(shipping_address.id.as_i32())
        .bind(&ship.firstname)
        .bind(&ship.lastname)
        .bind(&ship.country)
        .bind(&ship.region)
        .bind(&ship.city)
        .bind(&ship.address)
        .bind(&ship.zip)
        .bind(&ship.phone)
        .bind(invoice.map(|i| i.id.as_i32()))
        .bind(invoice.map(|i| i.fields.vat.as_str()))
        .bind(invoice.map(|i| i.fields.name.as_str()))
        .bind(invoice.map(|i| i.fields.phone.as_str()))
        .bind(invoice.map(|i| i.fields.country.as_str()))
        .bind(invoice.map(|i| i.fields.address.as_str()))
        .bind(invoice.map(|i| i.fields.region.as_str()))
        .bind(invoice.map(|i| i.fields.city.as_str()))
        .bind(invoice.map(|i| i.fields.zip.as_str()))
        .bind(order.shipping_carrier.id.as_i32())
        .bind(order.payment_method.id.as_i32())
        .bind(order.price)
        .bind(order.taxes)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        for line in &lines {
            sqlx::query(
                "INSERT INTO storefront.order_line (order_id, product_name, unit_price, quantity) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(&line.product_name)
            .bind(line.unit_price)
            .bind(quantity_to_db(line.quantity)?)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(order.user_id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into_order(lines))
    }

    #[instrument(skip(self))]
    async fn order_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1 AND user_id = $2"
        ))
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.lines_of(row.id).await?;
                Ok(Some(row.into_order(lines)))
            }
            None => Ok(None),
        }
    }
}
