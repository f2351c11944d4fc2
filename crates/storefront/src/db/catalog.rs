//! Shipping carrier and payment method repositories.
//!
//! Both tables share the same shape: a name, a flat price and an enabled flag.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use shop_core::{PaymentMethodId, ShippingCarrierId};

use super::{RepositoryError, map_write_error};
use crate::checkout::ports::{PaymentMethodCatalog, ShippingCarrierCatalog};
use crate::models::{PaymentMethod, ShippingCarrier};

#[derive(FromRow)]
struct CatalogRow {
    id: i32,
    name: String,
    price: Decimal,
    enabled: bool,
}

impl From<CatalogRow> for ShippingCarrier {
    fn from(row: CatalogRow) -> Self {
        Self {
            id: ShippingCarrierId::new(row.id),
            name: row.name,
            price: row.price,
            enabled: row.enabled,
        }
    }
}

impl From<CatalogRow> for PaymentMethod {
    fn from(row: CatalogRow) -> Self {
        Self {
            id: PaymentMethodId::new(row.id),
            name: row.name,
            price: row.price,
            enabled: row.enabled,
        }
    }
}

async fn find_row(pool: &PgPool, table: &str, id: i32) -> Result<Option<CatalogRow>, RepositoryError> {
    Ok(sqlx::query_as::<_, CatalogRow>(&format!(
        "SELECT id, name, price, enabled FROM storefront.{table} WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

async fn enabled_rows(pool: &PgPool, table: &str) -> Result<Vec<CatalogRow>, RepositoryError> {
    Ok(sqlx::query_as::<_, CatalogRow>(&format!(
        "SELECT id, name, price, enabled FROM storefront.{table} WHERE enabled ORDER BY price, id"
    ))
    .fetch_all(pool)
    .await?)
}

/// Insert or update an option by name.
async fn upsert_row(
    pool: &PgPool,
    table: &str,
    name: &str,
    price: Decimal,
    enabled: bool,
) -> Result<CatalogRow, RepositoryError> {
    sqlx::query_as::<_, CatalogRow>(&format!(
        "INSERT INTO storefront.{table} (name, price, enabled) VALUES ($1, $2, $3) \
         ON CONFLICT (name) DO UPDATE SET price = EXCLUDED.price, enabled = EXCLUDED.enabled \
         RETURNING id, name, price, enabled"
    ))
    .bind(name)
    .bind(price)
    .bind(enabled)
    .fetch_one(pool)
    .await
    .map_err(map_write_error)
}

/// Repository for `storefront.shipping_carrier`.
#[derive(Clone)]
pub struct ShippingCarrierRepository {
    pool: PgPool,
}

impl ShippingCarrierRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a carrier, or update the one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        name: &str,
        price: Decimal,
        enabled: bool,
    ) -> Result<ShippingCarrier, RepositoryError> {
        Ok(upsert_row(&self.pool, "shipping_carrier", name, price, enabled)
            .await?
            .into())
    }
}

#[async_trait]
impl ShippingCarrierCatalog for ShippingCarrierRepository {
    #[instrument(skip(self))]
    async fn find_by_id(
        &self,
        id: ShippingCarrierId,
    ) -> Result<Option<ShippingCarrier>, RepositoryError> {
        Ok(find_row(&self.pool, "shipping_carrier", id.as_i32())
            .await?
            .map(ShippingCarrier::from))
    }

    #[instrument(skip(self))]
    async fn list_enabled(&self) -> Result<Vec<ShippingCarrier>, RepositoryError> {
        Ok(enabled_rows(&self.pool, "shipping_carrier")
            .await?
            .into_iter()
            .map(ShippingCarrier::from)
            .collect())
    }
}

/// Repository for `storefront.payment_method`.
#[derive(Clone)]
pub struct PaymentMethodRepository {
    pool: PgPool,
}

impl PaymentMethodRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a payment method, or update the one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        name: &str,
        price: Decimal,
        enabled: bool,
    ) -> Result<PaymentMethod, RepositoryError> {
        Ok(upsert_row(&self.pool, "payment_method", name, price, enabled)
            .await?
            .into())
    }
}

#[async_trait]
impl PaymentMethodCatalog for PaymentMethodRepository {
    #[instrument(skip(self))]
    async fn find_by_id(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepositoryError> {
        Ok(find_row(&self.pool, "payment_method", id.as_i32())
            .await?
            .map(PaymentMethod::from))
    }

    #[instrument(skip(self))]
    async fn list_enabled(&self) -> Result<Vec<PaymentMethod>, RepositoryError> {
        Ok(enabled_rows(&self.pool, "payment_method")
            .await?
            .into_iter()
            .map(PaymentMethod::from)
            .collect())
    }
}
