//! Cart repository.
//!
//! The cart itself is filled elsewhere; checkout only reads it and order
//! creation empties it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use shop_core::{CartLineId, UserId};

use super::{RepositoryError, quantity_from_db};
use crate::checkout::ports::{CartService, TaxPolicy};
use crate::checkout::totals::apply_tax;
use crate::config::TaxConfig;
use crate::models::{CartContents, CartLine};

#[derive(FromRow)]
struct CartLineRow {
    id: i32,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CartLineId::new(row.id),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: quantity_from_db(row.quantity)?,
        })
    }
}

/// Repository for `storefront.cart_line`.
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
    tax: TaxConfig,
}

impl CartRepository {
    #[must_use]
    pub const fn new(pool: PgPool, tax: TaxConfig) -> Self {
        Self { pool, tax }
    }

    async fn subtotal(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        let subtotal: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(unit_price * quantity) FROM storefront.cart_line WHERE user_id = $1",
        )
        .bind(user_id.as_i32())
        .fetch_one(&self.pool)
        .await?;

        Ok(subtotal.unwrap_or(Decimal::ZERO))
    }
}

#[async_trait]
impl CartService for CartRepository {
    #[instrument(skip(self))]
    async fn total_price(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        let subtotal = self.subtotal(user_id).await?;
        Ok(apply_tax(subtotal, self.tax.tax_ratio(), self.tax.prices_include_tax()).0)
    }

    #[instrument(skip(self))]
    async fn total_taxes(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        let subtotal = self.subtotal(user_id).await?;
        Ok(apply_tax(subtotal, self.tax.tax_ratio(), self.tax.prices_include_tax()).1)
    }

    #[instrument(skip(self))]
    async fn current(&self, user_id: UserId) -> Result<CartContents, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT id, product_name, unit_price, quantity FROM storefront.cart_line \
             WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(CartLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CartContents { lines })
    }
}
