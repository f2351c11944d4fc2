//! Shipping and invoice address repository.

use async_trait::async_trait;
use sqlx::{FromRow, PgExecutor, PgPool};
use tracing::instrument;

use shop_core::{AddressId, InvoiceAddressId, UserId};

use super::{RepositoryError, map_write_error};
use crate::checkout::ports::AddressBook;
use crate::models::{Address, AddressFields, InvoiceAddress, InvoiceAddressFields};

const ADDRESS_COLUMNS: &str =
    "id, user_id, firstname, lastname, country, region, city, address, zip, phone, favorite";

const INVOICE_ADDRESS_COLUMNS: &str =
    "id, user_id, vat, name, phone, country, address, region, city, zip";

#[derive(FromRow)]
struct AddressRow {
    id: i32,
    user_id: i32,
    firstname: String,
    lastname: String,
    country: String,
    region: String,
    city: String,
    address: String,
    zip: String,
    phone: String,
    favorite: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            fields: AddressFields {
                firstname: row.firstname,
                lastname: row.lastname,
                country: row.country,
                region: row.region,
                city: row.city,
                address: row.address,
                zip: row.zip,
                phone: row.phone,
            },
            favorite: row.favorite,
        }
    }
}

#[derive(FromRow)]
struct InvoiceAddressRow {
    id: i32,
    user_id: i32,
    vat: String,
    name: String,
    phone: String,
    country: String,
    address: String,
    region: String,
    city: String,
    zip: String,
}

impl From<InvoiceAddressRow> for InvoiceAddress {
    fn from(row: InvoiceAddressRow) -> Self {
        Self {
            id: InvoiceAddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            fields: InvoiceAddressFields {
                vat: row.vat,
                name: row.name,
                phone: row.phone,
                country: row.country,
                address: row.address,
                region: row.region,
                city: row.city,
                zip: row.zip,
            },
        }
    }
}

/// Repository for `storefront.address` and `storefront.invoice_address`.
#[derive(Clone)]
pub struct AddressRepository {
    pool: PgPool,
}

impl AddressRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressBook for AddressRepository {
    #[instrument(skip(self))]
    async fn addresses_of(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address \
             WHERE user_id = $1 ORDER BY favorite DESC, id"
        ))
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    #[instrument(skip(self))]
    async fn address_for_user(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    #[instrument(skip(self, fields))]
    async fn create_address(
        &self,
        user_id: UserId,
        fields: &AddressFields,
    ) -> Result<Address, RepositoryError> {
        insert_address(&self.pool, user_id, fields).await
    }

    #[instrument(skip(self))]
    async fn invoice_addresses_of(
        &self,
        user_id: UserId,
    ) -> Result<Vec<InvoiceAddress>, RepositoryError> {
        let rows = sqlx::query_as::<_, InvoiceAddressRow>(&format!(
            "SELECT {INVOICE_ADDRESS_COLUMNS} FROM storefront.invoice_address \
             WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InvoiceAddress::from).collect())
    }

    #[instrument(skip(self))]
    async fn invoice_address_for_user(
        &self,
        user_id: UserId,
        id: InvoiceAddressId,
    ) -> Result<Option<InvoiceAddress>, RepositoryError> {
        let row = sqlx::query_as::<_, InvoiceAddressRow>(&format!(
            "SELECT {INVOICE_ADDRESS_COLUMNS} FROM storefront.invoice_address \
             WHERE id = $1 AND user_id = $2"
        ))
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InvoiceAddress::from))
    }

    #[instrument(skip(self, fields))]
    async fn create_invoice_address(
        &self,
        user_id: UserId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError> {
        insert_invoice_address(&self.pool, user_id, fields).await
    }

    #[instrument(skip(self, fields))]
    async fn update_invoice_address(
        &self,
        user_id: UserId,
        id: InvoiceAddressId,
        fields: &InvoiceAddressFields,
    ) -> Result<InvoiceAddress, RepositoryError> {
        overwrite_invoice_address(&self.pool, user_id, id, fields).await
    }
}

/// Insert a shipping address; the user's first address becomes the favorite.
///
/// Takes any executor so order creation can run it inside its transaction.
pub(super) async fn insert_address<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: UserId,
    fields: &AddressFields,
) -> Result<Address, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        "INSERT INTO storefront.address \
             (user_id, firstname, lastname, country, region, city, address, zip, phone, favorite) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, \
             NOT EXISTS (SELECT 1 FROM storefront.address WHERE user_id = $1)) \
         RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(user_id.as_i32())
    .bind(&fields.firstname)
    .bind(&fields.lastname)
    .bind(&fields.country)
    .bind(&fields.region)
    .bind(&fields.city)
    .bind(&fields.address)
    .bind(&fields.zip)
    .bind(&fields.phone)
    .fetch_one(executor)
    .await
    .map_err(map_write_error)?;

    Ok(row.into())
}

pub(super) async fn insert_invoice_address<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: UserId,
    fields: &InvoiceAddressFields,
) -> Result<InvoiceAddress, RepositoryError> {
    let row = sqlx::query_as::<_, InvoiceAddressRow>(&format!(
        "INSERT INTO storefront.invoice_address \
             (user_id, vat, name, phone, country, address, region, city, zip) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {INVOICE_ADDRESS_COLUMNS}"
    ))
    .bind(user_id.as_i32())
    .bind(&fields.vat)
    .bind(&fields.name)
    .bind(&fields.phone)
    .bind(&fields.country)
    .bind(&fields.address)
    .bind(&fields.region)
    .bind(&fields.city)
    .bind(&fields.zip)
    .fetch_one(executor)
    .await
    .map_err(map_write_error)?;

    Ok(row.into())
}

/// Returns `RepositoryError::NotFound` if the user does not own `id`.
pub(super) async fn overwrite_invoice_address<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: UserId,
    id: InvoiceAddressId,
    fields: &InvoiceAddressFields,
) -> Result<InvoiceAddress, RepositoryError> {
    let row = sqlx::query_as::<_, InvoiceAddressRow>(&format!(
        "UPDATE storefront.invoice_address \
         SET vat = $3, name = $4, phone = $5, country = $6, address = $7, \
             region = $8, city = $9, zip = $10, updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING {INVOICE_ADDRESS_COLUMNS}"
    ))
    .bind(id.as_i32())
    .bind(user_id.as_i32())
    .bind(&fields.vat)
    .bind(&fields.name)
    .bind(&fields.phone)
    .bind(&fields.country)
    .bind(&fields.address)
    .bind(&fields.region)
    .bind(&fields.city)
    .bind(&fields.zip)
    .fetch_optional(executor)
    .await
    .map_err(map_write_error)?;

    row.map(InvoiceAddress::from)
        .ok_or(RepositoryError::NotFound)
}
