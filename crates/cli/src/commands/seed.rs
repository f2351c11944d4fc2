//! Seed checkout options from a YAML file.
//!
//! Carriers and payment methods are matched by name, so running the command
//! again updates prices and the enabled flag instead of duplicating rows.
//!
//! ```yaml
//! shipping_carriers:
//!   - name: Courier
//!     price: "4.95"
//! payment_methods:
//!   - name: Cash on delivery
//!     price: "2.50"
//!     enabled: false
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use shop_core::{CurrencyCode, Price};
use shop_storefront::db::{self, PaymentMethodRepository, ShippingCarrierRepository};

/// Contents of a catalog seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub shipping_carriers: Vec<CatalogEntry>,
    #[serde(default)]
    pub payment_methods: Vec<CatalogEntry>,
}

/// One carrier or payment method.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl CatalogFile {
    /// Number of entries in the file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shipping_carriers.len() + self.payment_methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check a catalog file for problems the database would not catch.
///
/// Returns one message per problem; an empty list means the file is usable.
#[must_use]
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    for (section, entries) in [
        ("shipping_carriers", &catalog.shipping_carriers),
        ("payment_methods", &catalog.payment_methods),
    ] {
        let mut seen = HashSet::new();
        for entry in entries {
            let name = entry.name.trim();
            if name.is_empty() {
                errors.push(format!("{section}: entry with empty name"));
                continue;
            }
            if !seen.insert(name) {
                errors.push(format!("{section}: duplicate name '{name}'"));
            }
            if entry.price.is_sign_negative() {
                errors.push(format!("{section}: '{name}' has negative price"));
            }
        }
    }
    errors
}

/// Seed shipping carriers and payment methods from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML catalog file
/// * `dry_run` - If true, only parse and validate the file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a database write fails.
pub async fn catalog(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    info!(entries = catalog.len(), "Parsed catalog");

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Dry run: catalog is valid, nothing written");
        return Ok(());
    }

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let currency = CurrencyCode::default();

    let carriers = ShippingCarrierRepository::new(pool.clone());
    for entry in &catalog.shipping_carriers {
        let carrier = carriers
            .upsert(entry.name.trim(), entry.price, entry.enabled)
            .await?;
        info!(
            id = %carrier.id,
            price = %Price::new(carrier.price, currency),
            enabled = carrier.enabled,
            "Shipping carrier '{}' saved",
            carrier.name
        );
    }

    let methods = PaymentMethodRepository::new(pool);
    for entry in &catalog.payment_methods {
        let method = methods
            .upsert(entry.name.trim(), entry.price, entry.enabled)
            .await?;
        info!(
            id = %method.id,
            price = %Price::new(method.price, currency),
            enabled = method.enabled,
            "Payment method '{}' saved",
            method.name
        );
    }

    info!("Seeding complete!");
    info!("  Shipping carriers: {}", catalog.shipping_carriers.len());
    info!("  Payment methods: {}", catalog.payment_methods.len());

    Ok(())
}
