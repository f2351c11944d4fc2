//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::checkout::CheckoutServices;
use crate::checkout::ports::StaticCountryDirectory;
use crate::config::StorefrontConfig;
use crate::db::{
    AddressRepository, CartRepository, OrderRepository, PaymentMethodRepository,
    ShippingCarrierRepository,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    checkout: CheckoutServices,
}

impl AppState {
    /// Create application state backed by `PostgreSQL` repositories.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let tax = config.store.tax;
        let checkout = CheckoutServices {
            addresses: Arc::new(AddressRepository::new(pool.clone())),
            shipping_carriers: Arc::new(ShippingCarrierRepository::new(pool.clone())),
            payment_methods: Arc::new(PaymentMethodRepository::new(pool.clone())),
            cart: Arc::new(CartRepository::new(pool.clone(), tax)),
            taxes: Arc::new(tax),
            orders: Arc::new(OrderRepository::new(pool.clone())),
            countries: Arc::new(StaticCountryDirectory),
        };
        Self::with_services(config, pool, checkout)
    }

    /// Create application state with explicit checkout collaborators.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        pool: PgPool,
        checkout: CheckoutServices,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Collaborators used to build checkout flows.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutServices {
        &self.inner.checkout
    }
}
