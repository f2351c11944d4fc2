//! The checkout session object.
//!
//! A [`CheckoutFlow`] is rebuilt for every request from the selection kept in
//! the session, mutated through its `select_*`/`set_*`/`fill_*` methods and
//! queried through [`CheckoutFlow::snapshot`]. Totals are recomputed after
//! every change.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use shop_core::{
    AddressId, Country, InvoiceAddressId, OrderId, PaymentMethodId, ShippingCarrierId, UserId,
};

use super::ports::{
    AddressBook, CartService, CountryDirectory, OrderService, PaymentMethodCatalog,
    ShippingCarrierCatalog, TaxPolicy,
};
use super::selection::{AddressChoice, CheckoutSelection, InvoiceChoice, Totals};
use super::totals::compute_totals;
use super::validation::{FieldError, ValidationError, validate_selection};
use crate::db::RepositoryError;
use crate::models::{
    Address, AddressFields, CartSnapshot, InvoiceAddress, InvoiceAddressFields,
    InvoiceAddressInput, NewOrder, Order, PaymentMethod, ShippingAddressInput, ShippingCarrier,
};

/// Errors raised by checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The form failed validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The address does not exist or belongs to another user.
    #[error("address {0} not found")]
    AddressNotFound(AddressId),

    /// The invoice address does not exist or belongs to another user.
    #[error("invoice address {0} not found")]
    InvoiceAddressNotFound(InvoiceAddressId),

    /// Invoice fields were sent while no invoice address is requested.
    #[error("invoice form is hidden while no invoice address is requested")]
    InvoiceFormHidden,

    /// There is nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// The flow already produced an order.
    #[error("checkout already submitted as order {0}")]
    AlreadySubmitted(OrderId),

    /// A collaborator failed.
    #[error("store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Handles to every collaborator the flow needs.
///
/// Cheap to clone; shared by all requests.
#[derive(Clone)]
pub struct CheckoutServices {
    pub addresses: Arc<dyn AddressBook>,
    pub shipping_carriers: Arc<dyn ShippingCarrierCatalog>,
    pub payment_methods: Arc<dyn PaymentMethodCatalog>,
    pub cart: Arc<dyn CartService>,
    pub taxes: Arc<dyn TaxPolicy>,
    pub orders: Arc<dyn OrderService>,
    pub countries: Arc<dyn CountryDirectory>,
}

/// Read-only view of the flow for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSnapshot {
    pub price: Decimal,
    pub taxes: Decimal,
    pub validation_errors: Vec<FieldError>,
    pub address_choice: AddressChoice,
    pub invoice_choice: InvoiceChoice,
    pub show_invoice_form: bool,
    pub shipping_carrier_id: Option<ShippingCarrierId>,
    pub payment_method_id: Option<PaymentMethodId>,
    /// Set once the flow has been submitted.
    pub order_id: Option<OrderId>,
}

/// Data for the selection lists of the checkout form.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOptions {
    pub addresses: Vec<Address>,
    pub invoice_addresses: Vec<InvoiceAddress>,
    pub shipping_carriers: Vec<ShippingCarrier>,
    pub payment_methods: Vec<PaymentMethod>,
    pub countries: Vec<Country>,
}

/// One user's checkout in progress.
pub struct CheckoutFlow {
    services: CheckoutServices,
    user_id: UserId,
    selection: CheckoutSelection,
    validation_errors: Vec<FieldError>,
    placed_order: Option<OrderId>,
}

impl CheckoutFlow {
    /// Start a fresh checkout, preselecting the user's favorite address.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a collaborator fails.
    pub async fn start(services: CheckoutServices, user_id: UserId) -> Result<Self, CheckoutError> {
        Self::resume(services, user_id, CheckoutSelection::default()).await
    }

    /// Continue a checkout from a stored selection.
    ///
    /// Stored totals are discarded and recomputed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a collaborator fails.
    pub async fn resume(
        services: CheckoutServices,
        user_id: UserId,
        selection: CheckoutSelection,
    ) -> Result<Self, CheckoutError> {
        let mut flow = Self {
            services,
            user_id,
            selection,
            validation_errors: Vec::new(),
            placed_order: None,
        };
        if flow.selection.address_choice == AddressChoice::UseFavorite {
            flow.use_favorite_address().await?;
        }
        flow.recompute_totals().await?;
        Ok(flow)
    }

    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub const fn selection(&self) -> &CheckoutSelection {
        &self.selection
    }

    /// Give up the flow, keeping its selection for the session.
    #[must_use]
    pub fn into_selection(self) -> CheckoutSelection {
        self.selection
    }

    /// Choose the shipping address.
    ///
    /// `New` always binds an empty form. `Existing` loads the address and
    /// fails, leaving the state untouched, if the user does not own it.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::AddressNotFound` for a foreign or missing address.
    pub async fn select_address(&mut self, choice: AddressChoice) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        match choice {
            AddressChoice::New => {
                self.selection.address_choice = AddressChoice::New;
                self.selection.address = AddressFields::default();
            }
            AddressChoice::Existing(id) => {
                let address = self
                    .services
                    .addresses
                    .address_for_user(self.user_id, id)
                    .await?
                    .ok_or_else(|| {
                        warn!(user_id = %self.user_id, address_id = %id, "Address not owned by user");
                        CheckoutError::AddressNotFound(id)
                    })?;
                self.selection.address_choice = AddressChoice::Existing(address.id);
                self.selection.address = address.fields;
            }
            AddressChoice::UseFavorite => self.use_favorite_address().await?,
        }
        debug!(user_id = %self.user_id, choice = ?self.selection.address_choice, "Address selected");
        Ok(())
    }

    /// Choose the invoice address.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvoiceAddressNotFound` for a foreign or
    /// missing invoice address.
    pub async fn select_invoice_address(
        &mut self,
        choice: InvoiceChoice,
    ) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        let fields = match choice {
            InvoiceChoice::None | InvoiceChoice::New => InvoiceAddressFields::default(),
            InvoiceChoice::Existing(id) => {
                self.services
                    .addresses
                    .invoice_address_for_user(self.user_id, id)
                    .await?
                    .ok_or_else(|| {
                        warn!(user_id = %self.user_id, invoice_address_id = %id, "Invoice address not owned by user");
                        CheckoutError::InvoiceAddressNotFound(id)
                    })?
                    .fields
            }
        };
        self.selection.invoice_choice = choice;
        self.selection.invoice_address = fields;
        debug!(user_id = %self.user_id, choice = ?choice, "Invoice address selected");
        Ok(())
    }

    /// Bind typed values to the shipping address form.
    ///
    /// For an existing address the edited values only apply to this order;
    /// the stored address is left as is.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::AlreadySubmitted` after submission.
    pub fn fill_address(&mut self, fields: AddressFields) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        self.selection.address = fields;
        Ok(())
    }

    /// Bind typed values to the invoice address form.
    ///
    /// For an existing invoice address the values are saved onto it on submit.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvoiceFormHidden` when no invoice address is
    /// requested.
    pub fn fill_invoice_address(&mut self, fields: InvoiceAddressFields) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        if !self.selection.invoice_choice.shows_form() {
            return Err(CheckoutError::InvoiceFormHidden);
        }
        self.selection.invoice_address = fields;
        Ok(())
    }

    /// Select (or clear) the shipping carrier and refresh totals.
    ///
    /// Unknown ids are accepted here and rejected by validation. A disabled
    /// carrier is accepted and still passes validation, which only checks
    /// that it exists; it adds nothing to the totals.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if recomputing totals fails.
    pub async fn set_carrier(&mut self, id: Option<ShippingCarrierId>) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        self.selection.shipping_carrier_id = id;
        let totals = self.recompute_totals().await?;
        debug!(user_id = %self.user_id, carrier_id = ?id, price = %totals.price, "Shipping carrier set");
        Ok(())
    }

    /// Select (or clear) the payment method and refresh totals.
    ///
    /// Same rules as [`Self::set_carrier`]; disabled methods are not rejected.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if recomputing totals fails.
    pub async fn set_payment_method(
        &mut self,
        id: Option<PaymentMethodId>,
    ) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        self.selection.payment_method_id = id;
        let totals = self.recompute_totals().await?;
        debug!(user_id = %self.user_id, payment_method_id = ?id, price = %totals.price, "Payment method set");
        Ok(())
    }

    /// Rebuild price and tax totals from the cart and current selection.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the cart or catalog cannot be read.
    pub async fn recompute_totals(&mut self) -> Result<Totals, CheckoutError> {
        let cart = self.cart_snapshot().await?;
        let (shipping_carrier, payment_method) = self.selected_surcharges().await?;
        let totals = compute_totals(&cart, shipping_carrier.as_ref(), payment_method.as_ref());
        self.selection.totals = totals;
        Ok(totals)
    }

    /// Check the form, remembering the failures for [`Self::snapshot`].
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` listing every failing field.
    pub async fn validate(&mut self) -> Result<(ShippingCarrier, PaymentMethod), CheckoutError> {
        let (shipping_carrier, payment_method) = self.selected_surcharges().await?;
        match validate_selection(
            &self.selection,
            shipping_carrier.as_ref(),
            payment_method.as_ref(),
        ) {
            Ok(validated) => {
                self.validation_errors.clear();
                Ok((
                    validated.shipping_carrier.clone(),
                    validated.payment_method.clone(),
                ))
            }
            Err(err) => {
                debug!(user_id = %self.user_id, fields = ?err.field_names(), "Checkout validation failed");
                self.validation_errors.clone_from(&err.fields);
                Err(err.into())
            }
        }
    }

    /// Validate, then create the order together with the chosen addresses.
    ///
    /// Nothing is written unless validation passes, the cart has items and
    /// every referenced address still belongs to the user. The address writes
    /// and the order are stored as one unit.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation`, `CheckoutError::EmptyCart`,
    /// `CheckoutError::AddressNotFound` or `CheckoutError::InvoiceAddressNotFound`
    /// without side effects; `CheckoutError::Repository` if the write fails.
    pub async fn submit(&mut self) -> Result<Order, CheckoutError> {
        self.ensure_open()?;
        let (shipping_carrier, payment_method) = self.validate().await?;

        let cart = self.services.cart.current(self.user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let totals = self.recompute_totals().await?;

        let shipping_address = self.shipping_address_input().await?;
        let invoice_address = self.invoice_address_input().await?;

        let created = self
            .services
            .orders
            .create(NewOrder {
                user_id: self.user_id,
                shipping_address,
                invoice_address,
                shipping_carrier,
                payment_method,
                cart,
                price: totals.price,
                taxes: totals.taxes,
            })
            .await;
        let order = match (created, self.selection.invoice_choice) {
            (Ok(order), _) => order,
            // Removed between the check above and the write.
            (Err(RepositoryError::NotFound), InvoiceChoice::Existing(id)) => {
                return Err(CheckoutError::InvoiceAddressNotFound(id));
            }
            (Err(err), _) => return Err(err.into()),
        };

        info!(
            user_id = %self.user_id,
            order_id = %order.id,
            price = %order.price,
            taxes = %order.taxes,
            "Order placed"
        );
        self.placed_order = Some(order.id);
        Ok(order)
    }

    /// Current totals, validation failures and choices.
    #[must_use]
    pub fn snapshot(&self) -> CheckoutSnapshot {
        CheckoutSnapshot {
            price: self.selection.totals.price,
            taxes: self.selection.totals.taxes,
            validation_errors: self.validation_errors.clone(),
            address_choice: self.selection.address_choice,
            invoice_choice: self.selection.invoice_choice,
            show_invoice_form: self.selection.invoice_choice.shows_form(),
            shipping_carrier_id: self.selection.shipping_carrier_id,
            payment_method_id: self.selection.payment_method_id,
            order_id: self.placed_order,
        }
    }

    /// Load the lists the checkout form offers.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if a collaborator fails.
    pub async fn options(&self) -> Result<CheckoutOptions, CheckoutError> {
        Ok(CheckoutOptions {
            addresses: self.services.addresses.addresses_of(self.user_id).await?,
            invoice_addresses: self
                .services
                .addresses
                .invoice_addresses_of(self.user_id)
                .await?,
            shipping_carriers: self.services.shipping_carriers.list_enabled().await?,
            payment_methods: self.services.payment_methods.list_enabled().await?,
            countries: self.services.countries.all(),
        })
    }

    fn ensure_open(&self) -> Result<(), CheckoutError> {
        match self.placed_order {
            Some(order_id) => Err(CheckoutError::AlreadySubmitted(order_id)),
            None => Ok(()),
        }
    }

    async fn use_favorite_address(&mut self) -> Result<(), CheckoutError> {
        let favorite = self
            .services
            .addresses
            .addresses_of(self.user_id)
            .await?
            .into_iter()
            .next();
        match favorite {
            Some(address) => {
                self.selection.address_choice = AddressChoice::Existing(address.id);
                self.selection.address = address.fields;
            }
            None => {
                self.selection.address_choice = AddressChoice::New;
                self.selection.address = AddressFields::default();
            }
        }
        Ok(())
    }

    async fn cart_snapshot(&self) -> Result<CartSnapshot, CheckoutError> {
        Ok(CartSnapshot {
            total_price: self.services.cart.total_price(self.user_id).await?,
            total_taxes: self.services.cart.total_taxes(self.user_id).await?,
            tax_ratio: self.services.taxes.tax_ratio(),
            prices_include_tax: self.services.taxes.prices_include_tax(),
        })
    }

    async fn selected_surcharges(
        &self,
    ) -> Result<(Option<ShippingCarrier>, Option<PaymentMethod>), CheckoutError> {
        let shipping_carrier = match self.selection.shipping_carrier_id {
            Some(id) => self.services.shipping_carriers.find_by_id(id).await?,
            None => None,
        };
        let payment_method = match self.selection.payment_method_id {
            Some(id) => self.services.payment_methods.find_by_id(id).await?,
            None => None,
        };
        Ok((shipping_carrier, payment_method))
    }

    async fn shipping_address_input(&self) -> Result<ShippingAddressInput, CheckoutError> {
        match self.selection.address_choice {
            AddressChoice::Existing(id) => {
                let mut address = self
                    .services
                    .addresses
                    .address_for_user(self.user_id, id)
                    .await?
                    .ok_or(CheckoutError::AddressNotFound(id))?;
                address.fields = self.selection.address.clone();
                Ok(ShippingAddressInput::Stored(address))
            }
            // Validation rejects an unresolved favorite, so both remaining
            // choices carry a filled-in form.
            AddressChoice::New | AddressChoice::UseFavorite => {
                Ok(ShippingAddressInput::New(self.selection.address.clone()))
            }
        }
    }

    async fn invoice_address_input(&self) -> Result<Option<InvoiceAddressInput>, CheckoutError> {
        let fields = self.selection.invoice_address.clone();
        match self.selection.invoice_choice {
            InvoiceChoice::None => Ok(None),
            InvoiceChoice::New => Ok(Some(InvoiceAddressInput::New(fields))),
            InvoiceChoice::Existing(id) => {
                if self
                    .services
                    .addresses
                    .invoice_address_for_user(self.user_id, id)
                    .await?
                    .is_none()
                {
                    warn!(user_id = %self.user_id, invoice_address_id = %id, "Invoice address gone before submit");
                    return Err(CheckoutError::InvoiceAddressNotFound(id));
                }
                Ok(Some(InvoiceAddressInput::Update(id, fields)))
            }
        }
    }
}
