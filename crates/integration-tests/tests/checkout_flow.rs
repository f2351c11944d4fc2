//! Checkout flow end to end against the in-memory shop.
//!
//! Covers totals, address selection, validation and order submission the
//! way the HTTP handlers drive them.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use rust_decimal::Decimal;

use shop_core::{AddressId, InvoiceAddressId, OrderStatus, PaymentMethodId, ShippingCarrierId};
use shop_integration_tests::{
    FixedCart, OTHER_SHOPPER, SHOPPER, StockedShop, filled_address, filled_invoice,
    with_fixed_cart,
};
use shop_storefront::checkout::ports::{AddressBook, CartService};
use shop_storefront::checkout::{
    AddressChoice, CheckoutError, CheckoutFlow, CheckoutSelection, InvoiceChoice, Rule, Totals,
};
use shop_storefront::config::TaxConfig;

fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

/// Flow with a new, fully typed address and both options selected.
async fn ready_flow(stocked: &StockedShop) -> CheckoutFlow {
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();
    flow.fill_address(filled_address("London")).unwrap();
    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();
    flow
}

// =============================================================================
// Totals
// =============================================================================

#[tokio::test]
async fn test_surcharges_add_tax_on_top_of_price() {
    let stocked = StockedShop::new().await;
    let services = with_fixed_cart(
        stocked.services(),
        FixedCart {
            price: dec("100"),
            taxes: dec("10"),
        },
    );
    let mut flow = CheckoutFlow::start(services, SHOPPER).await.unwrap();

    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();

    let snapshot = flow.snapshot();
    assert_eq!(snapshot.price, dec("107.7"));
    assert_eq!(snapshot.taxes, dec("10.7"));
}

#[tokio::test]
async fn test_surcharges_keep_price_when_tax_is_included() {
    let stocked = StockedShop::new().await;
    let mut services = with_fixed_cart(
        stocked.services(),
        FixedCart {
            price: dec("100"),
            taxes: dec("10"),
        },
    );
    services.taxes = Arc::new(TaxConfig::new(dec("0.1"), true));
    let mut flow = CheckoutFlow::start(services, SHOPPER).await.unwrap();

    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();

    assert_eq!(flow.snapshot().price, dec("107"));
    assert_eq!(flow.snapshot().taxes, dec("10.7"));
}

#[tokio::test]
async fn test_totals_start_from_the_cart() {
    let stocked = StockedShop::new().await;
    let flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    assert_eq!(flow.snapshot().price, dec("99"));
    assert_eq!(flow.snapshot().taxes, dec("9"));
}

#[tokio::test]
async fn test_changing_carrier_replaces_its_surcharge() {
    let stocked = StockedShop::new().await;
    let express = stocked
        .shop
        .add_shipping_carrier("Express", dec("15"), true)
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_carrier(Some(express.id)).await.unwrap();
    assert_eq!(flow.snapshot().price, dec("115.5"));

    flow.set_carrier(None).await.unwrap();
    assert_eq!(flow.snapshot().price, dec("99"));
    assert_eq!(flow.snapshot().taxes, dec("9"));
}

#[tokio::test]
async fn test_disabled_carrier_adds_nothing() {
    let stocked = StockedShop::new().await;
    let retired = stocked
        .shop
        .add_shipping_carrier("Pigeon", dec("50"), false)
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    flow.set_carrier(Some(retired.id)).await.unwrap();

    assert_eq!(flow.snapshot().price, dec("99"));
    assert_eq!(flow.snapshot().shipping_carrier_id, Some(retired.id));
    let options = flow.options().await.unwrap();
    assert!(options.shipping_carriers.iter().all(|c| c.id != retired.id));
}

#[tokio::test]
async fn test_unknown_carrier_adds_nothing_and_fails_validation() {
    let stocked = StockedShop::new().await;
    let mut flow = ready_flow(&stocked).await;

    flow.set_carrier(Some(ShippingCarrierId::new(999))).await.unwrap();
    assert_eq!(flow.snapshot().price, dec("101.2"));

    let Err(CheckoutError::Validation(err)) = flow.submit().await else {
        panic!("unknown carrier must fail validation");
    };
    assert_eq!(err.field_names(), vec!["shipping_carrier_id"]);
    assert_eq!(err.fields[0].rule, Rule::Exists);
    assert_eq!(stocked.shop.writes().await, 0);
    assert!(stocked.shop.orders().await.is_empty());
}

#[tokio::test]
async fn test_resume_discards_stale_totals() {
    let stocked = StockedShop::new().await;
    let selection = CheckoutSelection {
        shipping_carrier_id: Some(stocked.carrier.id),
        totals: Totals {
            price: dec("1"),
            taxes: dec("1"),
        },
        ..CheckoutSelection::default()
    };

    let flow = CheckoutFlow::resume(stocked.services(), SHOPPER, selection)
        .await
        .unwrap();

    assert_eq!(flow.snapshot().price, dec("104.5"));
    assert_eq!(flow.snapshot().taxes, dec("9.5"));
}

// =============================================================================
// Address Selection
// =============================================================================

#[tokio::test]
async fn test_start_preselects_favorite_address() {
    let stocked = StockedShop::new().await;
    stocked
        .shop
        .add_address(SHOPPER, filled_address("Bath"), false)
        .await;
    let favorite = stocked
        .shop
        .add_address(SHOPPER, filled_address("York"), true)
        .await;

    let flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    assert_eq!(
        flow.selection().address_choice,
        AddressChoice::Existing(favorite.id)
    );
    assert_eq!(flow.selection().address.city, "York");
}

#[tokio::test]
async fn test_start_without_addresses_opens_new_form() {
    let stocked = StockedShop::new().await;
    let flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    assert_eq!(flow.selection().address_choice, AddressChoice::New);
    assert_eq!(flow.selection().address.city, "");
    assert_eq!(flow.selection().invoice_choice, InvoiceChoice::None);
    assert!(!flow.snapshot().show_invoice_form);
}

#[tokio::test]
async fn test_new_address_resets_the_form() {
    let stocked = StockedShop::new().await;
    stocked
        .shop
        .add_address(SHOPPER, filled_address("York"), true)
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    flow.select_address(AddressChoice::New).await.unwrap();

    assert_eq!(flow.selection().address_choice, AddressChoice::New);
    assert_eq!(flow.selection().address.city, "");
    assert_eq!(flow.selection().address.firstname, "");
}

#[tokio::test]
async fn test_foreign_address_is_rejected() {
    let stocked = StockedShop::new().await;
    let theirs = stocked
        .shop
        .add_address(OTHER_SHOPPER, filled_address("Leeds"), true)
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();
    flow.fill_address(filled_address("London")).unwrap();

    let result = flow.select_address(AddressChoice::Existing(theirs.id)).await;

    assert!(matches!(result, Err(CheckoutError::AddressNotFound(id)) if id == theirs.id));
    assert_eq!(flow.selection().address_choice, AddressChoice::New);
    assert_eq!(flow.selection().address.city, "London");
}

#[tokio::test]
async fn test_missing_address_is_rejected() {
    let stocked = StockedShop::new().await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    let result = flow
        .select_address(AddressChoice::Existing(AddressId::new(404)))
        .await;

    assert!(matches!(result, Err(CheckoutError::AddressNotFound(_))));
}

#[tokio::test]
async fn test_foreign_invoice_address_is_rejected() {
    let stocked = StockedShop::new().await;
    let theirs = stocked
        .shop
        .add_invoice_address(OTHER_SHOPPER, filled_invoice("Other Ltd"))
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    let result = flow
        .select_invoice_address(InvoiceChoice::Existing(theirs.id))
        .await;

    assert!(matches!(result, Err(CheckoutError::InvoiceAddressNotFound(_))));
    assert_eq!(flow.selection().invoice_choice, InvoiceChoice::None);
}

#[tokio::test]
async fn test_invoice_fields_need_the_form_shown() {
    let stocked = StockedShop::new().await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();

    let result = flow.fill_invoice_address(filled_invoice("Analytical Engines Ltd"));
    assert!(matches!(result, Err(CheckoutError::InvoiceFormHidden)));

    flow.select_invoice_address(InvoiceChoice::New).await.unwrap();
    assert!(flow.snapshot().show_invoice_form);
    flow.fill_invoice_address(filled_invoice("Analytical Engines Ltd"))
        .unwrap();
    assert_eq!(flow.selection().invoice_address.name, "Analytical Engines Ltd");
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_every_failing_field_is_reported() {
    let stocked = StockedShop::new().await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();
    flow.select_invoice_address(InvoiceChoice::New).await.unwrap();

    let Err(CheckoutError::Validation(err)) = flow.submit().await else {
        panic!("empty form must fail validation");
    };

    assert!(err.has("address.firstname"));
    assert!(err.has("address.phone"));
    assert!(err.has("invoice_address.vat"));
    assert!(err.has("invoice_address.zip"));
    assert!(err.has("shipping_carrier_id"));
    assert!(err.has("payment_method_id"));
    assert_eq!(err.fields.len(), 18);
    assert_eq!(flow.snapshot().validation_errors.len(), 18);
    assert_eq!(stocked.shop.writes().await, 0);
}

#[tokio::test]
async fn test_validation_errors_clear_once_fixed() {
    let stocked = StockedShop::new().await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();
    assert!(flow.validate().await.is_err());
    assert!(!flow.snapshot().validation_errors.is_empty());

    flow.fill_address(filled_address("London")).unwrap();
    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();

    assert!(flow.validate().await.is_ok());
    assert!(flow.snapshot().validation_errors.is_empty());
}

#[tokio::test]
async fn test_unknown_payment_method_fails_validation() {
    let stocked = StockedShop::new().await;
    let mut flow = ready_flow(&stocked).await;
    flow.set_payment_method(Some(PaymentMethodId::new(999)))
        .await
        .unwrap();

    let Err(CheckoutError::Validation(err)) = flow.submit().await else {
        panic!("unknown payment method must fail validation");
    };
    assert_eq!(err.field_names(), vec!["payment_method_id"]);
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_places_order_with_new_address() {
    let stocked = StockedShop::new().await;
    let mut flow = ready_flow(&stocked).await;

    let order = flow.submit().await.unwrap();

    assert_eq!(order.user_id, SHOPPER);
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.price, dec("106.7"));
    assert_eq!(order.taxes, dec("9.7"));
    assert_eq!(order.shipping_carrier_id, stocked.carrier.id);
    assert_eq!(order.payment_method_id, stocked.payment_method.id);
    assert!(order.invoice_address.is_none());
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].quantity, 2);

    let addresses = stocked.shop.addresses_of(SHOPPER).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert!(addresses[0].favorite);
    assert_eq!(order.shipping_address.source_id, addresses[0].id);
    assert_eq!(order.shipping_address.fields.city, "London");

    assert!(stocked.shop.current(SHOPPER).await.unwrap().is_empty());
    assert_eq!(flow.snapshot().order_id, Some(order.id));
}

#[tokio::test]
async fn test_submitted_flow_is_closed() {
    let stocked = StockedShop::new().await;
    let mut flow = ready_flow(&stocked).await;
    let order = flow.submit().await.unwrap();

    assert!(matches!(
        flow.submit().await,
        Err(CheckoutError::AlreadySubmitted(id)) if id == order.id
    ));
    assert!(matches!(
        flow.set_carrier(None).await,
        Err(CheckoutError::AlreadySubmitted(_))
    ));
    assert_eq!(stocked.shop.orders().await.len(), 1);
}

#[tokio::test]
async fn test_edited_existing_address_only_changes_the_order() {
    let stocked = StockedShop::new().await;
    let stored = stocked
        .shop
        .add_address(SHOPPER, filled_address("York"), true)
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();
    flow.fill_address(filled_address("Whitby")).unwrap();
    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();

    let order = flow.submit().await.unwrap();

    assert_eq!(order.shipping_address.source_id, stored.id);
    assert_eq!(order.shipping_address.fields.city, "Whitby");
    let addresses = stocked.shop.addresses_of(SHOPPER).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].fields.city, "York");
}

#[tokio::test]
async fn test_second_new_address_is_not_favorite() {
    let stocked = StockedShop::new().await;
    stocked
        .shop
        .add_address(SHOPPER, filled_address("York"), true)
        .await;
    let mut flow = CheckoutFlow::start(stocked.services(), SHOPPER).await.unwrap();
    flow.select_address(AddressChoice::New).await.unwrap();
    flow.fill_address(filled_address("Hull")).unwrap();
    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();

    flow.submit().await.unwrap();

    let addresses = stocked.shop.addresses_of(SHOPPER).await.unwrap();
    assert_eq!(addresses.len(), 2);
    assert_eq!(addresses.iter().filter(|a| a.favorite).count(), 1);
    assert_eq!(addresses[0].fields.city, "York");
}

#[tokio::test]
async fn test_submit_saves_new_invoice_address() {
    let stocked = StockedShop::new().await;
    let mut flow = ready_flow(&stocked).await;
    flow.select_invoice_address(InvoiceChoice::New).await.unwrap();
    flow.fill_invoice_address(filled_invoice("Analytical Engines Ltd"))
        .unwrap();

    let order = flow.submit().await.unwrap();

    let invoices = stocked.shop.invoice_addresses_of(SHOPPER).await.unwrap();
    assert_eq!(invoices.len(), 1);
    let recorded = order.invoice_address.unwrap();
    assert_eq!(recorded.source_id, invoices[0].id);
    assert_eq!(recorded.fields.name, "Analytical Engines Ltd");
}

#[tokio::test]
async fn test_submit_updates_existing_invoice_address() {
    let stocked = StockedShop::new().await;
    let stored = stocked
        .shop
        .add_invoice_address(SHOPPER, filled_invoice("Old Name Ltd"))
        .await;
    let mut flow = ready_flow(&stocked).await;
    flow.select_invoice_address(InvoiceChoice::Existing(stored.id))
        .await
        .unwrap();
    assert_eq!(flow.selection().invoice_address.name, "Old Name Ltd");
    flow.fill_invoice_address(filled_invoice("New Name Ltd"))
        .unwrap();

    let order = flow.submit().await.unwrap();

    let invoices = stocked.shop.invoice_addresses_of(SHOPPER).await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].fields.name, "New Name Ltd");
    assert_eq!(order.invoice_address.unwrap().source_id, stored.id);
}

#[tokio::test]
async fn test_empty_cart_writes_nothing() {
    let stocked = StockedShop::new().await;
    let mut flow = CheckoutFlow::start(stocked.services(), OTHER_SHOPPER)
        .await
        .unwrap();
    flow.fill_address(filled_address("Leeds")).unwrap();
    flow.set_carrier(Some(stocked.carrier.id)).await.unwrap();
    flow.set_payment_method(Some(stocked.payment_method.id))
        .await
        .unwrap();

    assert!(matches!(flow.submit().await, Err(CheckoutError::EmptyCart)));
    assert_eq!(stocked.shop.writes().await, 0);
}

#[tokio::test]
async fn test_order_store_failure_is_reported() {
    let stocked = StockedShop::new().await;
    stocked.shop.set_orders_unavailable(true).await;
    let mut flow = ready_flow(&stocked).await;

    let result = flow.submit().await;

    assert!(matches!(result, Err(CheckoutError::Repository(_))));
    assert!(stocked.shop.orders().await.is_empty());
    assert!(!stocked.shop.current(SHOPPER).await.unwrap().is_empty());
    assert!(stocked.shop.addresses_of(SHOPPER).await.unwrap().is_empty());
    assert_eq!(stocked.shop.writes().await, 0);
    assert_eq!(flow.snapshot().order_id, None);
}

#[tokio::test]
async fn test_failed_order_keeps_new_invoice_address_unsaved() {
    let stocked = StockedShop::new().await;
    stocked.shop.set_orders_unavailable(true).await;
    let mut flow = ready_flow(&stocked).await;
    flow.select_invoice_address(InvoiceChoice::New).await.unwrap();
    flow.fill_invoice_address(filled_invoice("Analytical Engines Ltd"))
        .unwrap();

    assert!(flow.submit().await.is_err());

    assert!(
        stocked
            .shop
            .invoice_addresses_of(SHOPPER)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(stocked.shop.writes().await, 0);
}

#[tokio::test]
async fn test_retry_after_order_failure_stores_address_once() {
    let stocked = StockedShop::new().await;
    stocked.shop.set_orders_unavailable(true).await;
    let mut flow = ready_flow(&stocked).await;

    assert!(flow.submit().await.is_err());
    assert!(flow.submit().await.is_err());
    stocked.shop.set_orders_unavailable(false).await;
    let order = flow.submit().await.unwrap();

    let addresses = stocked.shop.addresses_of(SHOPPER).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(order.shipping_address.source_id, addresses[0].id);
    assert_eq!(stocked.shop.orders().await.len(), 1);
}

#[tokio::test]
async fn test_missing_invoice_address_fails_on_update() {
    let stocked = StockedShop::new().await;
    let stored = stocked
        .shop
        .add_invoice_address(SHOPPER, filled_invoice("Gone Ltd"))
        .await;
    let mut flow = ready_flow(&stocked).await;
    flow.select_invoice_address(InvoiceChoice::Existing(stored.id))
        .await
        .unwrap();

    let mut selection = flow.into_selection();
    selection.invoice_choice = InvoiceChoice::Existing(InvoiceAddressId::new(404));
    let mut flow = CheckoutFlow::resume(stocked.services(), SHOPPER, selection)
        .await
        .unwrap();

    assert!(matches!(
        flow.submit().await,
        Err(CheckoutError::InvoiceAddressNotFound(id)) if id == InvoiceAddressId::new(404)
    ));
    assert!(stocked.shop.orders().await.is_empty());
    assert!(stocked.shop.addresses_of(SHOPPER).await.unwrap().is_empty());
    assert_eq!(stocked.shop.writes().await, 0);
}
