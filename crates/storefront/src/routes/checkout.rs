//! Checkout route handlers.
//!
//! Every request rebuilds a [`CheckoutFlow`] from the selection stored in
//! the session, applies the submitted form, and stores the selection again.
//! Form sentinels (`-1`, `-2`, `0`) are decoded here and nowhere else.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Deserializer};
use tower_sessions::Session;
use tracing::instrument;

use shop_core::{CurrencyCode, PaymentMethodId, Price, ShippingCarrierId};

use crate::checkout::{
    AddressChoice, CheckoutError, CheckoutFlow, CheckoutOptions, CheckoutSelection,
    CheckoutSnapshot, InvoiceChoice,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{AddressFields, CurrentUser, InvoiceAddressFields, session_keys};
use crate::state::AppState;

// =============================================================================
// Form
// =============================================================================

/// Posted checkout form.
///
/// Absent keys leave the corresponding state alone. An empty carrier or
/// payment method value clears the selection.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default, deserialize_with = "optional_id")]
    pub address_id: Option<i32>,
    #[serde(default, deserialize_with = "optional_id")]
    pub invoice_address_id: Option<i32>,
    #[serde(default, deserialize_with = "present_id")]
    pub shipping_carrier_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present_id")]
    pub payment_method_id: Option<Option<i32>>,

    #[serde(rename = "address.firstname")]
    pub address_firstname: Option<String>,
    #[serde(rename = "address.lastname")]
    pub address_lastname: Option<String>,
    #[serde(rename = "address.country")]
    pub address_country: Option<String>,
    #[serde(rename = "address.region")]
    pub address_region: Option<String>,
    #[serde(rename = "address.city")]
    pub address_city: Option<String>,
    #[serde(rename = "address.address")]
    pub address_address: Option<String>,
    #[serde(rename = "address.zip")]
    pub address_zip: Option<String>,
    #[serde(rename = "address.phone")]
    pub address_phone: Option<String>,

    #[serde(rename = "invoice_address.vat")]
    pub invoice_vat: Option<String>,
    #[serde(rename = "invoice_address.name")]
    pub invoice_name: Option<String>,
    #[serde(rename = "invoice_address.phone")]
    pub invoice_phone: Option<String>,
    #[serde(rename = "invoice_address.country")]
    pub invoice_country: Option<String>,
    #[serde(rename = "invoice_address.address")]
    pub invoice_address: Option<String>,
    #[serde(rename = "invoice_address.region")]
    pub invoice_region: Option<String>,
    #[serde(rename = "invoice_address.city")]
    pub invoice_city: Option<String>,
    #[serde(rename = "invoice_address.zip")]
    pub invoice_zip: Option<String>,
}

/// Parse an id field, treating an empty value like an absent one.
fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse an id field whose presence matters: `Some(None)` means "sent empty".
fn present_id<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_id(deserializer).map(Some)
}

fn any_present(values: &[&Option<String>]) -> bool {
    values.iter().any(|value| value.is_some())
}

impl CheckoutForm {
    /// Address fields, if the form carried any.
    #[must_use]
    pub fn address_fields(&self) -> Option<AddressFields> {
        let present = any_present(&[
            &self.address_firstname,
            &self.address_lastname,
            &self.address_country,
            &self.address_region,
            &self.address_city,
            &self.address_address,
            &self.address_zip,
            &self.address_phone,
        ]);
        present.then(|| AddressFields {
            firstname: self.address_firstname.clone().unwrap_or_default(),
            lastname: self.address_lastname.clone().unwrap_or_default(),
            country: self.address_country.clone().unwrap_or_default(),
            region: self.address_region.clone().unwrap_or_default(),
            city: self.address_city.clone().unwrap_or_default(),
            address: self.address_address.clone().unwrap_or_default(),
            zip: self.address_zip.clone().unwrap_or_default(),
            phone: self.address_phone.clone().unwrap_or_default(),
        })
    }

    /// Invoice address fields, if the form carried any.
    #[must_use]
    pub fn invoice_fields(&self) -> Option<InvoiceAddressFields> {
        let present = any_present(&[
            &self.invoice_vat,
            &self.invoice_name,
            &self.invoice_phone,
            &self.invoice_country,
            &self.invoice_address,
            &self.invoice_region,
            &self.invoice_city,
            &self.invoice_zip,
        ]);
        present.then(|| InvoiceAddressFields {
            vat: self.invoice_vat.clone().unwrap_or_default(),
            name: self.invoice_name.clone().unwrap_or_default(),
            phone: self.invoice_phone.clone().unwrap_or_default(),
            country: self.invoice_country.clone().unwrap_or_default(),
            address: self.invoice_address.clone().unwrap_or_default(),
            region: self.invoice_region.clone().unwrap_or_default(),
            city: self.invoice_city.clone().unwrap_or_default(),
            zip: self.invoice_zip.clone().unwrap_or_default(),
        })
    }
}

/// Apply a posted form to the flow.
///
/// A choice that differs from the current one is applied first and the
/// matching fields are then ignored, since they belong to the form that was
/// on screen before the switch.
async fn apply_form(flow: &mut CheckoutFlow, form: &CheckoutForm) -> std::result::Result<(), CheckoutError> {
    let address_switched = match AddressChoice::from_form_value(form.address_id) {
        Some(choice) if choice != flow.selection().address_choice => {
            flow.select_address(choice).await?;
            true
        }
        _ => false,
    };
    if !address_switched && let Some(fields) = form.address_fields() {
        flow.fill_address(fields)?;
    }

    let invoice_switched = match InvoiceChoice::from_form_value(form.invoice_address_id) {
        Some(choice) if choice != flow.selection().invoice_choice => {
            flow.select_invoice_address(choice).await?;
            true
        }
        _ => false,
    };
    if !invoice_switched
        && flow.selection().invoice_choice.shows_form()
        && let Some(fields) = form.invoice_fields()
    {
        flow.fill_invoice_address(fields)?;
    }

    if let Some(id) = form.shipping_carrier_id {
        flow.set_carrier(id.map(ShippingCarrierId::new)).await?;
    }
    if let Some(id) = form.payment_method_id {
        flow.set_payment_method(id.map(PaymentMethodId::new)).await?;
    }
    Ok(())
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Rebuild the user's flow from the session, or start a new one.
async fn load_flow(state: &AppState, session: &Session, user: &CurrentUser) -> Result<CheckoutFlow> {
    let stored = session
        .get::<CheckoutSelection>(session_keys::CHECKOUT)
        .await
        .ok()
        .flatten();
    let services = state.checkout().clone();
    let flow = match stored {
        Some(selection) => CheckoutFlow::resume(services, user.id, selection).await?,
        None => CheckoutFlow::start(services, user.id).await?,
    };
    Ok(flow)
}

async fn save_flow(session: &Session, flow: &CheckoutFlow) -> Result<()> {
    session
        .insert(session_keys::CHECKOUT, flow.selection())
        .await?;
    Ok(())
}

// =============================================================================
// View Models
// =============================================================================

/// Running totals and validation messages.
#[derive(Clone)]
pub struct SummaryView {
    pub price: String,
    pub taxes: String,
    pub errors: Vec<String>,
}

impl SummaryView {
    fn new(snapshot: &CheckoutSnapshot, currency: CurrencyCode) -> Self {
        Self {
            price: Price::new(snapshot.price, currency).display(),
            taxes: Price::new(snapshot.taxes, currency).display(),
            errors: snapshot
                .validation_errors
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// One `<option>` of a select box.
#[derive(Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// One text input (or country select) of an address form.
#[derive(Clone)]
pub struct FieldView {
    /// Posted name, e.g. `address.zip`.
    pub name: String,
    pub label: &'static str,
    pub value: String,
    pub is_country: bool,
    pub has_error: bool,
}

fn field_label(name: &str) -> &'static str {
    match name {
        "firstname" => "First name",
        "lastname" => "Last name",
        "country" => "Country",
        "region" => "Region",
        "city" => "City",
        "address" => "Address",
        "zip" => "Postal code",
        "phone" => "Phone",
        "vat" => "VAT number",
        "name" => "Name",
        _ => "",
    }
}

fn field_views(prefix: &str, values: &[(&'static str, &str)], snapshot: &CheckoutSnapshot) -> Vec<FieldView> {
    values
        .iter()
        .map(|(name, value)| {
            let full_name = format!("{prefix}.{name}");
            let has_error = snapshot
                .validation_errors
                .iter()
                .any(|error| error.field == full_name);
            FieldView {
                name: full_name,
                label: field_label(name),
                value: (*value).to_string(),
                is_country: *name == "country",
                has_error,
            }
        })
        .collect()
}

fn price_label(name: &str, price: rust_decimal::Decimal, currency: CurrencyCode) -> String {
    format!("{name} ({})", Price::new(price, currency).display())
}

/// Everything the checkout form renders.
#[derive(Clone)]
pub struct CheckoutView {
    pub addresses: Vec<OptionView>,
    pub address_fields: Vec<FieldView>,
    pub invoice_addresses: Vec<OptionView>,
    pub show_invoice_form: bool,
    pub invoice_fields: Vec<FieldView>,
    pub shipping_carriers: Vec<OptionView>,
    pub payment_methods: Vec<OptionView>,
    pub countries: Vec<OptionView>,
    pub summary: SummaryView,
}

impl CheckoutView {
    fn new(flow: &CheckoutFlow, options: &CheckoutOptions, currency: CurrencyCode) -> Self {
        let selection = flow.selection();
        let snapshot = flow.snapshot();

        let address_value = selection.address_choice.form_value();
        let mut addresses: Vec<OptionView> = options
            .addresses
            .iter()
            .map(|address| OptionView {
                value: address.id.to_string(),
                label: format!(
                    "{} {}, {}, {}",
                    address.fields.firstname,
                    address.fields.lastname,
                    address.fields.address,
                    address.fields.city
                ),
                selected: address_value == Some(address.id.as_i32()),
            })
            .collect();
        addresses.push(OptionView {
            value: AddressChoice::New.form_value().unwrap_or_default().to_string(),
            label: "New address".to_string(),
            selected: selection.address_choice == AddressChoice::New,
        });

        let invoice_value = selection.invoice_choice.form_value();
        let mut invoice_addresses = vec![OptionView {
            value: InvoiceChoice::None.form_value().to_string(),
            label: "Same as shipping address".to_string(),
            selected: selection.invoice_choice == InvoiceChoice::None,
        }];
        invoice_addresses.extend(options.invoice_addresses.iter().map(|invoice| OptionView {
            value: invoice.id.to_string(),
            label: format!("{} ({})", invoice.fields.name, invoice.fields.vat),
            selected: invoice_value == invoice.id.as_i32(),
        }));
        invoice_addresses.push(OptionView {
            value: InvoiceChoice::New.form_value().to_string(),
            label: "New invoice address".to_string(),
            selected: selection.invoice_choice == InvoiceChoice::New,
        });

        let shipping_carriers = options
            .shipping_carriers
            .iter()
            .map(|carrier| OptionView {
                value: carrier.id.to_string(),
                label: price_label(&carrier.name, carrier.price, currency),
                selected: selection.shipping_carrier_id == Some(carrier.id),
            })
            .collect();
        let payment_methods = options
            .payment_methods
            .iter()
            .map(|method| OptionView {
                value: method.id.to_string(),
                label: price_label(&method.name, method.price, currency),
                selected: selection.payment_method_id == Some(method.id),
            })
            .collect();
        let countries = options
            .countries
            .iter()
            .map(|country| OptionView {
                value: country.code.to_string(),
                label: country.name.to_string(),
                selected: false,
            })
            .collect();

        Self {
            addresses,
            address_fields: field_views("address", &selection.address.named_values(), &snapshot),
            invoice_addresses,
            show_invoice_form: snapshot.show_invoice_form,
            invoice_fields: field_views(
                "invoice_address",
                &selection.invoice_address.named_values(),
                &snapshot,
            ),
            shipping_carriers,
            payment_methods,
            countries,
            summary: SummaryView::new(&snapshot, currency),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutShowTemplate {
    pub user_name: String,
    pub checkout: CheckoutView,
}

/// Checkout form fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_form.html")]
pub struct CheckoutFormTemplate {
    pub checkout: CheckoutView,
}

async fn render_view(state: &AppState, flow: &CheckoutFlow) -> Result<CheckoutView> {
    let options = flow.options().await?;
    Ok(CheckoutView::new(flow, &options, state.config().store.currency))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the checkout page.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<CheckoutShowTemplate> {
    let flow = load_flow(&state, &session, &user).await?;
    save_flow(&session, &flow).await?;

    Ok(CheckoutShowTemplate {
        user_name: user.name,
        checkout: render_view(&state, &flow).await?,
    })
}

/// Apply form changes and re-render the form fragment (HTMX).
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<CheckoutFormTemplate> {
    let mut flow = load_flow(&state, &session, &user).await?;
    apply_form(&mut flow, &form).await?;
    save_flow(&session, &flow).await?;

    Ok(CheckoutFormTemplate {
        checkout: render_view(&state, &flow).await?,
    })
}

/// Current totals and choices as JSON.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn summary(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CheckoutSnapshot>> {
    let flow = load_flow(&state, &session, &user).await?;
    Ok(Json(flow.snapshot()))
}

/// Apply the form and place the order.
///
/// Redirects to the payment page on success. A form that fails validation
/// is rendered again with status 422.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let mut flow = load_flow(&state, &session, &user).await?;
    apply_form(&mut flow, &form).await?;

    let user_id = user.id.to_string();
    add_breadcrumb("checkout", "Submitted checkout", Some(&[("user_id", &user_id)]));

    match flow.submit().await {
        Ok(order) => {
            session
                .remove::<CheckoutSelection>(session_keys::CHECKOUT)
                .await?;
            Ok(Redirect::to(&format!("/orders/{}/pay", order.id)).into_response())
        }
        Err(CheckoutError::Validation(_)) => {
            save_flow(&session, &flow).await?;
            let page = CheckoutShowTemplate {
                user_name: user.name,
                checkout: render_view(&state, &flow).await?,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(err) => {
            // Keep what was typed for a retry.
            save_flow(&session, &flow).await?;
            Err(AppError::from(err))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(body: &str) -> CheckoutForm {
        serde_urlencoded::from_str(body).unwrap()
    }

    #[test]
    fn test_absent_keys_leave_state_alone() {
        let form = parse("");
        assert_eq!(form.address_id, None);
        assert_eq!(form.shipping_carrier_id, None);
        assert!(form.address_fields().is_none());
        assert!(form.invoice_fields().is_none());
    }

    #[test]
    fn test_empty_select_clears_carrier() {
        let form = parse("shipping_carrier_id=&payment_method_id=4&address_id=");
        assert_eq!(form.shipping_carrier_id, Some(None));
        assert_eq!(form.payment_method_id, Some(Some(4)));
        assert_eq!(form.address_id, None);
    }

    #[test]
    fn test_sentinels_map_to_choices() {
        let form = parse("address_id=-1&invoice_address_id=-2");
        assert_eq!(
            AddressChoice::from_form_value(form.address_id),
            Some(AddressChoice::New)
        );
        assert_eq!(
            InvoiceChoice::from_form_value(form.invoice_address_id),
            Some(InvoiceChoice::New)
        );
    }

    #[test]
    fn test_partial_address_fields_fill_the_rest_empty() {
        let form = parse("address.firstname=Ada&address.zip=SW1Y+4JH");
        let fields = form.address_fields().unwrap();
        assert_eq!(fields.firstname, "Ada");
        assert_eq!(fields.zip, "SW1Y 4JH");
        assert_eq!(fields.city, "");
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!(serde_urlencoded::from_str::<CheckoutForm>("address_id=abc").is_err());
    }

    #[test]
    fn test_field_views_mark_errors() {
        let snapshot = CheckoutSnapshot {
            price: rust_decimal::Decimal::ZERO,
            taxes: rust_decimal::Decimal::ZERO,
            validation_errors: vec![crate::checkout::FieldError {
                field: "address.zip".to_string(),
                rule: crate::checkout::Rule::Required,
            }],
            address_choice: AddressChoice::New,
            invoice_choice: InvoiceChoice::None,
            show_invoice_form: false,
            shipping_carrier_id: None,
            payment_method_id: None,
            order_id: None,
        };
        let fields = AddressFields::default();
        let views = field_views("address", &fields.named_values(), &snapshot);
        assert_eq!(views.len(), 8);
        let zip = views.iter().find(|view| view.name == "address.zip").unwrap();
        assert!(zip.has_error);
        assert_eq!(zip.label, "Postal code");
        assert!(views.iter().filter(|view| view.has_error).count() == 1);
        assert!(views.iter().any(|view| view.is_country));
    }
}
