//! Order route handlers.
//!
//! Only the summary shown before payment lives here; paying is handled by
//! the payment provider.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use tracing::instrument;

use shop_core::{CurrencyCode, OrderId, Price, country_name};

use crate::checkout::ports::OrderService;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{AddressFields, Order};
use crate::state::AppState;

/// One order line for display.
#[derive(Clone)]
pub struct OrderLineView {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_price: String,
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub status: String,
    pub awaits_payment: bool,
    pub ship_to: Vec<String>,
    pub bill_to: Option<Vec<String>>,
    pub lines: Vec<OrderLineView>,
    pub price: String,
    pub taxes: String,
}

fn address_lines(fields: &AddressFields) -> Vec<String> {
    vec![
        format!("{} {}", fields.firstname, fields.lastname),
        fields.address.clone(),
        format!("{} {}", fields.zip, fields.city),
        format!(
            "{}, {}",
            fields.region,
            country_name(&fields.country).unwrap_or(fields.country.as_str())
        ),
        fields.phone.clone(),
    ]
}

impl OrderView {
    fn new(order: &Order, currency: CurrencyCode) -> Self {
        let display = |amount| Price::new(amount, currency).display();
        Self {
            id: order.id.to_string(),
            status: order.status.to_string(),
            awaits_payment: order.status.awaits_payment(),
            ship_to: address_lines(&order.shipping_address.fields),
            bill_to: order.invoice_address.as_ref().map(|invoice| {
                let fields = &invoice.fields;
                vec![
                    fields.name.clone(),
                    format!("VAT {}", fields.vat),
                    fields.address.clone(),
                    format!("{} {}", fields.zip, fields.city),
                    format!(
                        "{}, {}",
                        fields.region,
                        country_name(&fields.country).unwrap_or(fields.country.as_str())
                    ),
                ]
            }),
            lines: order
                .lines
                .iter()
                .map(|line| OrderLineView {
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price: display(line.unit_price),
                    line_price: display(line.unit_price * rust_decimal::Decimal::from(line.quantity)),
                })
                .collect(),
            price: display(order.price),
            taxes: display(order.taxes),
        }
    }
}

/// Payment step template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/pay.html")]
pub struct OrderPayTemplate {
    pub user_name: String,
    pub order: OrderView,
}

/// Display the order summary before payment.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn pay(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<OrderPayTemplate> {
    let order_id = OrderId::new(id);
    let order = state
        .checkout()
        .orders
        .order_for_user(user.id, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

    Ok(OrderPayTemplate {
        user_name: user.name,
        order: OrderView::new(&order, state.config().store.currency),
    })
}
