//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Checkout (requires auth)
//! GET  /checkout               - Checkout page (starts or resumes the flow)
//! POST /checkout               - Submit: 303 to the payment page, or 422 with errors
//! POST /checkout/update        - Apply changes (returns checkout_form fragment)
//! GET  /checkout/summary       - Totals and choices as JSON
//!
//! # Orders (requires auth)
//! GET  /orders/:id/pay         - Order summary before payment
//! ```

pub mod checkout;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::submit))
        .route("/update", post(checkout::update))
        .route("/summary", get(checkout::summary))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/checkout", checkout_routes())
        .route("/orders/{id}/pay", get(orders::pay))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::middleware::{self, Next};
    use axum::response::Response;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, Session};

    use shop_core::UserId;

    use super::*;
    use crate::checkout::memory::InMemoryShop;
    use crate::checkout::ports::AddressBook;
    use crate::config::{StoreConfig, StorefrontConfig, TaxConfig};
    use crate::middleware::{create_session_layer, set_current_user};
    use crate::models::CurrentUser;

    const USER: i32 = 7;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/shop_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from(
                "k8Jf2mQp9xLw4vRt7nYb3cHs6dGz1aEuT5oN0iWq2ZrX8eVy4bUc7sKd1hMj3gFp",
            ),
            store: StoreConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    fn app(shop: &InMemoryShop, logged_in: bool) -> Router {
        let config = test_config();
        // Never connected: the checkout routes only talk to the in-memory shop.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shop_test")
            .unwrap();
        let session_layer = create_session_layer(MemoryStore::default(), &config).unwrap();
        let state = AppState::with_services(config, pool, shop.services());

        let router = routes().with_state(state);
        let router = if logged_in {
            router.layer(middleware::from_fn(login))
        } else {
            router
        };
        router.layer(session_layer)
    }

    async fn login(session: Session, request: Request<Body>, next: Next) -> Response {
        let user = CurrentUser {
            id: UserId::new(USER),
            name: "Ada".to_string(),
        };
        set_current_user(&session, &user).await.unwrap();
        next.run(request).await
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn stocked_shop() -> (InMemoryShop, i32, i32) {
        let shop = InMemoryShop::new(TaxConfig::default());
        shop.add_cart_line(UserId::new(USER), "Espresso beans", Decimal::new(1800, 2), 2)
            .await;
        let carrier = shop
            .add_shipping_carrier("Courier", Decimal::new(495, 2), true)
            .await;
        let method = shop
            .add_payment_method("Card", Decimal::ZERO, true)
            .await;
        (shop, carrier.id.as_i32(), method.id.as_i32())
    }

    #[tokio::test]
    async fn test_checkout_redirects_anonymous_users_to_login() {
        let shop = InMemoryShop::new(TaxConfig::default());
        let response = app(&shop, false)
            .oneshot(Request::get("/checkout").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            crate::middleware::auth::LOGIN_PATH
        );
    }

    #[tokio::test]
    async fn test_summary_rejects_anonymous_json_requests() {
        let shop = InMemoryShop::new(TaxConfig::default());
        let response = app(&shop, false)
            .oneshot(
                Request::get("/checkout/summary")
                    .header(header::ACCEPT, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_checkout_page_lists_carriers() {
        let (shop, _, _) = stocked_shop().await;
        let response = app(&shop, true)
            .oneshot(Request::get("/checkout").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Courier"));
        assert!(body.contains("New address"));
    }

    #[tokio::test]
    async fn test_update_returns_form_fragment() {
        let (shop, carrier, _) = stocked_shop().await;
        let response = app(&shop, true)
            .oneshot(form_request(
                "/checkout/update",
                &format!("shipping_carrier_id={carrier}"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("checkout-form"));
        assert!(!body.contains("<html"));
        assert_eq!(shop.writes().await, 0);
    }

    #[tokio::test]
    async fn test_incomplete_submit_rerenders_with_422() {
        let (shop, carrier, _) = stocked_shop().await;
        let response = app(&shop, true)
            .oneshot(form_request(
                "/checkout",
                &format!("shipping_carrier_id={carrier}&address.firstname=Ada"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("address.zip is required"));
        assert!(shop.orders().await.is_empty());
    }

    fn complete_form(carrier: i32, method: i32) -> String {
        format!(
            "address_id=-1&invoice_address_id=0\
             &address.firstname=Ada&address.lastname=Lovelace&address.country=ES\
             &address.region=Madrid&address.city=Madrid&address.address=Calle+Mayor+1\
             &address.zip=28013&address.phone=600123123\
             &shipping_carrier_id={carrier}&payment_method_id={method}"
        )
    }

    #[tokio::test]
    async fn test_complete_submit_redirects_to_payment() {
        let (shop, carrier, method) = stocked_shop().await;
        let response = app(&shop, true)
            .oneshot(form_request("/checkout", &complete_form(carrier, method)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let orders = shop.orders().await;
        assert_eq!(orders.len(), 1);
        let location = response.headers().get(header::LOCATION).unwrap();
        assert_eq!(
            location.to_str().unwrap(),
            format!("/orders/{}/pay", orders[0].id)
        );
    }

    #[tokio::test]
    async fn test_failed_submit_can_be_retried_without_duplicate_addresses() {
        let (shop, carrier, method) = stocked_shop().await;
        let app = app(&shop, true);
        let body = complete_form(carrier, method);

        shop.set_orders_unavailable(true).await;
        let response = app
            .clone()
            .oneshot(form_request("/checkout", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(shop.addresses_of(UserId::new(USER)).await.unwrap().is_empty());

        shop.set_orders_unavailable(false).await;
        let response = app.oneshot(form_request("/checkout", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(shop.addresses_of(UserId::new(USER)).await.unwrap().len(), 1);
        assert_eq!(shop.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pay_page_hides_other_users_orders() {
        let shop = InMemoryShop::new(TaxConfig::default());
        let response = app(&shop, true)
            .oneshot(Request::get("/orders/999/pay").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
