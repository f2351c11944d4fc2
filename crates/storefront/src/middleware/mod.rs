//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authentication is done per handler through the [`RequireAuth`] extractor.

pub mod auth;
pub mod session;

pub use auth::{RequireAuth, set_current_user};
pub use session::{create_session_layer, create_session_store};
