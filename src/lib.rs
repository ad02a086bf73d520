//! License activation and device-binding server.
//!
//! Clients POST a `(license_key, device_id)` pair to `/validate`. The first
//! successful validation binds the license to that device permanently; any
//! later validation from a different device is rejected with the bound
//! device's id. Administrators create, list, and deactivate licenses through
//! endpoints guarded by an `X-Admin-Token` header.
//!
//! # Design notes
//!
//! - **Binding is a compare-and-swap**: the store exposes a conditional
//!   "bind if still unbound" update, so two devices racing the first
//!   validation resolve to exactly one winner.
//! - **Fail-closed administration**: without a configured admin token the
//!   admin endpoints answer 401 to everything.
//! - **Persistence behind a port**: handlers and the evaluator see only the
//!   [`store::LicenseStore`] trait; SQLite is an implementation detail.

pub mod api;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod store;

use std::sync::Arc;

/// Shared application state threaded through axum handlers.
pub struct AppState {
    /// Persistence port for license records.
    pub store: Arc<dyn store::LicenseStore>,
    /// Admin capability token. `None` leaves administration unreachable.
    pub admin_token: Option<String>,
}

impl AppState {
    /// Builds state from a store and an optional admin token.
    ///
    /// A blank token counts as unconfigured, so a stray empty `ADMIN_TOKEN`
    /// can never open the admin surface.
    #[must_use]
    pub fn new(store: Arc<dyn store::LicenseStore>, admin_token: Option<String>) -> Self {
        let admin_token = admin_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { store, admin_token }
    }
}

pub use api::build_router;
pub use evaluator::{evaluate, Decision};
pub use model::{License, LicenseView};
pub use store::{LicenseStore, SqliteStore, StoreError};
