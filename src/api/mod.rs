//! REST API for status, simulation, prices and settings.
//!
//! Routes:
//! - `GET /status` -> status snapshot for the current hour
//! - `GET /simulate` -> 24-hour simulation trace
//! - `GET /prices/{hour}` -> TOU quote for an hour of day
//! - `GET /settings`, `POST /settings` -> read or partially update settings
//!
//! `/status` and `/simulate` accept `?at=YYYY-MM-DDTHH:MM` to pin the time.

mod handlers;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use axum::Router;
use axum::routing::get;
use chrono::NaiveDateTime;

use crate::config::Settings;
use crate::predictor::HouseholdModel;
use crate::pricing::PriceTable;

pub use types::{ErrorResponse, TimeQuery};

/// Application state shared across request handlers.
///
/// The price table and predictor are read-only. Settings sit behind a lock;
/// handlers copy a snapshot before doing any work.
pub struct AppState {
    /// Current settings.
    pub settings: RwLock<Settings>,
    /// TOU price table, loaded once.
    pub prices: PriceTable,
    /// Production and demand predictor.
    pub predictor: HouseholdModel,
    /// Where accepted settings updates are persisted, if anywhere.
    pub settings_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(settings: Settings, prices: PriceTable, predictor: HouseholdModel) -> Self {
        Self {
            settings: RwLock::new(settings),
            prices,
            predictor,
            settings_path: None,
        }
    }

    /// Persists accepted updates to `path`.
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Copy of the current settings.
    pub fn settings_snapshot(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/simulate", get(handlers::get_simulate))
        .route("/prices/{hour}", get(handlers::get_price))
        .route(
            "/settings",
            get(handlers::get_settings).post(handlers::post_settings),
        )
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    state.prices.preload();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}

fn resolve_time(at: Option<NaiveDateTime>) -> NaiveDateTime {
    at.unwrap_or_else(crate::sim::engine::current_hour)
}
