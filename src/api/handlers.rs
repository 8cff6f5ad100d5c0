//! Request handlers for the API endpoints.

use std::sync::{Arc, PoisonError};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde_json::Value;

use crate::config::{Settings, SettingsUpdate};
use crate::predictor::DaylightMasked;
use crate::pricing::PriceQuote;
use crate::sim::engine::simulate;
use crate::sim::types::SimulationTrace;
use crate::status::{StatusReport, status_at};

use super::types::{ErrorResponse, TimeQuery};
use super::{AppState, resolve_time};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: ErrorResponse) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error))
}

/// Returns the status snapshot for the current (or requested) hour.
///
/// `GET /status` → 200 + `StatusReport` JSON
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<StatusReport>, ApiError> {
    let at = resolve_time(query.timestamp().map_err(bad_request)?);
    let settings = state.settings_snapshot();
    Ok(Json(status_at(at, &state.predictor, &state.prices, &settings)))
}

/// Runs a 24-hour simulation from the current (or requested) hour.
///
/// `GET /simulate` → 200 + `SimulationTrace` JSON
pub async fn get_simulate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<SimulationTrace>, ApiError> {
    let start = resolve_time(query.timestamp().map_err(bad_request)?);
    let settings = state.settings_snapshot();
    let predictor = DaylightMasked::new(&state.predictor, settings.daylight());
    Ok(Json(simulate(
        start,
        predictor,
        &state.prices,
        settings.battery_state(),
        &settings,
    )))
}

/// Returns the TOU quote for an hour of day.
///
/// `GET /prices/{hour}` → 200 + `PriceQuote` JSON
/// `GET /prices/24` → 400 + `ErrorResponse`
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(hour): Path<u32>,
) -> Result<Json<PriceQuote>, ApiError> {
    if hour > 23 {
        return Err(bad_request(ErrorResponse {
            error: format!("hour must be in [0, 23], got {hour}"),
        }));
    }
    Ok(Json(state.prices.lookup(hour)))
}

/// Returns the current settings.
///
/// `GET /settings` → 200 + `Settings` JSON
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
    Json(state.settings_snapshot())
}

/// Applies a partial settings update.
///
/// `POST /settings` → 200 + `SettingsUpdate` when at least one key applied,
/// 400 + `SettingsUpdate` when none did (nothing is written).
pub async fn post_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<SettingsUpdate>), ApiError> {
    let Value::Object(updates) = body else {
        return Err(bad_request(ErrorResponse {
            error: "request body must be a JSON object".to_string(),
        }));
    };

    // The write lock is held through the save so the file sees updates in
    // the same order as memory.
    let mut settings = state
        .settings
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mut report = settings.apply_updates(&updates);

    if report.is_rejected() {
        tracing::warn!(errors = report.errors.len(), "settings update rejected");
        return Ok((StatusCode::BAD_REQUEST, Json(report)));
    }

    tracing::info!(applied = ?report.applied, "settings updated");
    if let Some(path) = &state.settings_path {
        if let Err(err) = settings.save(path) {
            tracing::warn!(%err, "settings applied but not persisted");
            report.errors.push(err);
        }
    }
    drop(settings);
    Ok((StatusCode::OK, Json(report)))
}
