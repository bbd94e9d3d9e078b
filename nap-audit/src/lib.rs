//! nap-audit library interface
//!
//! Audits business listings (Name, Address, Phone) against the Google
//! Places API and writes a discrepancy report. Exposes public APIs for the
//! binary and for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod trigger;

pub use crate::error::{ApiError, ApiResult, AuditError};

use axum::Router;
use chrono::{DateTime, Utc};
use nap_common::config::AppConfig;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;

use crate::models::RunSummary;
use crate::services::PlacesClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Configuration resolved at startup
    pub config: Arc<AppConfig>,
    /// Places API client (owns the rate limiter)
    pub places: Arc<PlacesClient>,
    /// Held for the duration of an audit run
    pub run_lock: Arc<Mutex<()>>,
    /// Summary of the last successful run
    pub last_summary: Arc<RwLock<Option<RunSummary>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last run failure for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: AppConfig, places: PlacesClient) -> Self {
        Self {
            config: Arc::new(config),
            places: Arc::new(places),
            run_lock: Arc::new(Mutex::new(())),
            last_summary: Arc::new(RwLock::new(None)),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::audit_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
