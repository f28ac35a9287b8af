use axum::{http::StatusCode, response::Json};
use compute::error::{CashError, ErrorCategory};
use compute::CashDesk;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::handlers::aggregates::{DailyAggregateResponse, DailyQuery, MonthlyAggregateResponse, MonthlyQuery};
use crate::handlers::audit::{AuditEventResponse, AuditQuery};
use crate::handlers::entries::{
    CreateEntryRequest, DeleteEntryResponse, EntryMutationResponse, EntryResponse, UpdateEntryRequest,
};
use crate::handlers::sessions::{CloseSessionResponse, OpenSessionRequest, SessionResponse, TotalsResponse};
use crate::handlers::sweeps::{SweepDetailResponse, SweepReportResponse, SweepRequest};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cash engine bound to the organization timezone
    pub desk: CashDesk,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            success: false,
        }
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Maps an engine error to its HTTP status and error body.
pub fn error_response(err: CashError) -> ApiError {
    let status = match err.category() {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Dependency => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Storage details stay in the log
    let message = match &err {
        CashError::Database(db_error) => {
            error!("Database error: {}", db_error);
            "Internal server error".to_string()
        }
        other => other.to_string(),
    };

    (status, Json(ErrorResponse::new(message, err.code())))
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::sessions::open_session,
        crate::handlers::sessions::close_session,
        crate::handlers::sessions::get_today_session,
        crate::handlers::entries::create_entry,
        crate::handlers::entries::update_entry,
        crate::handlers::entries::delete_entry,
        crate::handlers::aggregates::get_daily_aggregate,
        crate::handlers::aggregates::get_monthly_aggregate,
        crate::handlers::sweeps::run_sweep,
        crate::handlers::audit::get_audit_events,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            OpenSessionRequest,
            SessionResponse,
            TotalsResponse,
            CloseSessionResponse,
            CreateEntryRequest,
            UpdateEntryRequest,
            EntryResponse,
            EntryMutationResponse,
            DeleteEntryResponse,
            DailyQuery,
            MonthlyQuery,
            DailyAggregateResponse,
            MonthlyAggregateResponse,
            SweepRequest,
            SweepDetailResponse,
            SweepReportResponse,
            AuditQuery,
            AuditEventResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "cash-sessions", description = "Daily cash register lifecycle"),
        (name = "ledger-entries", description = "Income and expense movements"),
        (name = "aggregates", description = "Daily and monthly financial summaries"),
        (name = "sweeps", description = "Auto-heal of forgotten closures"),
        (name = "audit", description = "Audit trail"),
    ),
    info(
        title = "Cashdesk API",
        description = "Clinic cash-register sessions, ledger and financial aggregates",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
