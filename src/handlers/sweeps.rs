use crate::auth::CurrentPrincipal;
use crate::schemas::{error_response, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use compute::sweeper::{SweepDetail, SweepReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::ToSchema;

/// Request body for a manual sweep
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct SweepRequest {
    /// Report what would be closed without closing anything
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepDetailResponse {
    pub session_id: i32,
    pub business_date: String,
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub closing_balance: Decimal,
}

impl From<SweepDetail> for SweepDetailResponse {
    fn from(detail: SweepDetail) -> Self {
        Self {
            session_id: detail.session_id,
            business_date: detail.business_date,
            opening_balance: detail.opening_balance,
            total_income: detail.total_income,
            total_expense: detail.total_expense,
            closing_balance: detail.closing_balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepReportResponse {
    pub today: String,
    pub dry_run: bool,
    pub closed_count: usize,
    pub details: Vec<SweepDetailResponse>,
}

impl From<SweepReport> for SweepReportResponse {
    fn from(report: SweepReport) -> Self {
        Self {
            today: report.today,
            dry_run: report.dry_run,
            closed_count: report.closed_count,
            details: report.details.into_iter().map(SweepDetailResponse::from).collect(),
        }
    }
}

/// Close the tenant's sessions left open on earlier business days
///
/// The body is optional; a request without one runs a real sweep.
#[utoipa::path(
    post,
    path = "/api/v1/sweeps",
    tag = "sweeps",
    request_body = SweepRequest,
    responses(
        (status = 200, description = "Sweep completed", body = ApiResponse<SweepReportResponse>),
        (status = 400, description = "Malformed sweep options", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn run_sweep(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: Result<Json<SweepRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SweepReportResponse>>, ApiError> {
    trace!("Entering run_sweep function");

    // No body means no JSON content type; anything else must parse
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => SweepRequest::default(),
        Err(rejection) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(rejection.body_text(), "INVALID_REQUEST_BODY")),
            ))
        }
    };

    let report = state
        .desk
        .sweep_stale_sessions(&principal, request.dry_run)
        .await
        .map_err(error_response)?;

    info!(
        "Sweep for tenant {} found {} stale sessions, closed {}",
        principal.tenant_id,
        report.details.len(),
        report.closed_count
    );
    let message = if report.dry_run { "Dry run completed" } else { "Sweep completed" };
    Ok(Json(ApiResponse::ok(SweepReportResponse::from(report), message)))
}
