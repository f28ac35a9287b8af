use crate::auth::CurrentPrincipal;
use crate::handlers::aggregates::{DailyAggregateResponse, MonthlyAggregateResponse};
use crate::schemas::{error_response, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{extract::State, http::StatusCode, response::Json};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::session::ClosedSession;
use model::entities::cash_session;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_opening_balance"));
    }
    Ok(())
}

/// Request body for opening today's session
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct OpenSessionRequest {
    /// Cash in the drawer when the day starts
    #[validate(custom(function = "non_negative"))]
    pub opening_balance: Decimal,
}

/// Cash session response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: i32,
    /// Business date (YYYY-MM-DD) in the organization timezone
    pub business_date: Option<String>,
    pub timezone: String,
    pub opening_balance: Decimal,
    /// Present once the session is closed
    pub closing_balance: Option<Decimal>,
    pub is_open: bool,
    pub opened_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<cash_session::Model> for SessionResponse {
    fn from(model: cash_session::Model) -> Self {
        Self {
            id: model.id,
            business_date: model.business_date,
            timezone: model.timezone,
            opening_balance: model.opening_balance,
            closing_balance: model.closing_balance,
            is_open: model.is_open,
            opened_by: model.opened_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Totals of a closed session; `closing_balance` is opening + income - expense
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TotalsResponse {
    pub income: Decimal,
    pub expense: Decimal,
    pub closing_balance: Decimal,
}

impl From<&ClosedSession> for TotalsResponse {
    fn from(closed: &ClosedSession) -> Self {
        Self {
            income: closed.totals.income,
            expense: closed.totals.expense,
            closing_balance: closed.closing_balance(),
        }
    }
}

/// Closed session with the totals and the refreshed aggregates
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CloseSessionResponse {
    pub session: SessionResponse,
    pub totals: TotalsResponse,
    pub daily: Option<DailyAggregateResponse>,
    pub monthly: Option<MonthlyAggregateResponse>,
}

impl From<ClosedSession> for CloseSessionResponse {
    fn from(closed: ClosedSession) -> Self {
        let totals = TotalsResponse::from(&closed);
        let (daily, monthly) = match closed.recalculation {
            Some(recalculation) => (
                recalculation.daily.map(DailyAggregateResponse::from),
                Some(MonthlyAggregateResponse::from(recalculation.monthly)),
            ),
            None => (None, None),
        };
        Self {
            session: SessionResponse::from(closed.session),
            totals,
            daily,
            monthly,
        }
    }
}

/// Open today's cash session
///
/// Sessions of earlier days that were never closed are closed first. The
/// business date is always today's.
#[utoipa::path(
    post,
    path = "/api/v1/cash-sessions/open",
    tag = "cash-sessions",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session opened successfully", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Invalid opening balance", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 409, description = "A session already exists today or another one is still open", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn open_session(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Valid(Json(request)): Valid<Json<OpenSessionRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>), ApiError> {
    trace!("Entering open_session function");
    debug!("Opening session for tenant {} with balance {}", principal.tenant_id, request.opening_balance);

    let session = state
        .desk
        .open_session(&principal, request.opening_balance)
        .await
        .map_err(error_response)?;

    info!("Cash session {} opened for tenant {}", session.id, principal.tenant_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SessionResponse::from(session), "Cash session opened successfully")),
    ))
}

/// Close today's cash session
#[utoipa::path(
    post,
    path = "/api/v1/cash-sessions/close",
    tag = "cash-sessions",
    responses(
        (status = 200, description = "Session closed successfully", body = ApiResponse<CloseSessionResponse>),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 409, description = "No open session today", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn close_session(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<ApiResponse<CloseSessionResponse>>, ApiError> {
    trace!("Entering close_session function");

    let today = state.desk.calendar().today();
    let closed = state
        .desk
        .close_session(&principal, today)
        .await
        .map_err(error_response)?;

    info!(
        "Cash session {} closed for tenant {} with balance {}",
        closed.session.id,
        principal.tenant_id,
        closed.closing_balance()
    );
    Ok(Json(ApiResponse::ok(
        CloseSessionResponse::from(closed),
        "Cash session closed successfully",
    )))
}

/// Get today's cash session
///
/// Returns `null` data when no session was opened today.
#[utoipa::path(
    get,
    path = "/api/v1/cash-sessions/today",
    tag = "cash-sessions",
    responses(
        (status = 200, description = "Today's session retrieved successfully", body = ApiResponse<Option<SessionResponse>>),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_today_session(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<ApiResponse<Option<SessionResponse>>>, ApiError> {
    trace!("Entering get_today_session function");

    let session = state
        .desk
        .today_session(&principal)
        .await
        .map_err(error_response)?;

    let message = if session.is_some() {
        "Today's cash session retrieved successfully"
    } else {
        "No cash session opened today"
    };
    Ok(Json(ApiResponse::ok(session.map(SessionResponse::from), message)))
}
