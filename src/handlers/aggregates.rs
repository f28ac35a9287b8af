use crate::auth::CurrentPrincipal;
use crate::schemas::{error_response, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Datelike, Utc};
use compute::business_day::parse_business_date;
use model::entities::{daily_aggregate, monthly_aggregate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Query parameters for the daily aggregate
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Business date (YYYY-MM-DD); defaults to today
    pub date: Option<String>,
}

/// Query parameters for the monthly aggregate
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct MonthlyQuery {
    /// Year; defaults to the current year
    #[validate(range(min = 1970, max = 9999))]
    pub year: Option<i32>,
    /// Month (1-12); defaults to the current month
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyAggregateResponse {
    pub business_date: String,
    pub timezone: String,
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub closing_balance: Decimal,
    pub recomputed_at: DateTime<Utc>,
}

impl From<daily_aggregate::Model> for DailyAggregateResponse {
    fn from(model: daily_aggregate::Model) -> Self {
        Self {
            business_date: model.business_date,
            timezone: model.timezone,
            opening_balance: model.opening_balance,
            total_income: model.total_income,
            total_expense: model.total_expense,
            closing_balance: model.closing_balance,
            recomputed_at: model.recomputed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MonthlyAggregateResponse {
    pub year: i32,
    pub month: i32,
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub closing_balance: Decimal,
    pub created_by: i32,
    pub recomputed_at: DateTime<Utc>,
}

impl From<monthly_aggregate::Model> for MonthlyAggregateResponse {
    fn from(model: monthly_aggregate::Model) -> Self {
        Self {
            year: model.year,
            month: model.month,
            opening_balance: model.opening_balance,
            total_income: model.total_income,
            total_expense: model.total_expense,
            closing_balance: model.closing_balance,
            created_by: model.created_by,
            recomputed_at: model.recomputed_at,
        }
    }
}

/// Get the daily aggregate of a business date
///
/// The aggregate and the monthly aggregate of its month are recomputed before
/// the daily is returned. `null` data means the tenant had no session that day.
#[utoipa::path(
    get,
    path = "/api/v1/aggregates/daily",
    tag = "aggregates",
    params(DailyQuery),
    responses(
        (status = 200, description = "Daily aggregate retrieved successfully", body = ApiResponse<Option<DailyAggregateResponse>>),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_daily_aggregate(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<DailyQuery>,
) -> Result<Json<ApiResponse<Option<DailyAggregateResponse>>>, ApiError> {
    trace!("Entering get_daily_aggregate function");

    let date = match query.date.as_deref() {
        Some(raw) => parse_business_date(raw).map_err(error_response)?,
        None => state.desk.calendar().today(),
    };
    debug!("Recomputing daily aggregate of {} for tenant {}", date, principal.tenant_id);

    let daily = state
        .desk
        .recompute_all(principal.tenant_id, date, Some(principal.id))
        .await
        .map_err(error_response)?
        .daily;

    let message = if daily.is_some() {
        "Daily aggregate retrieved successfully"
    } else {
        "No cash session on that date"
    };
    Ok(Json(ApiResponse::ok(daily.map(DailyAggregateResponse::from), message)))
}

/// Get the monthly aggregate of a calendar month
///
/// The daily aggregates of the month's session days are recomputed first, then
/// rolled up into the monthly aggregate that is returned.
#[utoipa::path(
    get,
    path = "/api/v1/aggregates/monthly",
    tag = "aggregates",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Monthly aggregate retrieved successfully", body = ApiResponse<MonthlyAggregateResponse>),
        (status = 400, description = "Invalid year or month", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_monthly_aggregate(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Valid(Query(query)): Valid<Query<MonthlyQuery>>,
) -> Result<Json<ApiResponse<MonthlyAggregateResponse>>, ApiError> {
    trace!("Entering get_monthly_aggregate function");

    let today = state.desk.calendar().today();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());
    debug!("Recomputing monthly aggregate {}-{:02} for tenant {}", year, month, principal.tenant_id);

    let monthly = state
        .desk
        .recompute_month(principal.tenant_id, year, month, Some(principal.id))
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::ok(
        MonthlyAggregateResponse::from(monthly),
        "Monthly aggregate retrieved successfully",
    )))
}
