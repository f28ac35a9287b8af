use crate::auth::CurrentPrincipal;
use crate::handlers::aggregates::{DailyAggregateResponse, MonthlyAggregateResponse};
use crate::schemas::{error_response, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::ledger::{parse_kind, parse_payment_method, EntryPatch, EntryWrite, NewEntry};
use compute::recalc::Recalculation;
use model::entities::ledger_entry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    Ok(())
}

/// Request body for recording a movement
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateEntryRequest {
    /// `income` or `expense`
    pub kind: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    /// `cash`, `transfer`, `card` or `other`; defaults to `cash`
    pub payment_method: Option<String>,
    #[validate(length(max = 100))]
    pub patient_ref: Option<String>,
}

/// Request body for editing a movement; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateEntryRequest {
    pub kind: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub description: Option<String>,
    #[validate(custom(function = "positive"))]
    pub amount: Option<Decimal>,
    pub payment_method: Option<String>,
    #[validate(length(max = 100))]
    pub patient_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntryResponse {
    pub id: i32,
    pub session_id: i32,
    pub kind: String,
    pub category: Option<String>,
    pub description: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub patient_ref: Option<String>,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ledger_entry::Model> for EntryResponse {
    fn from(model: ledger_entry::Model) -> Self {
        Self {
            id: model.id,
            session_id: model.session_id,
            kind: model.kind.as_str().to_lowercase(),
            category: model.category,
            description: model.description,
            amount: model.amount,
            payment_method: model.payment_method.as_str().to_lowercase(),
            patient_ref: model.patient_ref,
            author_id: model.author_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Entry written together with the aggregates it refreshed
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntryMutationResponse {
    pub entry: EntryResponse,
    pub daily: Option<DailyAggregateResponse>,
    pub monthly: Option<MonthlyAggregateResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteEntryResponse {
    pub entry_id: i32,
    pub daily: Option<DailyAggregateResponse>,
    pub monthly: Option<MonthlyAggregateResponse>,
}

fn split(recalculation: Option<Recalculation>) -> (Option<DailyAggregateResponse>, Option<MonthlyAggregateResponse>) {
    match recalculation {
        Some(recalculation) => (
            recalculation.daily.map(DailyAggregateResponse::from),
            Some(MonthlyAggregateResponse::from(recalculation.monthly)),
        ),
        None => (None, None),
    }
}

impl From<EntryWrite> for EntryMutationResponse {
    fn from(write: EntryWrite) -> Self {
        let (daily, monthly) = split(write.recalculation);
        Self {
            entry: EntryResponse::from(write.entry),
            daily,
            monthly,
        }
    }
}

impl From<EntryWrite> for DeleteEntryResponse {
    fn from(write: EntryWrite) -> Self {
        let (daily, monthly) = split(write.recalculation);
        Self {
            entry_id: write.entry.id,
            daily,
            monthly,
        }
    }
}

/// Record an income or expense in today's open session
#[utoipa::path(
    post,
    path = "/api/v1/ledger-entries",
    tag = "ledger-entries",
    request_body = CreateEntryRequest,
    responses(
        (status = 201, description = "Entry created successfully", body = ApiResponse<EntryMutationResponse>),
        (status = 400, description = "Invalid entry", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 409, description = "No open session today", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_entry(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Valid(Json(request)): Valid<Json<CreateEntryRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<EntryMutationResponse>>), ApiError> {
    trace!("Entering create_entry function");

    let kind = parse_kind(&request.kind).map_err(error_response)?;
    let mut new = NewEntry::new(kind, request.description, request.amount);
    if let Some(category) = request.category {
        new = new.category(category);
    }
    if let Some(method) = request.payment_method.as_deref() {
        new = new.payment_method(parse_payment_method(method).map_err(error_response)?);
    }
    if let Some(patient_ref) = request.patient_ref {
        new = new.patient_ref(patient_ref);
    }
    debug!("Creating {} entry of {} for tenant {}", kind.as_str(), request.amount, principal.tenant_id);

    let write = state
        .desk
        .create_entry(&principal, new)
        .await
        .map_err(error_response)?;

    info!("Ledger entry {} created for tenant {}", write.entry.id, principal.tenant_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(EntryMutationResponse::from(write), "Entry created successfully")),
    ))
}

/// Edit an entry of today's open session
///
/// Only owners and the entry's author may edit it.
#[utoipa::path(
    put,
    path = "/api/v1/ledger-entries/{entry_id}",
    tag = "ledger-entries",
    params(
        ("entry_id" = i32, Path, description = "Entry ID")
    ),
    request_body = UpdateEntryRequest,
    responses(
        (status = 200, description = "Entry updated successfully", body = ApiResponse<EntryMutationResponse>),
        (status = 400, description = "Invalid entry", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 403, description = "Not allowed to edit this entry", body = ErrorResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse),
        (status = 409, description = "The entry's session is closed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_entry(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(entry_id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateEntryRequest>>,
) -> Result<Json<ApiResponse<EntryMutationResponse>>, ApiError> {
    trace!("Entering update_entry function for entry_id: {}", entry_id);

    let patch = EntryPatch {
        kind: request.kind.as_deref().map(parse_kind).transpose().map_err(error_response)?,
        category: request.category,
        description: request.description,
        amount: request.amount,
        payment_method: request
            .payment_method
            .as_deref()
            .map(parse_payment_method)
            .transpose()
            .map_err(error_response)?,
        patient_ref: request.patient_ref,
    };

    let write = state
        .desk
        .edit_entry(&principal, entry_id, patch)
        .await
        .map_err(error_response)?;

    info!("Ledger entry {} updated for tenant {}", entry_id, principal.tenant_id);
    Ok(Json(ApiResponse::ok(
        EntryMutationResponse::from(write),
        "Entry updated successfully",
    )))
}

/// Delete an entry of today's open session
#[utoipa::path(
    delete,
    path = "/api/v1/ledger-entries/{entry_id}",
    tag = "ledger-entries",
    params(
        ("entry_id" = i32, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Entry deleted successfully", body = ApiResponse<DeleteEntryResponse>),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 403, description = "Not allowed to delete this entry", body = ErrorResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse),
        (status = 409, description = "The entry's session is closed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(entry_id): Path<i32>,
) -> Result<Json<ApiResponse<DeleteEntryResponse>>, ApiError> {
    trace!("Entering delete_entry function for entry_id: {}", entry_id);

    let write = state
        .desk
        .delete_entry(&principal, entry_id)
        .await
        .map_err(error_response)?;

    info!("Ledger entry {} deleted for tenant {}", entry_id, principal.tenant_id);
    Ok(Json(ApiResponse::ok(
        DeleteEntryResponse::from(write),
        "Entry deleted successfully",
    )))
}
