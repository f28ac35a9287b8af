use crate::auth::CurrentPrincipal;
use crate::schemas::{error_response, ApiError, ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::audit::MAX_AUDIT_PAGE;
use model::entities::audit_event;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Maximum number of events, newest first (1-200, default 200)
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEventResponse {
    pub id: i32,
    pub actor_id: i32,
    pub action: String,
    #[schema(value_type = Object)]
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<audit_event::Model> for AuditEventResponse {
    fn from(model: audit_event::Model) -> Self {
        Self {
            id: model.id,
            actor_id: model.actor_id,
            action: model.action,
            detail: model.detail,
            created_at: model.created_at,
        }
    }
}

/// List the tenant's most recent audit events
#[utoipa::path(
    get,
    path = "/api/v1/audit-events",
    tag = "audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit events retrieved successfully", body = ApiResponse<Vec<AuditEventResponse>>),
        (status = 400, description = "Invalid limit", body = ErrorResponse),
        (status = 401, description = "Missing principal", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_audit_events(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Valid(Query(query)): Valid<Query<AuditQuery>>,
) -> Result<Json<ApiResponse<Vec<AuditEventResponse>>>, ApiError> {
    trace!("Entering get_audit_events function");

    let events = state
        .desk
        .recent_audit_events(principal.tenant_id, query.limit.unwrap_or(MAX_AUDIT_PAGE))
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::ok(
        events.into_iter().map(AuditEventResponse::from).collect(),
        "Audit events retrieved successfully",
    )))
}
