//! Identity of the caller, as asserted by the upstream gateway.
//!
//! Authentication happens before requests reach this service; the gateway
//! forwards the authenticated principal in three headers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use compute::identity::Principal;
use model::entities::principal::Role;
use tracing::{debug, warn};

use crate::schemas::{ApiError, ErrorResponse};

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// The principal performing the request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentPrincipal(pub Principal);

fn rejection(detail: String) -> ApiError {
    warn!("Rejected request without a valid principal: {}", detail);
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(detail, "MISSING_PRINCIPAL")),
    )
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| rejection(format!("Missing header {}", name)))
}

fn id_header(parts: &Parts, name: &str) -> Result<i32, ApiError> {
    let raw = header(parts, name)?;
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| rejection(format!("Header {} must be a positive integer", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = id_header(parts, PRINCIPAL_ID_HEADER)?;
        let tenant_id = id_header(parts, TENANT_ID_HEADER)?;
        let raw_role = header(parts, PRINCIPAL_ROLE_HEADER)?;
        let role = Role::parse(raw_role)
            .ok_or_else(|| rejection(format!("Unknown role '{}'", raw_role)))?;

        debug!(principal_id = id, tenant_id, role = role.as_str(), "Principal resolved");
        Ok(CurrentPrincipal(Principal::new(id, tenant_id, role)))
    }
}
