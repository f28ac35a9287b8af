//! Append-only audit trail of state-changing actions.
//!
//! Recording never fails from the caller's point of view: a sink that cannot
//! persist an event logs the failure and moves on.

use std::fmt;

use async_trait::async_trait;
use model::entities::audit_event;
use model::entities::prelude::AuditEvent;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::business_day::BusinessCalendar;
use crate::error::Result;
use crate::CashDesk;

/// Maximum number of events returned by [`CashDesk::recent_audit_events`].
pub const MAX_AUDIT_PAGE: u64 = 200;

/// Audited action. Rendered as an upper-snake name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OpenSession,
    CloseSession,
    CreateEntry,
    EditEntry,
    DeleteEntry,
    /// Summary of a sweep that force-closed stale sessions
    AutoHeal,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OpenSession => "OPEN_SESSION",
            AuditAction::CloseSession => "CLOSE_SESSION",
            AuditAction::CreateEntry => "CREATE_ENTRY",
            AuditAction::EditEntry => "EDIT_ENTRY",
            AuditAction::DeleteEntry => "DELETE_ENTRY",
            AuditAction::AutoHeal => "AUTO_HEAL",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync + fmt::Debug {
    async fn record(&self, actor: i32, tenant_id: i32, action: AuditAction, detail: Value);
}

/// Sink writing to the `audit_events` table.
#[derive(Debug, Clone)]
pub struct DbAuditSink {
    db: DatabaseConnection,
    calendar: BusinessCalendar,
}

impl DbAuditSink {
    pub fn new(db: DatabaseConnection, calendar: BusinessCalendar) -> Self {
        Self { db, calendar }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, actor: i32, tenant_id: i32, action: AuditAction, detail: Value) {
        info!(target: "audit", actor, tenant_id, action = action.as_str(), %detail, "AUDIT");

        let event = audit_event::ActiveModel {
            tenant_id: Set(tenant_id),
            actor_id: Set(actor),
            action: Set(action.as_str().to_string()),
            detail: Set(detail),
            created_at: Set(self.calendar.now()),
            ..Default::default()
        };
        if let Err(err) = event.insert(&self.db).await {
            warn!(%err, actor, tenant_id, action = action.as_str(), "Failed to persist audit event");
        }
    }
}

impl CashDesk {
    /// Latest audit events of a tenant, newest first. `limit` is clamped to
    /// `1..=200`.
    #[instrument(skip(self))]
    pub async fn recent_audit_events(&self, tenant_id: i32, limit: u64) -> Result<Vec<audit_event::Model>> {
        let limit = limit.clamp(1, MAX_AUDIT_PAGE);
        let events = AuditEvent::find()
            .filter(audit_event::Column::TenantId.eq(tenant_id))
            .order_by_desc(audit_event::Column::CreatedAt)
            .order_by_desc(audit_event::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(events)
    }
}
