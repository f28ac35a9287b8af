//! Auto-heal of forgotten closures.
//!
//! A session still open after its business day ended is force-closed through
//! the regular close path. Sweeping is idempotent: a second run finds nothing
//! left to close, and a session closed by someone else mid-sweep is skipped.

use model::entities::cash_session;
use model::entities::prelude::{CashSession, Tenant};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::Totals;
use crate::audit::AuditAction;
use crate::business_day::date_key;
use crate::error::{CashError, Result};
use crate::identity::{resolve_system_actor, Principal};
use crate::session::CloseReason;
use crate::CashDesk;

/// One stale session found by a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepDetail {
    pub session_id: i32,
    pub business_date: String,
    pub opening_balance: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub closing_balance: Decimal,
}

/// Outcome of sweeping one tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub tenant_id: i32,
    /// Business date the sweep compared against
    pub today: String,
    pub dry_run: bool,
    /// Sessions actually closed; always 0 on a dry run
    pub closed_count: usize,
    pub details: Vec<SweepDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TenantSweepOutcome {
    Swept(SweepReport),
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantSweep {
    pub tenant_id: i32,
    pub outcome: TenantSweepOutcome,
}

/// Outcome of sweeping every tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetSweepReport {
    pub tenants: Vec<TenantSweep>,
}

impl FleetSweepReport {
    pub fn closed_count(&self) -> usize {
        self.tenants
            .iter()
            .map(|t| match &t.outcome {
                TenantSweepOutcome::Swept(report) => report.closed_count,
                _ => 0,
            })
            .sum()
    }

    pub fn failed_count(&self) -> usize {
        self.tenants
            .iter()
            .filter(|t| matches!(t.outcome, TenantSweepOutcome::Failed { .. }))
            .count()
    }
}

impl CashDesk {
    /// Closes every session of the actor's tenant left open on an earlier
    /// business date, oldest first. With `dry_run` nothing is written and the
    /// report lists what would be closed.
    #[instrument(skip(self), fields(tenant_id = actor.tenant_id))]
    pub async fn sweep_stale_sessions(&self, actor: &Principal, dry_run: bool) -> Result<SweepReport> {
        if !dry_run {
            self.repair_legacy_business_dates(Some(actor.tenant_id)).await?;
        }

        let today = date_key(self.calendar.today());
        // Zero-padded keys compare like dates
        let stale = CashSession::find()
            .filter(cash_session::Column::TenantId.eq(actor.tenant_id))
            .filter(cash_session::Column::IsOpen.eq(true))
            .filter(cash_session::Column::BusinessDate.lt(today.as_str()))
            .order_by_asc(cash_session::Column::BusinessDate)
            .all(&self.db)
            .await?;

        let mut report = SweepReport {
            tenant_id: actor.tenant_id,
            today: today.clone(),
            dry_run,
            closed_count: 0,
            details: Vec::with_capacity(stale.len()),
        };

        for session in stale {
            if dry_run {
                let business_date = self.session_date(&session)?;
                let totals = Totals::from_entries(&self.entries_in_day(session.tenant_id, business_date).await?);
                report.details.push(detail(&session, totals));
                continue;
            }

            match self.close_with_reason(actor, session, CloseReason::AutoHeal).await {
                Ok(closed) => {
                    report.closed_count += 1;
                    report.details.push(detail(&closed.session, closed.totals));
                }
                Err(CashError::NoOpenSession(day)) => {
                    debug!(business_date = %day, "Stale session already closed");
                }
                Err(err) => return Err(err),
            }
        }

        if report.closed_count > 0 {
            let closed_ids: Vec<i32> = report.details.iter().map(|d| d.session_id).collect();
            info!(closed = report.closed_count, ?closed_ids, "Auto-heal closed stale sessions");
            self.audit
                .record(
                    actor.id,
                    actor.tenant_id,
                    AuditAction::AutoHeal,
                    json!({
                        "today": today,
                        "closed_count": report.closed_count,
                        "session_ids": closed_ids,
                    }),
                )
                .await;
        }

        Ok(report)
    }

    /// Sweeps every tenant, each as its resolved system actor. A tenant
    /// that fails is reported and does not stop the others.
    #[instrument(skip(self))]
    pub async fn sweep_all_tenants(&self, dry_run: bool) -> Result<FleetSweepReport> {
        let tenants = Tenant::find().order_by_asc(model::entities::tenant::Column::Id).all(&self.db).await?;
        let mut report = FleetSweepReport::default();

        for tenant in tenants {
            let outcome = match resolve_system_actor(&self.db, tenant.id).await {
                Ok(Some(actor)) => match self.sweep_stale_sessions(&actor, dry_run).await {
                    Ok(swept) => TenantSweepOutcome::Swept(swept),
                    Err(err) => {
                        error!(tenant_id = tenant.id, %err, "Tenant sweep failed");
                        TenantSweepOutcome::Failed { error: err.to_string() }
                    }
                },
                Ok(None) => {
                    warn!(tenant_id = tenant.id, "No active principal, tenant skipped");
                    TenantSweepOutcome::Skipped {
                        reason: "no active principal".to_string(),
                    }
                }
                Err(err) => {
                    error!(tenant_id = tenant.id, %err, "Actor resolution failed");
                    TenantSweepOutcome::Failed { error: err.to_string() }
                }
            };
            report.tenants.push(TenantSweep {
                tenant_id: tenant.id,
                outcome,
            });
        }

        info!(
            tenants = report.tenants.len(),
            closed = report.closed_count(),
            failed = report.failed_count(),
            dry_run,
            "Fleet sweep finished"
        );
        Ok(report)
    }
}

fn detail(session: &cash_session::Model, totals: Totals) -> SweepDetail {
    SweepDetail {
        session_id: session.id,
        business_date: session.business_date.clone().unwrap_or_default(),
        opening_balance: session.opening_balance,
        total_income: totals.income,
        total_expense: totals.expense,
        closing_balance: totals.closing_balance(session.opening_balance),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use model::entities::ledger_entry::EntryKind;
    use model::entities::prelude::AuditEvent;
    use model::entities::principal::Role;
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::ledger::NewEntry;
    use crate::testing::{at_bogota, dec, desk_at, new_principal, new_tenant, setup_db};

    #[tokio::test]
    async fn test_sweep_closes_stale_sessions_oldest_first() {
        let db = setup_db().await;
        let (desk, clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;

        desk.open_session(&owner, dec(100)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(30)))
            .await
            .unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Expense, "Lunch", dec(10)))
            .await
            .unwrap();

        // Forgotten overnight, plus a second register left open by a writer
        // that bypassed the open path
        clock.advance(TimeDelta::days(1));
        let now = desk.calendar().now();
        cash_session::ActiveModel {
            tenant_id: Set(clinic.id),
            business_date: Set(Some("2025-03-02".to_string())),
            timezone: Set("America/Bogota".to_string()),
            opening_balance: Set(dec(120)),
            closing_balance: Set(None),
            is_open: Set(true),
            opened_by: Set(owner.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        clock.advance(TimeDelta::days(1));

        let report = desk.sweep_stale_sessions(&owner, false).await.unwrap();
        assert_eq!(report.today, "2025-03-03");
        assert_eq!(report.closed_count, 2);
        let dates: Vec<_> = report.details.iter().map(|d| d.business_date.as_str()).collect();
        assert_eq!(dates, vec!["2025-03-01", "2025-03-02"]);
        assert_eq!(report.details[0].closing_balance, dec(120));
        assert_eq!(report.details[1].closing_balance, dec(120));

        // Balance identity holds on every healed session
        for detail in &report.details {
            let session = CashSession::find_by_id(detail.session_id).one(&db).await.unwrap().unwrap();
            let day = crate::business_day::parse_business_date(&detail.business_date).unwrap();
            let totals = Totals::from_entries(&desk.entries_in_day(clinic.id, day).await.unwrap());
            assert!(!session.is_open);
            assert_eq!(session.closing_balance, Some(totals.closing_balance(session.opening_balance)));
        }

        let again = desk.sweep_stale_sessions(&owner, false).await.unwrap();
        assert_eq!(again.closed_count, 0);
        assert!(again.details.is_empty());

        let events = desk.recent_audit_events(clinic.id, 200).await.unwrap();
        let heals = events.iter().filter(|e| e.action == "AUTO_HEAL").count();
        let auto_closes = events
            .iter()
            .filter(|e| e.action == "CLOSE_SESSION" && e.detail["reason"] == "auto_heal")
            .count();
        assert_eq!(heals, 1);
        assert_eq!(auto_closes, 2);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_closing() {
        let db = setup_db().await;
        let (desk, clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;
        let session = desk.open_session(&owner, dec(50)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(5)))
            .await
            .unwrap();
        clock.advance(TimeDelta::days(1));

        let report = desk.sweep_stale_sessions(&owner, true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.closed_count, 0);
        assert_eq!(report.details.len(), 1);
        assert_eq!(report.details[0].closing_balance, dec(55));

        let stored = CashSession::find_by_id(session.id).one(&db).await.unwrap().unwrap();
        assert!(stored.is_open);
    }

    #[tokio::test]
    async fn test_todays_session_is_left_open() {
        let db = setup_db().await;
        let (desk, _clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;
        desk.open_session(&owner, dec(50)).await.unwrap();

        let report = desk.sweep_stale_sessions(&owner, false).await.unwrap();
        assert_eq!(report.closed_count, 0);
        assert!(desk.find_session(clinic.id, desk.calendar().today()).await.unwrap().unwrap().is_open);
    }

    #[tokio::test]
    async fn test_fleet_sweep_converges_and_skips_tenants_without_actor() {
        let db = setup_db().await;
        let (desk, clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));

        let mut owners = Vec::new();
        for name in ["North", "South", "East"] {
            let tenant = new_tenant(&db, name).await;
            let owner = new_principal(&db, &tenant, Role::Owner).await;
            desk.open_session(&owner, dec(10)).await.unwrap();
            desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(7)))
                .await
                .unwrap();
            owners.push(owner);
        }
        let orphan = new_tenant(&db, "Orphan").await;
        clock.advance(TimeDelta::days(1));

        let report = desk.sweep_all_tenants(false).await.unwrap();
        assert_eq!(report.tenants.len(), 4);
        assert_eq!(report.closed_count(), 3);
        assert_eq!(report.failed_count(), 0);
        let skipped = report
            .tenants
            .iter()
            .find(|t| t.tenant_id == orphan.id)
            .map(|t| &t.outcome);
        assert!(matches!(skipped, Some(TenantSweepOutcome::Skipped { .. })));

        for owner in &owners {
            let open = CashSession::find()
                .filter(cash_session::Column::TenantId.eq(owner.tenant_id))
                .filter(cash_session::Column::IsOpen.eq(true))
                .all(&db)
                .await
                .unwrap();
            assert!(open.is_empty());
        }

        let rerun = desk.sweep_all_tenants(false).await.unwrap();
        assert_eq!(rerun.closed_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_repairs_legacy_sessions_first() {
        let db = setup_db().await;
        let (desk, _clock) = desk_at(&db, at_bogota(2025, 3, 5, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;

        let created_at = at_bogota(2025, 3, 2, 10, 0);
        cash_session::ActiveModel {
            tenant_id: sea_orm::Set(clinic.id),
            business_date: sea_orm::Set(None),
            timezone: sea_orm::Set("America/Bogota".to_string()),
            opening_balance: sea_orm::Set(dec(40)),
            closing_balance: sea_orm::Set(None),
            is_open: sea_orm::Set(true),
            opened_by: sea_orm::Set(owner.id),
            created_at: sea_orm::Set(created_at),
            updated_at: sea_orm::Set(created_at),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let report = desk.sweep_stale_sessions(&owner, false).await.unwrap();
        assert_eq!(report.closed_count, 1);
        assert_eq!(report.details[0].business_date, "2025-03-02");
        assert_eq!(report.details[0].closing_balance, dec(40));
        assert!(AuditEvent::find().all(&db).await.unwrap().len() >= 2);
    }
}
