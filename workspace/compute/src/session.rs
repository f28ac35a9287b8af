//! Cash session lifecycle: Open → Closed, one session per tenant and
//! business day.
//!
//! Same-day exclusivity comes from the `(tenant_id, business_date)` unique
//! index and closes are conditional updates. Opening also refuses while any
//! other session of the tenant is open.

use chrono::NaiveDate;
use model::entities::cash_session;
use model::entities::prelude::CashSession;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::Totals;
use crate::audit::AuditAction;
use crate::business_day::{date_key, parse_business_date};
use crate::error::{is_unique_violation, CashError, Result};
use crate::identity::Principal;
use crate::ledger::fits_money_column;
use crate::recalc::Recalculation;
use crate::CashDesk;

/// Why a session was closed. Recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Manual,
    AutoHeal,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Manual => "manual",
            CloseReason::AutoHeal => "auto_heal",
        }
    }
}

/// A freshly closed session with the totals its closing balance came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub session: cash_session::Model,
    pub totals: Totals,
    pub recalculation: Option<Recalculation>,
}

impl ClosedSession {
    pub fn closing_balance(&self) -> Decimal {
        self.totals.closing_balance(self.session.opening_balance)
    }
}

impl CashDesk {
    /// Opens today's session for the actor's tenant.
    ///
    /// Stale sessions of earlier days are closed first. The business date is
    /// always the calendar's today, and no session opens while another one of
    /// the tenant is still open.
    #[instrument(skip(self), fields(tenant_id = actor.tenant_id))]
    pub async fn open_session(&self, actor: &Principal, opening_balance: Decimal) -> Result<cash_session::Model> {
        if opening_balance < Decimal::ZERO || !fits_money_column(opening_balance) {
            return Err(CashError::InvalidOpeningBalance(opening_balance));
        }

        self.sweep_stale_sessions(actor, false).await?;

        let business_date = self.calendar.today();
        let key = date_key(business_date);
        let still_open = CashSession::find()
            .filter(cash_session::Column::TenantId.eq(actor.tenant_id))
            .filter(cash_session::Column::IsOpen.eq(true))
            .order_by_asc(cash_session::Column::BusinessDate)
            .one(&self.db)
            .await?;
        if let Some(open) = still_open {
            let open_key = open.business_date.unwrap_or_default();
            if open_key == key {
                return Err(CashError::SessionAlreadyOpenToday(key));
            }
            warn!(session_id = open.id, business_date = %open_key, "Another session is still open");
            return Err(CashError::SessionStillOpen(open_key));
        }

        let now = self.calendar.now();
        let session = cash_session::ActiveModel {
            tenant_id: Set(actor.tenant_id),
            business_date: Set(Some(key.clone())),
            timezone: Set(self.calendar.timezone_name().to_string()),
            opening_balance: Set(opening_balance),
            closing_balance: Set(None),
            is_open: Set(true),
            opened_by: Set(actor.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                debug!(business_date = %key, "Session already exists");
                CashError::SessionAlreadyOpenToday(key.clone())
            } else {
                CashError::Database(err)
            }
        })?;
        info!(session_id = session.id, business_date = %key, %opening_balance, "Cash session opened");

        self.refresh_aggregates(actor.tenant_id, business_date, Some(actor.id)).await;
        self.audit
            .record(
                actor.id,
                actor.tenant_id,
                AuditAction::OpenSession,
                json!({
                    "session_id": session.id,
                    "business_date": key,
                    "opening_balance": opening_balance,
                }),
            )
            .await;

        Ok(session)
    }

    /// Closes the open session of `business_date`.
    #[instrument(skip(self), fields(tenant_id = actor.tenant_id))]
    pub async fn close_session(&self, actor: &Principal, business_date: NaiveDate) -> Result<ClosedSession> {
        let key = date_key(business_date);
        let session = self
            .open_session_on(actor.tenant_id, &key)
            .await?
            .ok_or(CashError::NoOpenSession(key))?;
        self.close_with_reason(actor, session, CloseReason::Manual).await
    }

    /// The only Open → Closed transition.
    ///
    /// The closed state and closing balance are written in one conditional
    /// update; losing a race to another closer yields `NoOpenSession`.
    pub(crate) async fn close_with_reason(
        &self,
        actor: &Principal,
        session: cash_session::Model,
        reason: CloseReason,
    ) -> Result<ClosedSession> {
        let business_date = self.session_date(&session)?;
        let key = date_key(business_date);

        let entries = self.entries_in_day(session.tenant_id, business_date).await?;
        let totals = Totals::from_entries(&entries);
        let closing = totals.closing_balance(session.opening_balance);

        let updated = CashSession::update_many()
            .col_expr(cash_session::Column::IsOpen, Expr::value(false))
            .col_expr(cash_session::Column::ClosingBalance, Expr::value(closing))
            .col_expr(cash_session::Column::UpdatedAt, Expr::value(self.calendar.now()))
            .filter(cash_session::Column::Id.eq(session.id))
            .filter(cash_session::Column::IsOpen.eq(true))
            .exec(&self.db)
            .await?;
        if updated.rows_affected == 0 {
            debug!(session_id = session.id, "Session was closed concurrently");
            return Err(CashError::NoOpenSession(key));
        }
        info!(
            session_id = session.id,
            business_date = %key,
            reason = reason.as_str(),
            %closing,
            "Cash session closed"
        );

        let recalculation = self.refresh_aggregates(session.tenant_id, business_date, Some(actor.id)).await;
        self.audit
            .record(
                actor.id,
                session.tenant_id,
                AuditAction::CloseSession,
                json!({
                    "session_id": session.id,
                    "business_date": key,
                    "opening_balance": session.opening_balance,
                    "total_income": totals.income,
                    "total_expense": totals.expense,
                    "closing_balance": closing,
                    "reason": reason.as_str(),
                }),
            )
            .await;

        let session = CashSession::find_by_id(session.id)
            .one(&self.db)
            .await?
            .ok_or(CashError::NoOpenSession(key))?;
        Ok(ClosedSession {
            session,
            totals,
            recalculation,
        })
    }

    /// Session of the tenant on `business_date`, open or closed.
    pub async fn find_session(&self, tenant_id: i32, business_date: NaiveDate) -> Result<Option<cash_session::Model>> {
        self.session_on(tenant_id, &date_key(business_date)).await
    }

    /// Today's session of the actor's tenant, after closing stale ones.
    #[instrument(skip(self), fields(tenant_id = actor.tenant_id))]
    pub async fn today_session(&self, actor: &Principal) -> Result<Option<cash_session::Model>> {
        self.sweep_stale_sessions(actor, false).await?;
        self.find_session(actor.tenant_id, self.calendar.today()).await
    }

    pub(crate) async fn session_on(&self, tenant_id: i32, key: &str) -> Result<Option<cash_session::Model>> {
        let session = CashSession::find()
            .filter(cash_session::Column::TenantId.eq(tenant_id))
            .filter(cash_session::Column::BusinessDate.eq(key))
            .one(&self.db)
            .await?;
        Ok(session)
    }

    pub(crate) async fn open_session_on(&self, tenant_id: i32, key: &str) -> Result<Option<cash_session::Model>> {
        Ok(self.session_on(tenant_id, key).await?.filter(|s| s.is_open))
    }

    /// Business date of a session, derived from its creation instant for
    /// rows that predate the column.
    pub(crate) fn session_date(&self, session: &cash_session::Model) -> Result<NaiveDate> {
        match session.business_date.as_deref() {
            Some(raw) => parse_business_date(raw),
            None => Ok(self.calendar.business_date_of(Some(session.created_at))),
        }
    }

    /// Backfills `business_date` on sessions stored without one, deriving it
    /// from the creation instant. Rows whose derived date is already taken
    /// are logged and left alone. Safe to run repeatedly.
    #[instrument(skip(self))]
    pub async fn repair_legacy_business_dates(&self, tenant_id: Option<i32>) -> Result<u64> {
        let mut query = CashSession::find().filter(cash_session::Column::BusinessDate.is_null());
        if let Some(tenant_id) = tenant_id {
            query = query.filter(cash_session::Column::TenantId.eq(tenant_id));
        }
        let legacy = query.order_by_asc(cash_session::Column::Id).all(&self.db).await?;

        let mut repaired = 0;
        for session in legacy {
            let key = date_key(self.calendar.business_date_of(Some(session.created_at)));
            let result = CashSession::update_many()
                .col_expr(cash_session::Column::BusinessDate, Expr::value(key.clone()))
                .filter(cash_session::Column::Id.eq(session.id))
                .filter(cash_session::Column::BusinessDate.is_null())
                .exec(&self.db)
                .await;
            match result {
                Ok(outcome) => repaired += outcome.rows_affected,
                Err(err) if is_unique_violation(&err) => {
                    warn!(
                        session_id = session.id,
                        business_date = %key,
                        "Legacy session collides with an existing session, left untouched"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        if repaired > 0 {
            info!(repaired, "Backfilled legacy business dates");
        }
        Ok(repaired)
    }
}
