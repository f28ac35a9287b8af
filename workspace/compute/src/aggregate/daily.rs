use chrono::NaiveDate;
use model::entities::prelude::{CashSession, DailyAggregate};
use model::entities::{cash_session, daily_aggregate};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, instrument, trace};

use super::Totals;
use crate::business_day::date_key;
use crate::error::Result;
use crate::CashDesk;

impl CashDesk {
    /// Rebuilds the daily aggregate of `business_date` from the session's
    /// opening balance and the tenant's entries created inside the day.
    ///
    /// Returns `None` when the tenant has no session on that date. A closed
    /// session gets its cached closing balance realigned as well.
    #[instrument(skip(self))]
    pub async fn recompute_daily(
        &self,
        tenant_id: i32,
        business_date: NaiveDate,
        actor: Option<i32>,
    ) -> Result<Option<daily_aggregate::Model>> {
        let key = date_key(business_date);
        let Some(session) = self.session_on(tenant_id, &key).await? else {
            debug!(business_date = %key, "No session, nothing to aggregate");
            return Ok(None);
        };

        let entries = self.entries_in_day(tenant_id, business_date).await?;
        let totals = Totals::from_entries(&entries);
        let closing = totals.closing_balance(session.opening_balance);
        trace!(entries = entries.len(), ?totals, %closing, "Computed daily totals");

        let existing = DailyAggregate::find()
            .filter(daily_aggregate::Column::TenantId.eq(tenant_id))
            .filter(daily_aggregate::Column::BusinessDate.eq(key.as_str()))
            .one(&self.db)
            .await?;

        let unchanged = existing.as_ref().is_some_and(|row| {
            row.opening_balance == session.opening_balance
                && row.total_income == totals.income
                && row.total_expense == totals.expense
                && row.closing_balance == closing
        });

        if !unchanged {
            let row = daily_aggregate::ActiveModel {
                tenant_id: Set(tenant_id),
                business_date: Set(key.clone()),
                timezone: Set(self.calendar.timezone_name().to_string()),
                opening_balance: Set(session.opening_balance),
                total_income: Set(totals.income),
                total_expense: Set(totals.expense),
                closing_balance: Set(closing),
                created_by: Set(actor),
                recomputed_at: Set(self.calendar.now()),
                ..Default::default()
            };
            DailyAggregate::insert(row)
                .on_conflict(
                    OnConflict::columns([
                        daily_aggregate::Column::TenantId,
                        daily_aggregate::Column::BusinessDate,
                    ])
                    .update_columns([
                        daily_aggregate::Column::Timezone,
                        daily_aggregate::Column::OpeningBalance,
                        daily_aggregate::Column::TotalIncome,
                        daily_aggregate::Column::TotalExpense,
                        daily_aggregate::Column::ClosingBalance,
                        daily_aggregate::Column::RecomputedAt,
                    ])
                    .to_owned(),
                )
                .exec(&self.db)
                .await?;
            debug!(business_date = %key, %closing, "Daily aggregate written");
        }

        if !session.is_open && session.closing_balance != Some(closing) {
            CashSession::update_many()
                .col_expr(cash_session::Column::ClosingBalance, Expr::value(closing))
                .col_expr(cash_session::Column::UpdatedAt, Expr::value(self.calendar.now()))
                .filter(cash_session::Column::Id.eq(session.id))
                .filter(cash_session::Column::IsOpen.eq(false))
                .exec(&self.db)
                .await?;
            debug!(session_id = session.id, %closing, "Realigned closed session balance");
        }

        if unchanged {
            return Ok(existing);
        }

        let stored = DailyAggregate::find()
            .filter(daily_aggregate::Column::TenantId.eq(tenant_id))
            .filter(daily_aggregate::Column::BusinessDate.eq(key.as_str()))
            .one(&self.db)
            .await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use model::entities::ledger_entry::{EntryKind, PaymentMethod};
    use model::entities::principal::Role;

    use super::*;
    use crate::ledger::NewEntry;
    use crate::testing::{at_bogota, dec, desk_at, new_principal, new_tenant, setup_db};

    #[tokio::test]
    async fn test_no_session_means_no_aggregate() {
        let db = setup_db().await;
        let (desk, _clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;

        let daily = desk.recompute_daily(clinic.id, desk.calendar().today(), None).await.unwrap();
        assert!(daily.is_none());
    }

    #[tokio::test]
    async fn test_daily_uses_day_range_and_stays_idempotent() {
        let db = setup_db().await;
        let (desk, clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;
        let today = desk.calendar().today();

        desk.open_session(&owner, dec(100_000)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Consultation", dec(50_000)))
            .await
            .unwrap();
        clock.advance(TimeDelta::hours(2));
        desk.create_entry(
            &owner,
            NewEntry::new(EntryKind::Expense, "Gloves", dec(20_000)).payment_method(PaymentMethod::Transfer),
        )
        .await
        .unwrap();

        let first = desk.recompute_daily(clinic.id, today, Some(owner.id)).await.unwrap().unwrap();
        assert_eq!(first.business_date, "2025-03-01");
        assert_eq!(first.timezone, "America/Bogota");
        assert_eq!(first.total_income, dec(50_000));
        assert_eq!(first.total_expense, dec(20_000));
        assert_eq!(first.closing_balance, dec(130_000));

        clock.advance(TimeDelta::minutes(30));
        let second = desk.recompute_daily(clinic.id, today, Some(owner.id)).await.unwrap().unwrap();
        assert_eq!(first, second, "a recomputation without changes must not touch the row");
    }

    #[tokio::test]
    async fn test_open_session_keeps_closing_balance_unset() {
        let db = setup_db().await;
        let (desk, _clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;
        let today = desk.calendar().today();

        let session = desk.open_session(&owner, dec(10)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(5)))
            .await
            .unwrap();
        desk.recompute_daily(clinic.id, today, None).await.unwrap();

        let stored = CashSession::find_by_id(session.id).one(&db).await.unwrap().unwrap();
        assert!(stored.is_open);
        assert_eq!(stored.closing_balance, None);
    }
}
