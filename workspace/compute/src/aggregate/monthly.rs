use model::entities::daily_aggregate;
use model::entities::monthly_aggregate;
use model::entities::prelude::{DailyAggregate, MonthlyAggregate};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{debug, instrument, trace};

use crate::business_day::{date_key, month_bounds};
use crate::error::{CashError, Result};
use crate::CashDesk;

impl CashDesk {
    /// Rolls the daily aggregates of a month up into its monthly aggregate.
    ///
    /// The opening balance is the opening of the earliest daily in the month
    /// (zero for an empty month). Creating the row for the first time needs
    /// `actor`; later updates keep the original creator.
    #[instrument(skip(self))]
    pub async fn recompute_monthly(
        &self,
        tenant_id: i32,
        year: i32,
        month: u32,
        actor: Option<i32>,
    ) -> Result<monthly_aggregate::Model> {
        let (first, last) = month_bounds(year, month)?;

        // Keys are zero-padded, so the string range is the date range
        let dailies = DailyAggregate::find()
            .filter(daily_aggregate::Column::TenantId.eq(tenant_id))
            .filter(daily_aggregate::Column::BusinessDate.between(date_key(first), date_key(last)))
            .order_by_asc(daily_aggregate::Column::BusinessDate)
            .all(&self.db)
            .await?;

        let income: Decimal = dailies.iter().map(|d| d.total_income).sum();
        let expense: Decimal = dailies.iter().map(|d| d.total_expense).sum();
        let opening = dailies.first().map(|d| d.opening_balance).unwrap_or(Decimal::ZERO);
        let closing = opening + income - expense;
        trace!(days = dailies.len(), %income, %expense, %opening, %closing, "Computed monthly totals");

        let month_column = month as i32;
        let existing = MonthlyAggregate::find()
            .filter(monthly_aggregate::Column::TenantId.eq(tenant_id))
            .filter(monthly_aggregate::Column::Year.eq(year))
            .filter(monthly_aggregate::Column::Month.eq(month_column))
            .one(&self.db)
            .await?;

        let created_by = match (&existing, actor) {
            (Some(row), _) => {
                if row.total_income == income
                    && row.total_expense == expense
                    && row.opening_balance == opening
                    && row.closing_balance == closing
                {
                    trace!("Monthly aggregate unchanged");
                    return Ok(row.clone());
                }
                row.created_by
            }
            (None, Some(actor)) => actor,
            (None, None) => return Err(CashError::ActorRequired { year, month }),
        };

        let row = monthly_aggregate::ActiveModel {
            tenant_id: Set(tenant_id),
            year: Set(year),
            month: Set(month_column),
            total_income: Set(income),
            total_expense: Set(expense),
            opening_balance: Set(opening),
            closing_balance: Set(closing),
            created_by: Set(created_by),
            recomputed_at: Set(self.calendar.now()),
            ..Default::default()
        };
        MonthlyAggregate::insert(row)
            .on_conflict(
                OnConflict::columns([
                    monthly_aggregate::Column::TenantId,
                    monthly_aggregate::Column::Year,
                    monthly_aggregate::Column::Month,
                ])
                .update_columns([
                    monthly_aggregate::Column::TotalIncome,
                    monthly_aggregate::Column::TotalExpense,
                    monthly_aggregate::Column::OpeningBalance,
                    monthly_aggregate::Column::ClosingBalance,
                    monthly_aggregate::Column::RecomputedAt,
                ])
                .to_owned(),
            )
            .exec(&self.db)
            .await?;
        debug!(year, month, %closing, "Monthly aggregate written");

        let stored = MonthlyAggregate::find()
            .filter(monthly_aggregate::Column::TenantId.eq(tenant_id))
            .filter(monthly_aggregate::Column::Year.eq(year))
            .filter(monthly_aggregate::Column::Month.eq(month_column))
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("monthly aggregate {year}-{month:02}")))?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use model::entities::ledger_entry::EntryKind;
    use model::entities::principal::Role;

    use super::*;
    use crate::ledger::NewEntry;
    use crate::testing::{at_bogota, dec, desk_at, new_principal, new_tenant, setup_db};

    #[tokio::test]
    async fn test_first_creation_requires_actor() {
        let db = setup_db().await;
        let (desk, _clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;

        let err = desk.recompute_monthly(clinic.id, 2025, 3, None).await.unwrap_err();
        assert!(matches!(err, CashError::ActorRequired { year: 2025, month: 3 }));

        let empty = desk.recompute_monthly(clinic.id, 2025, 3, Some(owner.id)).await.unwrap();
        assert_eq!(empty.opening_balance, Decimal::ZERO);
        assert_eq!(empty.closing_balance, Decimal::ZERO);
        assert_eq!(empty.created_by, owner.id);

        // Updates no longer need an actor
        let again = desk.recompute_monthly(clinic.id, 2025, 3, None).await.unwrap();
        assert_eq!(again, empty);
    }

    #[tokio::test]
    async fn test_invalid_month() {
        let db = setup_db().await;
        let (desk, _clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;

        let err = desk.recompute_monthly(clinic.id, 2025, 13, Some(1)).await.unwrap_err();
        assert!(matches!(err, CashError::InvalidMonth(13)));
    }

    #[tokio::test]
    async fn test_month_rolls_up_its_dailies() {
        let db = setup_db().await;
        let (desk, clock) = desk_at(&db, at_bogota(2025, 3, 1, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;

        // Day one: 100 + 40 - 10 = 130
        let day_one = desk.calendar().today();
        desk.open_session(&owner, dec(100)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(40)))
            .await
            .unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Expense, "Supplies", dec(10)))
            .await
            .unwrap();
        desk.close_session(&owner, day_one).await.unwrap();

        // Day two: 130 + 25 - 5 = 150
        clock.advance(TimeDelta::days(1));
        desk.open_session(&owner, dec(130)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(25)))
            .await
            .unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Expense, "Coffee", dec(5)))
            .await
            .unwrap();

        let monthly = desk.recompute_monthly(clinic.id, 2025, 3, None).await.unwrap();
        let dailies = DailyAggregate::find()
            .filter(daily_aggregate::Column::TenantId.eq(clinic.id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(dailies.len(), 2);

        let income: Decimal = dailies.iter().map(|d| d.total_income).sum();
        let expense: Decimal = dailies.iter().map(|d| d.total_expense).sum();
        assert_eq!(monthly.total_income, income);
        assert_eq!(monthly.total_expense, expense);
        assert_eq!(monthly.total_income, dec(65));
        assert_eq!(monthly.total_expense, dec(15));
        assert_eq!(monthly.opening_balance, dec(100));
        assert_eq!(monthly.closing_balance, dec(150));
    }

    #[tokio::test]
    async fn test_months_do_not_leak_into_each_other() {
        let db = setup_db().await;
        let (desk, clock) = desk_at(&db, at_bogota(2025, 3, 31, 9, 0));
        let clinic = new_tenant(&db, "Clinic").await;
        let owner = new_principal(&db, &clinic, Role::Owner).await;

        desk.open_session(&owner, dec(10)).await.unwrap();
        desk.create_entry(&owner, NewEntry::new(EntryKind::Income, "Visit", dec(3)))
            .await
            .unwrap();
        desk.close_session(&owner, desk.calendar().today()).await.unwrap();

        clock.advance(TimeDelta::days(1));
        desk.open_session(&owner, dec(13)).await.unwrap();

        let march = desk.recompute_monthly(clinic.id, 2025, 3, None).await.unwrap();
        let april = desk.recompute_monthly(clinic.id, 2025, 4, Some(owner.id)).await.unwrap();
        assert_eq!(march.total_income, dec(3));
        assert_eq!(march.closing_balance, dec(13));
        assert_eq!(april.total_income, Decimal::ZERO);
        assert_eq!(april.opening_balance, dec(13));
    }
}
