use chrono::{Datelike, NaiveDate};
use model::entities::prelude::CashSession;
use model::entities::{cash_session, daily_aggregate, monthly_aggregate};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument, warn};

use crate::business_day::{date_key, month_bounds, parse_business_date};
use crate::error::Result;
use crate::CashDesk;

/// Aggregates touched by one recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct Recalculation {
    /// `None` when the tenant has no session on the date
    pub daily: Option<daily_aggregate::Model>,
    pub monthly: monthly_aggregate::Model,
}

impl CashDesk {
    /// Recomputes the daily aggregate of `business_date`, then the monthly
    /// aggregate of its month. Running it again without intervening writes
    /// leaves both rows untouched.
    #[instrument(skip(self))]
    pub async fn recompute_all(
        &self,
        tenant_id: i32,
        business_date: NaiveDate,
        actor: Option<i32>,
    ) -> Result<Recalculation> {
        let daily = self.recompute_daily(tenant_id, business_date, actor).await?;
        let monthly = self
            .recompute_monthly(tenant_id, business_date.year(), business_date.month(), actor)
            .await?;
        Ok(Recalculation { daily, monthly })
    }

    /// Recomputes the daily aggregate of every session day in the month,
    /// then rolls the month up from those fresh dailies.
    #[instrument(skip(self))]
    pub async fn recompute_month(
        &self,
        tenant_id: i32,
        year: i32,
        month: u32,
        actor: Option<i32>,
    ) -> Result<monthly_aggregate::Model> {
        let (first, last) = month_bounds(year, month)?;
        let sessions = CashSession::find()
            .filter(cash_session::Column::TenantId.eq(tenant_id))
            .filter(cash_session::Column::BusinessDate.between(date_key(first), date_key(last)))
            .order_by_asc(cash_session::Column::BusinessDate)
            .all(&self.db)
            .await?;

        for session in &sessions {
            if let Some(key) = session.business_date.as_deref() {
                self.recompute_daily(tenant_id, parse_business_date(key)?, actor).await?;
            }
        }
        debug!(days = sessions.len(), year, month, "Dailies of the month recomputed");

        self.recompute_monthly(tenant_id, year, month, actor).await
    }

    /// Recomputation after a committed write. A failure is logged and left
    /// for the next mutation or query to repair.
    pub(crate) async fn refresh_aggregates(
        &self,
        tenant_id: i32,
        business_date: NaiveDate,
        actor: Option<i32>,
    ) -> Option<Recalculation> {
        match self.recompute_all(tenant_id, business_date, actor).await {
            Ok(recalculation) => Some(recalculation),
            Err(err) => {
                warn!(%err, tenant_id, %business_date, "Recomputation failed, aggregates may be stale");
                None
            }
        }
    }
}
