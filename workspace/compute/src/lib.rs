pub mod aggregate;
pub mod audit;
pub mod business_day;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod recalc;
pub mod session;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use chrono_tz::Tz;
use sea_orm::DatabaseConnection;

use audit::{AuditSink, DbAuditSink};
use business_day::BusinessCalendar;

/// The cash engine of one organization timezone.
///
/// Every operation takes the acting [`identity::Principal`] and scopes its
/// reads and writes to the principal's tenant. Cloning is cheap; clones share
/// the connection pool, clock and audit sink.
#[derive(Debug, Clone)]
pub struct CashDesk {
    db: DatabaseConnection,
    calendar: BusinessCalendar,
    audit: Arc<dyn AuditSink>,
}

impl CashDesk {
    /// Creates a desk that audits into the same database.
    pub fn new(db: DatabaseConnection, calendar: BusinessCalendar) -> Self {
        let audit = Arc::new(DbAuditSink::new(db.clone(), calendar.clone()));
        Self { db, calendar, audit }
    }

    /// Replaces the audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }
}

/// Returns a desk on the host clock, the configuration used outside tests.
pub fn default_desk(db: DatabaseConnection, tz: Tz) -> CashDesk {
    CashDesk::new(db, BusinessCalendar::system(tz))
}
