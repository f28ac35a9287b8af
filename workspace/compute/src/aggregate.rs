//! Derived daily and monthly summaries.
//!
//! Aggregates are caches: both recalculators rebuild a row from its sources,
//! compare it with what is stored and write only when a value changed. The
//! balance arithmetic lives in [`Totals`] and is shared with the session
//! close path.

pub mod daily;
pub mod monthly;

use model::entities::ledger_entry::{self, EntryKind};
use rust_decimal::Decimal;
use serde::Serialize;

/// Income and expense sums of a set of ledger entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
}

impl Totals {
    pub fn new(income: Decimal, expense: Decimal) -> Self {
        Self { income, expense }
    }

    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a ledger_entry::Model>,
    {
        entries.into_iter().fold(Self::default(), |mut totals, entry| {
            match entry.kind {
                EntryKind::Income => totals.income += entry.amount,
                EntryKind::Expense => totals.expense += entry.amount,
            }
            totals
        })
    }

    /// `opening + income - expense`
    pub fn closing_balance(&self, opening: Decimal) -> Decimal {
        opening + self.income - self.expense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::entities::ledger_entry::PaymentMethod;

    fn entry(kind: EntryKind, amount: i64) -> ledger_entry::Model {
        ledger_entry::Model {
            id: 0,
            tenant_id: 1,
            session_id: 1,
            kind,
            category: None,
            description: "test".to_string(),
            amount: Decimal::new(amount, 0),
            payment_method: PaymentMethod::Cash,
            patient_ref: None,
            author_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals_split_by_kind() {
        let entries = vec![
            entry(EntryKind::Income, 50_000),
            entry(EntryKind::Expense, 20_000),
            entry(EntryKind::Income, 1_500),
        ];
        let totals = Totals::from_entries(&entries);
        assert_eq!(totals, Totals::new(Decimal::new(51_500, 0), Decimal::new(20_000, 0)));
        assert_eq!(totals.closing_balance(Decimal::new(100_000, 0)), Decimal::new(131_500, 0));
    }

    #[test]
    fn test_empty_day_keeps_opening_balance() {
        let none: Vec<ledger_entry::Model> = Vec::new();
        let totals = Totals::from_entries(&none);
        assert_eq!(totals, Totals::default());
        assert_eq!(totals.closing_balance(Decimal::new(7, 0)), Decimal::new(7, 0));
    }
}
