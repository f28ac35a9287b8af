//! Ledger entries: typed income and expense movements bound to an open
//! cash session of the current business day.

use chrono::NaiveDate;
use model::entities::cash_session;
use model::entities::ledger_entry::{self, EntryKind, PaymentMethod};
use model::entities::prelude::{CashSession, LedgerEntry};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditAction;
use crate::business_day::date_key;
use crate::error::{CashError, Result};
use crate::identity::Principal;
use crate::recalc::Recalculation;
use crate::CashDesk;

/// 10^12, the first magnitude a `(16, 4)` money column cannot hold.
const MONEY_LIMIT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// True when `value` fits a `(16, 4)` money column: at most 12 integer
/// digits and 4 decimals.
pub fn fits_money_column(value: Decimal) -> bool {
    value.normalize().scale() <= 4 && value.abs() < MONEY_LIMIT
}

/// Parses an entry kind, ignoring case.
pub fn parse_kind(raw: &str) -> Result<EntryKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "income" => Ok(EntryKind::Income),
        "expense" => Ok(EntryKind::Expense),
        _ => Err(CashError::InvalidKind(raw.to_string())),
    }
}

/// Parses a payment method, ignoring case.
pub fn parse_payment_method(raw: &str) -> Result<PaymentMethod> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cash" => Ok(PaymentMethod::Cash),
        "transfer" => Ok(PaymentMethod::Transfer),
        "card" => Ok(PaymentMethod::Card),
        "other" => Ok(PaymentMethod::Other),
        _ => Err(CashError::InvalidPaymentMethod(raw.to_string())),
    }
}

/// A movement to record in today's session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub category: Option<String>,
    pub description: String,
    pub amount: Decimal,
    /// Defaults to cash
    pub payment_method: Option<PaymentMethod>,
    pub patient_ref: Option<String>,
}

impl NewEntry {
    pub fn new(kind: EntryKind, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            kind,
            category: None,
            description: description.into(),
            amount,
            payment_method: None,
            patient_ref: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn patient_ref(mut self, patient_ref: impl Into<String>) -> Self {
        self.patient_ref = Some(patient_ref.into());
        self
    }
}

/// Fields to change on an existing entry; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub kind: Option<EntryKind>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub patient_ref: Option<String>,
}

/// Result of a ledger mutation together with the recomputed aggregates.
///
/// `recalculation` is `None` when the write succeeded but the aggregates could
/// not be refreshed; the next mutation or query repairs them.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryWrite {
    pub entry: ledger_entry::Model,
    pub recalculation: Option<Recalculation>,
}

fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount > Decimal::ZERO && fits_money_column(amount) {
        Ok(amount)
    } else {
        Err(CashError::InvalidAmount(amount))
    }
}

fn validate_description(description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(CashError::InvalidDescription);
    }
    Ok(trimmed.to_string())
}

impl CashDesk {
    /// Entries of a tenant whose creation instant lies inside the business
    /// day, oldest first. Membership is by time range, not by session.
    pub async fn entries_in_day(&self, tenant_id: i32, business_date: NaiveDate) -> Result<Vec<ledger_entry::Model>> {
        let bounds = self.calendar.day_bounds_utc(business_date);
        let entries = LedgerEntry::find()
            .filter(ledger_entry::Column::TenantId.eq(tenant_id))
            .filter(ledger_entry::Column::CreatedAt.between(bounds.start_utc, bounds.end_utc))
            .order_by_asc(ledger_entry::Column::CreatedAt)
            .order_by_asc(ledger_entry::Column::Id)
            .all(&self.db)
            .await?;
        Ok(entries)
    }

    #[instrument(skip(self, new), fields(tenant_id = actor.tenant_id, kind = new.kind.as_str()))]
    pub async fn create_entry(&self, actor: &Principal, new: NewEntry) -> Result<EntryWrite> {
        let amount = validate_amount(new.amount)?;
        let description = validate_description(&new.description)?;

        let today = self.calendar.today();
        let session = self
            .open_session_on(actor.tenant_id, &date_key(today))
            .await?
            .ok_or_else(|| CashError::NoOpenSession(date_key(today)))?;

        let now = self.calendar.now();
        let entry = ledger_entry::ActiveModel {
            tenant_id: Set(actor.tenant_id),
            session_id: Set(session.id),
            kind: Set(new.kind),
            category: Set(new.category),
            description: Set(description),
            amount: Set(amount),
            payment_method: Set(new.payment_method.unwrap_or(PaymentMethod::Cash)),
            patient_ref: Set(new.patient_ref),
            author_id: Set(actor.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        info!(entry_id = entry.id, session_id = session.id, %amount, "Ledger entry created");

        let recalculation = self.refresh_aggregates(actor.tenant_id, today, Some(actor.id)).await;
        self.audit
            .record(
                actor.id,
                actor.tenant_id,
                AuditAction::CreateEntry,
                json!({
                    "entry_id": entry.id,
                    "session_id": session.id,
                    "kind": entry.kind.as_str(),
                    "amount": entry.amount,
                    "payment_method": entry.payment_method.as_str(),
                    "description": entry.description,
                }),
            )
            .await;

        Ok(EntryWrite { entry, recalculation })
    }

    #[instrument(skip(self, patch), fields(tenant_id = actor.tenant_id))]
    pub async fn edit_entry(&self, actor: &Principal, entry_id: i32, patch: EntryPatch) -> Result<EntryWrite> {
        let amount = patch.amount.map(validate_amount).transpose()?;
        let description = patch.description.as_deref().map(validate_description).transpose()?;

        let entry = self.mutable_entry(actor, entry_id).await?;
        let business_date = self.calendar.business_date_of(Some(entry.created_at));
        let previous_amount = entry.amount;
        let previous_kind = entry.kind;

        let mut active = entry.into_active_model();
        if let Some(kind) = patch.kind {
            active.kind = Set(kind);
        }
        if let Some(category) = patch.category {
            active.category = Set(Some(category));
        }
        if let Some(description) = description {
            active.description = Set(description);
        }
        if let Some(amount) = amount {
            active.amount = Set(amount);
        }
        if let Some(method) = patch.payment_method {
            active.payment_method = Set(method);
        }
        if let Some(patient_ref) = patch.patient_ref {
            active.patient_ref = Set(Some(patient_ref));
        }
        active.updated_at = Set(self.calendar.now());
        let entry = active.update(&self.db).await?;
        info!(entry_id, "Ledger entry edited");

        let recalculation = self.refresh_aggregates(actor.tenant_id, business_date, Some(actor.id)).await;
        self.audit
            .record(
                actor.id,
                actor.tenant_id,
                AuditAction::EditEntry,
                json!({
                    "entry_id": entry.id,
                    "before": { "kind": previous_kind.as_str(), "amount": previous_amount },
                    "after": { "kind": entry.kind.as_str(), "amount": entry.amount },
                }),
            )
            .await;

        Ok(EntryWrite { entry, recalculation })
    }

    #[instrument(skip(self), fields(tenant_id = actor.tenant_id))]
    pub async fn delete_entry(&self, actor: &Principal, entry_id: i32) -> Result<EntryWrite> {
        let entry = self.mutable_entry(actor, entry_id).await?;
        let business_date = self.calendar.business_date_of(Some(entry.created_at));

        entry.clone().delete(&self.db).await?;
        info!(entry_id, "Ledger entry deleted");

        let recalculation = self.refresh_aggregates(actor.tenant_id, business_date, Some(actor.id)).await;
        self.audit
            .record(
                actor.id,
                actor.tenant_id,
                AuditAction::DeleteEntry,
                json!({
                    "entry_id": entry.id,
                    "session_id": entry.session_id,
                    "kind": entry.kind.as_str(),
                    "amount": entry.amount,
                }),
            )
            .await;

        Ok(EntryWrite { entry, recalculation })
    }

    /// Loads an entry the actor may change: it must belong to the tenant,
    /// its session must be open on today's business date, and the actor
    /// must be an owner or the entry's author.
    async fn mutable_entry(&self, actor: &Principal, entry_id: i32) -> Result<ledger_entry::Model> {
        let entry = LedgerEntry::find_by_id(entry_id)
            .filter(ledger_entry::Column::TenantId.eq(actor.tenant_id))
            .one(&self.db)
            .await?
            .ok_or(CashError::EntryNotFound(entry_id))?;

        let today = date_key(self.calendar.today());
        let session = CashSession::find_by_id(entry.session_id)
            .filter(cash_session::Column::TenantId.eq(actor.tenant_id))
            .one(&self.db)
            .await?;
        let editable = session
            .as_ref()
            .is_some_and(|s| s.is_open && s.business_date.as_deref() == Some(today.as_str()));
        if !editable {
            debug!(entry_id, session_id = entry.session_id, "Entry belongs to a closed session");
            return Err(CashError::SessionClosed(entry_id));
        }

        if !actor.is_owner() && entry.author_id != actor.id {
            warn!(entry_id, actor = actor.id, author = entry.author_id, "Entry change refused");
            return Err(CashError::Forbidden {
                actor: actor.id,
                entry_id,
            });
        }

        Ok(entry)
    }
}
