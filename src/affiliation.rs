//! Affiliation ledger: the employment relation between employees and HRs
//!
//! This ledger is the source of truth for "is this employee currently part
//! of this company". The composite record key means at most one record can
//! ever exist per (hr, employee) pair; approvals toggle it active and
//! removals toggle it inactive, never duplicating it.
use super::error::{WorkflowError, abort};
use super::records::{AffiliationRecord, TimeStamp};
use super::store::{self, Store};
use chrono::Utc;
use sled::transaction::{ConflictableTransactionResult, TransactionalTree};

/// How an approval changed the affiliation ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffiliationChange {
    /// First approval for this pair; a fresh record was written.
    Created,
    /// The pair existed but was inactive; reactivated with a rejoin stamp.
    Rejoined,
    /// Already active; ledger and headcount are untouched.
    AlreadyActive,
}

impl AffiliationChange {
    /// Whether the change added an active member to the HR's headcount.
    pub fn activated(self) -> bool {
        matches!(self, AffiliationChange::Created | AffiliationChange::Rejoined)
    }
}

/// Upsert for the approval path. Approving a second asset for an already
/// active employee is a no-op here, so headcount is never double-counted.
pub(crate) fn upsert_on_approve_tx(
    tx: &TransactionalTree,
    employee_email: &str,
    hr_email: &str,
    now: TimeStamp<Utc>,
) -> ConflictableTransactionResult<AffiliationChange, WorkflowError> {
    let key = store::affiliation_key(hr_email, employee_email);
    let change = match store::tx_get::<AffiliationRecord>(tx, &key)? {
        None => {
            let record = AffiliationRecord::new(employee_email, hr_email, now);
            store::tx_put(tx, &key, &record)?;
            AffiliationChange::Created
        }
        Some(mut record) if !record.is_active() => {
            record.reactivate(now);
            store::tx_put(tx, &key, &record)?;
            AffiliationChange::Rejoined
        }
        Some(_) => AffiliationChange::AlreadyActive,
    };
    Ok(change)
}

/// Deactivate for the removal path. Fails when the pair has no active record.
pub(crate) fn deactivate_tx(
    tx: &TransactionalTree,
    employee_email: &str,
    hr_email: &str,
    now: TimeStamp<Utc>,
) -> ConflictableTransactionResult<AffiliationRecord, WorkflowError> {
    let key = store::affiliation_key(hr_email, employee_email);
    let mut record: AffiliationRecord = store::tx_get(tx, &key)?.ok_or_else(|| {
        abort(WorkflowError::NotFound(format!(
            "no affiliation for {employee_email} at {hr_email}"
        )))
    })?;
    if !record.is_active() {
        return Err(abort(WorkflowError::InvalidState(format!(
            "affiliation for {employee_email} at {hr_email} is already inactive"
        ))));
    }
    record.deactivate(now);
    store::tx_put(tx, &key, &record)?;
    Ok(record)
}

pub fn get(
    store: &Store,
    employee_email: &str,
    hr_email: &str,
) -> anyhow::Result<Option<AffiliationRecord>> {
    store.get(&store::affiliation_key(hr_email, employee_email))
}

pub fn is_active(store: &Store, employee_email: &str, hr_email: &str) -> anyhow::Result<bool> {
    Ok(get(store, employee_email, hr_email)?.is_some_and(|record| record.is_active()))
}

pub fn list_active_for_hr(store: &Store, hr_email: &str) -> anyhow::Result<Vec<AffiliationRecord>> {
    let prefix = format!("{}{hr_email}/", store::AFFILIATION_PREFIX);
    Ok(store
        .scan_prefix::<AffiliationRecord>(&prefix)?
        .into_iter()
        .filter(|record| record.is_active())
        .collect())
}

pub fn active_count_for_hr(store: &Store, hr_email: &str) -> anyhow::Result<u32> {
    Ok(list_active_for_hr(store, hr_email)?.len() as u32)
}

// keyed hr-first, so this one walks the whole ledger
pub fn list_active_for_employee(
    store: &Store,
    employee_email: &str,
) -> anyhow::Result<Vec<AffiliationRecord>> {
    Ok(store
        .scan_prefix::<AffiliationRecord>(store::AFFILIATION_PREFIX)?
        .into_iter()
        .filter(|record| record.employee_email == employee_email && record.is_active())
        .collect())
}
