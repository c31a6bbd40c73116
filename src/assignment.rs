//! Assignment ledger: which asset units are held by which employee
use super::error::WorkflowError;
use super::records::{AssetRecord, AssignmentRecord, AssignmentStatus, RequestRecord, TimeStamp};
use super::store::{self, Store};
use chrono::Utc;
use sled::transaction::{ConflictableTransactionResult, TransactionalTree};
use std::collections::BTreeMap;

/// Write the assignment produced by an approval. Every approval gets a
/// fresh record; records are never reused across approve/return cycles.
pub(crate) fn create_on_approve_tx(
    tx: &TransactionalTree,
    assignment_id: &str,
    request: &RequestRecord,
    asset: &AssetRecord,
    now: TimeStamp<Utc>,
) -> ConflictableTransactionResult<AssignmentRecord, WorkflowError> {
    let record = AssignmentRecord {
        id: assignment_id.to_string(),
        request_id: request.id.clone(),
        asset_id: asset.id.clone(),
        // display copies frozen at assignment time
        asset_name: asset.name.clone(),
        asset_kind: asset.kind,
        asset_image: asset.image.clone(),
        employee_email: request.requester_email.clone(),
        hr_email: request.hr_email.clone(),
        status: AssignmentStatus::Assigned,
        assignment_date: now,
        return_date: None,
    };
    store::tx_put(tx, &store::assignment_key(assignment_id), &record)?;
    Ok(record)
}

/// Mark the given assignments returned and tally the returned units per
/// asset, so an employee holding several units of one asset restocks all of
/// them. Records that already left the Assigned state are skipped, which
/// keeps a replay convergent instead of double-restocking.
pub(crate) fn return_all_tx(
    tx: &TransactionalTree,
    assignment_ids: &[String],
    now: TimeStamp<Utc>,
) -> ConflictableTransactionResult<(usize, BTreeMap<String, u32>), WorkflowError> {
    let mut returned = 0usize;
    let mut per_asset: BTreeMap<String, u32> = BTreeMap::new();
    for id in assignment_ids {
        let key = store::assignment_key(id);
        let Some(mut record) = store::tx_get::<AssignmentRecord>(tx, &key)? else {
            continue;
        };
        if !record.is_assigned() {
            continue;
        }
        record.mark_returned(now.clone());
        store::tx_put(tx, &key, &record)?;
        *per_asset.entry(record.asset_id).or_insert(0) += 1;
        returned += 1;
    }
    Ok((returned, per_asset))
}

/// Active assignments held by an employee at one HR.
pub fn active_for_pair(
    store: &Store,
    employee_email: &str,
    hr_email: &str,
) -> anyhow::Result<Vec<AssignmentRecord>> {
    Ok(store
        .scan_prefix::<AssignmentRecord>(store::ASSIGNMENT_PREFIX)?
        .into_iter()
        .filter(|record| {
            record.employee_email == employee_email
                && record.hr_email == hr_email
                && record.is_assigned()
        })
        .collect())
}

pub fn list_for_employee(
    store: &Store,
    employee_email: &str,
) -> anyhow::Result<Vec<AssignmentRecord>> {
    Ok(store
        .scan_prefix::<AssignmentRecord>(store::ASSIGNMENT_PREFIX)?
        .into_iter()
        .filter(|record| record.employee_email == employee_email)
        .collect())
}
