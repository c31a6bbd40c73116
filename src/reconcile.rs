//! Reconciliation sweep for counter and inventory drift
//!
//! Approve and remove commit atomically, but the store can still carry
//! drift from history written outside those transactions or from manual
//! edits. The sweep makes the ledgers authoritative again: the headcount
//! cache is resynced from the affiliation ledger, availability is recomputed
//! from outstanding assignments, and request/assignment mismatches are
//! reported for a human decision rather than guessed at. The sweep assumes
//! a quiet system; rerun it until the report comes back clean.
use super::affiliation;
use super::error::{WorkflowError, abort};
use super::records::{AssetRecord, AssignmentRecord, HrAccount, RequestRecord, RequestStatus};
use super::store::{self, Store};
use std::collections::{BTreeMap, BTreeSet};

/// One asset whose stored availability disagreed with the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityRepair {
    pub asset_id: String,
    pub stored_available: u32,
    pub expected_available: u32,
}

/// Outcome of one per-HR sweep. Counter and quantity drift are repaired in
/// place; the mismatch lists are report-only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub hr_email: String,
    /// (stored, ledger) when the headcount cache had drifted.
    pub counter_drift: Option<(u32, u32)>,
    pub quantity_repairs: Vec<QuantityRepair>,
    pub approved_without_assignment: Vec<String>,
    pub assignments_without_approved_request: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.counter_drift.is_none()
            && self.quantity_repairs.is_empty()
            && self.approved_without_assignment.is_empty()
            && self.assignments_without_approved_request.is_empty()
    }
}

pub fn reconcile_hr(store: &Store, hr_email: &str) -> anyhow::Result<ReconcileReport> {
    let mut report = ReconcileReport {
        hr_email: hr_email.to_string(),
        ..Default::default()
    };

    // Headcount: the affiliation ledger is authoritative, the stored
    // counter is a cache.
    let ledger_count = affiliation::active_count_for_hr(store, hr_email)?;
    let account_key = store::account_key(hr_email);
    let account: HrAccount = store
        .get(&account_key)?
        .ok_or_else(|| WorkflowError::NotFound(format!("hr account {hr_email}")))?;
    if account.current_employees != ledger_count {
        report.counter_drift = Some((account.current_employees, ledger_count));
        store.run_tx(|tx| {
            let mut account: HrAccount = store::tx_get(tx, &account_key)?
                .ok_or_else(|| abort(WorkflowError::NotFound(format!("hr account {hr_email}"))))?;
            account.current_employees = ledger_count;
            store::tx_put(tx, &account_key, &account)
        })?;
        log::warn!(
            "resynced headcount for {hr_email}: {} -> {ledger_count}",
            account.current_employees
        );
    }

    // Cross-check approved requests against the assignment ledger.
    let requests: Vec<RequestRecord> = store
        .scan_prefix::<RequestRecord>(store::REQUEST_PREFIX)?
        .into_iter()
        .filter(|request| request.hr_email == hr_email)
        .collect();
    let assignments: Vec<AssignmentRecord> = store
        .scan_prefix::<AssignmentRecord>(store::ASSIGNMENT_PREFIX)?
        .into_iter()
        .filter(|assignment| assignment.hr_email == hr_email)
        .collect();

    let approved: BTreeSet<&str> = requests
        .iter()
        .filter(|request| request.status == RequestStatus::Approved)
        .map(|request| request.id.as_str())
        .collect();
    // a returned assignment still proves its request got one
    let assigned_requests: BTreeSet<&str> = assignments
        .iter()
        .map(|assignment| assignment.request_id.as_str())
        .collect();

    report.approved_without_assignment = approved
        .iter()
        .filter(|id| !assigned_requests.contains(**id))
        .map(|id| id.to_string())
        .collect();
    report.assignments_without_approved_request = assignments
        .iter()
        .filter(|assignment| !approved.contains(assignment.request_id.as_str()))
        .map(|assignment| assignment.id.clone())
        .collect();
    for id in &report.approved_without_assignment {
        log::warn!("approved request {id} has no assignment on record");
    }
    for id in &report.assignments_without_approved_request {
        log::warn!("assignment {id} has no approved request on record");
    }

    // Inventory: available must equal total minus the units currently out.
    let mut outstanding: BTreeMap<&str, u32> = BTreeMap::new();
    for assignment in assignments.iter().filter(|a| a.is_assigned()) {
        *outstanding.entry(assignment.asset_id.as_str()).or_insert(0) += 1;
    }
    let assets: Vec<AssetRecord> = store
        .scan_prefix::<AssetRecord>(store::ASSET_PREFIX)?
        .into_iter()
        .filter(|asset| asset.hr_email == hr_email)
        .collect();
    for asset in &assets {
        let out = outstanding.get(asset.id.as_str()).copied().unwrap_or(0);
        let expected = asset.total_quantity.saturating_sub(out);
        if asset.available_quantity == expected {
            continue;
        }
        report.quantity_repairs.push(QuantityRepair {
            asset_id: asset.id.clone(),
            stored_available: asset.available_quantity,
            expected_available: expected,
        });
        let key = store::asset_key(&asset.id);
        store.run_tx(|tx| {
            let Some(mut current) = store::tx_get::<AssetRecord>(tx, &key)? else {
                return Ok(());
            };
            current.available_quantity = expected;
            store::tx_put(tx, &key, &current)
        })?;
        log::warn!(
            "repaired availability of {}: {} -> {expected}",
            asset.id,
            asset.available_quantity
        );
    }

    Ok(report)
}

pub fn reconcile_all(store: &Store) -> anyhow::Result<Vec<ReconcileReport>> {
    let accounts: Vec<HrAccount> = store.scan_prefix(store::ACCOUNT_PREFIX)?;
    accounts
        .iter()
        .map(|account| reconcile_hr(store, &account.email))
        .collect()
}
