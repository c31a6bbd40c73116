//! Service layer API for the asset request workflow
use super::affiliation::{self, AffiliationChange};
use super::assignment;
use super::error::{WorkflowError, abort};
use super::identity::{self, CurrentUser, Role};
use super::inventory;
use super::reconcile::{self, ReconcileReport};
use super::records::{
    AffiliationRecord, AssetKind, AssetRecord, AssignmentRecord, HrAccount, RequestRecord,
    RequestStatus, SubscriptionTier, TimeStamp,
};
use super::store::{self, Store};
use super::subscription::{self, PaymentOutcome};
use super::utils;
use std::sync::Arc;

/// Composite result of an approval, one field per sub-step so callers can
/// audit exactly what moved.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub request: RequestRecord,
    pub assignment_id: String,
    pub asset_available_after: u32,
    pub affiliation: AffiliationChange,
    pub current_employees_after: u32,
}

/// Counts of records touched by an employee removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub assignments_returned: usize,
    pub assets_restocked: usize,
    pub current_employees_after: u32,
}

pub struct AssetService {
    store: Store,
}

impl AssetService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            store: Store::new(instance),
        }
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register an HR account with the seat limit of its starting tier.
    pub fn register_hr_account(
        &self,
        email: &str,
        company_name: &str,
        company_logo: Option<String>,
        tier: SubscriptionTier,
    ) -> anyhow::Result<HrAccount> {
        let account = HrAccount {
            email: email.to_string(),
            company_name: company_name.to_string(),
            company_logo,
            subscription: tier,
            package_limit: tier.member_limit(),
            current_employees: 0,
            created_at: TimeStamp::new(),
        };
        if !self
            .store
            .insert_if_absent(&store::account_key(email), &account)?
        {
            return Err(
                WorkflowError::InvalidState(format!("hr account {email} already exists")).into(),
            );
        }
        Ok(account)
    }

    /// Add a new asset to an HR's inventory, fully stocked.
    pub fn register_asset(
        &self,
        acting: &CurrentUser,
        name: &str,
        kind: AssetKind,
        total_quantity: u32,
        image: Option<String>,
    ) -> anyhow::Result<AssetRecord> {
        identity::require_role(acting, Role::Hr)?;
        let account: HrAccount = self
            .store
            .get(&store::account_key(&acting.email))?
            .ok_or_else(|| WorkflowError::NotFound(format!("hr account {}", acting.email)))?;

        let asset = AssetRecord {
            id: utils::new_asset_id()?,
            name: name.to_string(),
            kind,
            total_quantity,
            available_quantity: total_quantity,
            hr_email: account.email.clone(),
            company_name: account.company_name.clone(),
            company_logo: account.company_logo.clone(),
            image,
            created_at: TimeStamp::new(),
        };
        self.store.put(&store::asset_key(&asset.id), &asset)?;
        Ok(asset)
    }

    /// Edit surface for asset totals. Units already out stay out, so the
    /// available count follows the bounded recompute in [`inventory`].
    pub fn update_asset_quantity(
        &self,
        acting: &CurrentUser,
        asset_id: &str,
        new_total: u32,
    ) -> anyhow::Result<AssetRecord> {
        identity::require_role(acting, Role::Hr)?;
        let asset: AssetRecord = self
            .store
            .get(&store::asset_key(asset_id))?
            .ok_or_else(|| WorkflowError::NotFound(format!("asset {asset_id}")))?;
        if asset.hr_email != acting.email {
            return Err(WorkflowError::Unauthorized.into());
        }
        inventory::edit_quantities(&self.store, asset_id, new_total)
    }

    /// Submit a new request for an asset unit.
    pub fn create_request(
        &self,
        acting: &CurrentUser,
        asset_id: &str,
        requester_name: &str,
        note: Option<String>,
    ) -> anyhow::Result<RequestRecord> {
        identity::require_role(acting, Role::Employee)?;

        // Fast-path guard; the transaction below re-checks both conditions.
        let asset: AssetRecord = self
            .store
            .get(&store::asset_key(asset_id))?
            .ok_or_else(|| WorkflowError::NotFound(format!("asset {asset_id}")))?;
        if !asset.in_stock() {
            return Err(WorkflowError::AssetUnavailable(asset_id.to_string()).into());
        }

        let request = RequestRecord {
            id: utils::new_request_id()?,
            asset_id: asset.id.clone(),
            // display copies frozen at request time, never re-joined
            asset_name: asset.name.clone(),
            asset_kind: asset.kind,
            requester_email: acting.email.clone(),
            requester_name: requester_name.to_string(),
            hr_email: asset.hr_email.clone(),
            company_name: asset.company_name.clone(),
            status: RequestStatus::Pending,
            note,
            request_date: TimeStamp::new(),
            approval_date: None,
            rejection_date: None,
            processed_by: None,
        };

        let guard_key = store::pending_guard_key(asset_id, &acting.email);
        let request_key = store::request_key(&request.id);
        let asset_key = store::asset_key(asset_id);
        self.store.run_tx(|tx| {
            let current: AssetRecord = store::tx_get(tx, &asset_key)?
                .ok_or_else(|| abort(WorkflowError::NotFound(format!("asset {asset_id}"))))?;
            if !current.in_stock() {
                return Err(abort(WorkflowError::AssetUnavailable(asset_id.to_string())));
            }
            // the guard key is the uniqueness constraint on
            // (asset, employee, status=pending)
            if tx.get(guard_key.as_bytes())?.is_some() {
                return Err(abort(WorkflowError::DuplicateRequest));
            }
            tx.insert(guard_key.as_bytes(), request.id.as_bytes())?;
            store::tx_put(tx, &request_key, &request)?;
            Ok(())
        })?;

        log::info!(
            "request {} opened by {} for asset {asset_id}",
            request.id,
            acting.email
        );
        Ok(request)
    }

    /// Approve a pending request. The read-only guards run first so a
    /// refused approval mutates nothing; the mutations then land in one
    /// serializable transaction, so a crash cannot strand the asset
    /// decrement without its assignment.
    pub fn approve_request(
        &self,
        acting: &CurrentUser,
        request_id: &str,
    ) -> anyhow::Result<ApprovalOutcome> {
        identity::require_role(acting, Role::Hr)?;

        let request_key = store::request_key(request_id);
        let request: RequestRecord = self
            .store
            .get(&request_key)?
            .ok_or_else(|| WorkflowError::NotFound(format!("request {request_id}")))?;
        if !request.is_pending() {
            return Err(WorkflowError::InvalidState(format!(
                "request {request_id} is already {:?}",
                request.status
            ))
            .into());
        }
        if request.hr_email != acting.email {
            return Err(WorkflowError::Unauthorized.into());
        }

        // Capacity reads the affiliation ledger, not the cached counter.
        // The counter is re-checked inside the transaction as a backstop.
        let account: HrAccount = self
            .store
            .get(&store::account_key(&acting.email))?
            .ok_or_else(|| WorkflowError::NotFound(format!("hr account {}", acting.email)))?;
        let active = affiliation::active_count_for_hr(&self.store, &acting.email)?;
        if active >= account.package_limit {
            return Err(WorkflowError::CapacityExceeded {
                active,
                limit: account.package_limit,
            }
            .into());
        }

        let asset: AssetRecord = self
            .store
            .get(&store::asset_key(&request.asset_id))?
            .ok_or_else(|| WorkflowError::NotFound(format!("asset {}", request.asset_id)))?;
        if !asset.in_stock() {
            return Err(WorkflowError::AssetUnavailable(asset.id).into());
        }

        // Ids and timestamps are fixed before the transaction; sled may run
        // the closure more than once on conflict.
        let assignment_id = utils::new_assignment_id()?;
        let now = TimeStamp::new();
        let account_key = store::account_key(&acting.email);
        let guard_key = store::pending_guard_key(&request.asset_id, &request.requester_email);
        let acting_email = acting.email.clone();

        let outcome = self.store.run_tx(|tx| {
            let mut request: RequestRecord = store::tx_get(tx, &request_key)?
                .ok_or_else(|| abort(WorkflowError::NotFound(format!("request {request_id}"))))?;
            if !request.is_pending() {
                return Err(abort(WorkflowError::InvalidState(format!(
                    "request {request_id} is already {:?}",
                    request.status
                ))));
            }

            let asset = inventory::take_unit_in_tx(tx, &request.asset_id)?;
            let assignment =
                assignment::create_on_approve_tx(tx, &assignment_id, &request, &asset, now.clone())?;

            let change = affiliation::upsert_on_approve_tx(
                tx,
                &request.requester_email,
                &request.hr_email,
                now.clone(),
            )?;
            let mut account: HrAccount = store::tx_get(tx, &account_key)?.ok_or_else(|| {
                abort(WorkflowError::NotFound(format!("hr account {acting_email}")))
            })?;
            if change.activated() {
                if account.at_capacity() {
                    return Err(abort(WorkflowError::CapacityExceeded {
                        active: account.current_employees,
                        limit: account.package_limit,
                    }));
                }
                account.current_employees += 1;
                store::tx_put(tx, &account_key, &account)?;
            }

            request.mark_approved(&acting_email, now.clone());
            store::tx_put(tx, &request_key, &request)?;
            tx.remove(guard_key.as_bytes())?;

            Ok(ApprovalOutcome {
                request,
                assignment_id: assignment.id,
                asset_available_after: asset.available_quantity,
                affiliation: change,
                current_employees_after: account.current_employees,
            })
        })?;

        log::info!(
            "request {request_id} approved by {}: asset {} now has {} available, affiliation {:?}",
            acting.email,
            outcome.request.asset_id,
            outcome.asset_available_after,
            outcome.affiliation
        );
        Ok(outcome)
    }

    /// Reject a pending request. No inventory or ledger side effects.
    pub fn reject_request(
        &self,
        acting: &CurrentUser,
        request_id: &str,
    ) -> anyhow::Result<RequestRecord> {
        identity::require_role(acting, Role::Hr)?;

        let request_key = store::request_key(request_id);
        let now = TimeStamp::new();
        let acting_email = acting.email.clone();
        let updated = self.store.run_tx(|tx| {
            let mut request: RequestRecord = store::tx_get(tx, &request_key)?
                .ok_or_else(|| abort(WorkflowError::NotFound(format!("request {request_id}"))))?;
            if request.hr_email != acting_email {
                return Err(abort(WorkflowError::Unauthorized));
            }
            if !request.is_pending() {
                return Err(abort(WorkflowError::InvalidState(format!(
                    "request {request_id} is already {:?}",
                    request.status
                ))));
            }
            request.mark_rejected(&acting_email, now.clone());
            store::tx_put(tx, &request_key, &request)?;
            let guard_key = store::pending_guard_key(&request.asset_id, &request.requester_email);
            tx.remove(guard_key.as_bytes())?;
            Ok(request)
        })?;

        log::info!("request {request_id} rejected by {}", acting.email);
        Ok(updated)
    }

    /// Remove an employee: return every held unit to inventory, deactivate
    /// the affiliation, drop the headcount. Refused with zero mutations when
    /// the pair has no active affiliation.
    pub fn remove_employee(
        &self,
        acting: &CurrentUser,
        employee_email: &str,
    ) -> anyhow::Result<RemovalOutcome> {
        identity::require_role(acting, Role::Hr)?;

        let affiliation_record = affiliation::get(&self.store, employee_email, &acting.email)?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!(
                    "no affiliation for {employee_email} at {}",
                    acting.email
                ))
            })?;
        if !affiliation_record.is_active() {
            return Err(WorkflowError::NotFound(format!(
                "{employee_email} is not an active employee of {}",
                acting.email
            ))
            .into());
        }

        // Collect the held assignments up front; transactions cannot scan,
        // so the closure re-reads each one by key and skips any that raced
        // into the Returned state.
        let held: Vec<String> =
            assignment::active_for_pair(&self.store, employee_email, &acting.email)?
                .into_iter()
                .map(|record| record.id)
                .collect();

        let now = TimeStamp::new();
        let account_key = store::account_key(&acting.email);
        let acting_email = acting.email.clone();

        let (outcome, clamps) = self.store.run_tx(|tx| {
            let (returned, per_asset) = assignment::return_all_tx(tx, &held, now.clone())?;
            let mut clamps: Vec<(String, u32)> = Vec::new();
            for (asset_id, count) in &per_asset {
                let clamped = inventory::restock_in_tx(tx, asset_id, *count)?;
                if clamped > 0 {
                    clamps.push((asset_id.clone(), clamped));
                }
            }

            affiliation::deactivate_tx(tx, employee_email, &acting_email, now.clone())?;

            let mut account: HrAccount = store::tx_get(tx, &account_key)?.ok_or_else(|| {
                abort(WorkflowError::NotFound(format!("hr account {acting_email}")))
            })?;
            account.current_employees = account.current_employees.saturating_sub(1);
            store::tx_put(tx, &account_key, &account)?;

            Ok((
                RemovalOutcome {
                    assignments_returned: returned,
                    assets_restocked: per_asset.len(),
                    current_employees_after: account.current_employees,
                },
                clamps,
            ))
        })?;

        for (asset_id, clamped) in clamps {
            log::warn!(
                "restock of {asset_id} clamped {clamped} unit(s) above total while removing {employee_email}"
            );
        }
        log::info!(
            "removed {employee_email} from {}: {} assignment(s) returned across {} asset(s)",
            acting.email,
            outcome.assignments_returned,
            outcome.assets_restocked
        );
        Ok(outcome)
    }

    /// Payment-completion callback, deduped by transaction id.
    pub fn apply_subscription_payment(
        &self,
        txn_id: &str,
        hr_email: &str,
        tier: SubscriptionTier,
    ) -> anyhow::Result<PaymentOutcome> {
        subscription::apply_payment(&self.store, txn_id, hr_email, tier)
    }

    /// Drift sweep for one HR account; see [`reconcile`].
    pub fn reconcile(&self, hr_email: &str) -> anyhow::Result<ReconcileReport> {
        reconcile::reconcile_hr(&self.store, hr_email)
    }

    pub fn reconcile_all(&self) -> anyhow::Result<Vec<ReconcileReport>> {
        reconcile::reconcile_all(&self.store)
    }

    pub fn requests_for_hr(
        &self,
        hr_email: &str,
        status: Option<RequestStatus>,
    ) -> anyhow::Result<Vec<RequestRecord>> {
        Ok(self
            .store
            .scan_prefix::<RequestRecord>(store::REQUEST_PREFIX)?
            .into_iter()
            .filter(|request| {
                request.hr_email == hr_email && status.is_none_or(|s| request.status == s)
            })
            .collect())
    }

    pub fn requests_for_employee(
        &self,
        employee_email: &str,
    ) -> anyhow::Result<Vec<RequestRecord>> {
        Ok(self
            .store
            .scan_prefix::<RequestRecord>(store::REQUEST_PREFIX)?
            .into_iter()
            .filter(|request| request.requester_email == employee_email)
            .collect())
    }

    pub fn assets_for_hr(&self, hr_email: &str) -> anyhow::Result<Vec<AssetRecord>> {
        Ok(self
            .store
            .scan_prefix::<AssetRecord>(store::ASSET_PREFIX)?
            .into_iter()
            .filter(|asset| asset.hr_email == hr_email)
            .collect())
    }

    pub fn assignments_for_employee(
        &self,
        employee_email: &str,
    ) -> anyhow::Result<Vec<AssignmentRecord>> {
        assignment::list_for_employee(&self.store, employee_email)
    }

    pub fn affiliations_for_employee(
        &self,
        employee_email: &str,
    ) -> anyhow::Result<Vec<AffiliationRecord>> {
        affiliation::list_active_for_employee(&self.store, employee_email)
    }
}
