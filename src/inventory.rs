//! Quantity coordination for asset records
//!
//! The request lifecycle and the assignment ledger are the only writers of
//! `available_quantity`. Standalone ops use compare-and-swap loops so a
//! conditional decrement is a single atomic step; the `_in_tx` variants run
//! inside the approve/remove transactions.
use super::error::{WorkflowError, abort};
use super::records::AssetRecord;
use super::store::{self, Store};
use sled::transaction::{ConflictableTransactionResult, TransactionalTree};

/// Atomically take one unit off an asset. Returns false when no unit is
/// available; the count never goes negative, even under concurrent callers.
pub fn try_decrement(store: &Store, asset_id: &str) -> anyhow::Result<bool> {
    let key = store::asset_key(asset_id);
    loop {
        let Some(raw) = store.db().get(key.as_bytes())? else {
            return Err(WorkflowError::NotFound(format!("asset {asset_id}")).into());
        };
        let mut asset: AssetRecord = minicbor::decode(raw.as_ref())?;
        if !asset.take_unit() {
            return Ok(false);
        }
        let updated = minicbor::to_vec(&asset)?;
        match store
            .db()
            .compare_and_swap(key.as_bytes(), Some(raw), Some(updated))?
        {
            Ok(()) => return Ok(true),
            // lost the race, reread and retry
            Err(_) => continue,
        }
    }
}

/// Put `count` units back on an asset. Clamped at `total_quantity`; a clamp
/// means the counters drifted and the reconcile sweep should run.
pub fn increment(store: &Store, asset_id: &str, count: u32) -> anyhow::Result<AssetRecord> {
    let key = store::asset_key(asset_id);
    loop {
        let Some(raw) = store.db().get(key.as_bytes())? else {
            return Err(WorkflowError::NotFound(format!("asset {asset_id}")).into());
        };
        let mut asset: AssetRecord = minicbor::decode(raw.as_ref())?;
        let clamped = asset.restock(count);
        let updated = minicbor::to_vec(&asset)?;
        match store
            .db()
            .compare_and_swap(key.as_bytes(), Some(raw), Some(updated))?
        {
            Ok(()) => {
                if clamped > 0 {
                    log::warn!("restock of {asset_id} clamped {clamped} unit(s) above total");
                }
                return Ok(asset);
            }
            Err(_) => continue,
        }
    }
}

/// Bounded recompute for the asset edit surface: units already out stay
/// out, so `new_available = new_total - (old_total - old_available)`.
/// Rejected when more units are outstanding than the new total covers.
pub fn edit_quantities(
    store: &Store,
    asset_id: &str,
    new_total: u32,
) -> anyhow::Result<AssetRecord> {
    let key = store::asset_key(asset_id);
    loop {
        let Some(raw) = store.db().get(key.as_bytes())? else {
            return Err(WorkflowError::NotFound(format!("asset {asset_id}")).into());
        };
        let mut asset: AssetRecord = minicbor::decode(raw.as_ref())?;
        let outstanding = asset.total_quantity - asset.available_quantity;
        if new_total < outstanding {
            return Err(WorkflowError::InvalidState(format!(
                "cannot shrink asset {asset_id} to {new_total}: {outstanding} unit(s) are out on assignment"
            ))
            .into());
        }
        asset.total_quantity = new_total;
        asset.available_quantity = new_total - outstanding;
        let updated = minicbor::to_vec(&asset)?;
        match store
            .db()
            .compare_and_swap(key.as_bytes(), Some(raw), Some(updated))?
        {
            Ok(()) => return Ok(asset),
            Err(_) => continue,
        }
    }
}

/// Transactional decrement used by the approval path.
pub(crate) fn take_unit_in_tx(
    tx: &TransactionalTree,
    asset_id: &str,
) -> ConflictableTransactionResult<AssetRecord, WorkflowError> {
    let key = store::asset_key(asset_id);
    let mut asset: AssetRecord = store::tx_get(tx, &key)?
        .ok_or_else(|| abort(WorkflowError::NotFound(format!("asset {asset_id}"))))?;
    if !asset.take_unit() {
        return Err(abort(WorkflowError::AssetUnavailable(asset_id.to_string())));
    }
    store::tx_put(tx, &key, &asset)?;
    Ok(asset)
}

/// Transactional restock used by the removal path. Returns the clamped
/// unit count so the caller can log it after commit.
pub(crate) fn restock_in_tx(
    tx: &TransactionalTree,
    asset_id: &str,
    count: u32,
) -> ConflictableTransactionResult<u32, WorkflowError> {
    let key = store::asset_key(asset_id);
    let mut asset: AssetRecord = store::tx_get(tx, &key)?
        .ok_or_else(|| abort(WorkflowError::NotFound(format!("asset {asset_id}"))))?;
    let clamped = asset.restock(count);
    store::tx_put(tx, &key, &asset)?;
    Ok(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AssetKind, TimeStamp};
    use std::sync::Arc;

    fn seeded_store(total: u32, available: u32) -> (Store, String) {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = Store::new(Arc::new(db));
        let asset = AssetRecord {
            id: "asset_test".into(),
            name: "Monitor".into(),
            kind: AssetKind::Returnable,
            total_quantity: total,
            available_quantity: available,
            hr_email: "hr@example.com".into(),
            company_name: "Example".into(),
            company_logo: None,
            image: None,
            created_at: TimeStamp::new(),
        };
        store.put(&store::asset_key(&asset.id), &asset).unwrap();
        (store, asset.id)
    }

    #[test]
    fn decrement_drains_then_fails_closed() {
        let (store, id) = seeded_store(2, 2);
        assert!(try_decrement(&store, &id).unwrap());
        assert!(try_decrement(&store, &id).unwrap());
        assert!(!try_decrement(&store, &id).unwrap());

        let asset: AssetRecord = store.get(&store::asset_key(&id)).unwrap().unwrap();
        assert_eq!(asset.available_quantity, 0);
    }

    #[test]
    fn increment_clamps_at_total() {
        let (store, id) = seeded_store(3, 2);
        let asset = increment(&store, &id, 5).unwrap();
        assert_eq!(asset.available_quantity, 3);
    }

    #[test]
    fn edit_rejects_stranding_outstanding_units() {
        // 3 of 5 units are out on assignment
        let (store, id) = seeded_store(5, 2);
        let err = edit_quantities(&store, &id, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::InvalidState(_))
        ));

        let asset = edit_quantities(&store, &id, 4).unwrap();
        assert_eq!(asset.total_quantity, 4);
        assert_eq!(asset.available_quantity, 1);
    }

    #[test]
    fn decrement_missing_asset_is_not_found() {
        let (store, _) = seeded_store(1, 1);
        let err = try_decrement(&store, "asset_missing").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkflowError>(),
            Some(WorkflowError::NotFound(_))
        ));
    }
}
