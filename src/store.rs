//! Document store layer over sled
//!
//! All records live in the default tree under `<kind>/<key>` string keys.
//! The composite affiliation key doubles as the at-most-one-record-per-pair
//! constraint, and the pending guard key is the uniqueness constraint for
//! duplicate pending requests.
use super::error::WorkflowError;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use std::sync::Arc;

pub const ASSET_PREFIX: &str = "asset/";
pub const REQUEST_PREFIX: &str = "request/";
pub const ASSIGNMENT_PREFIX: &str = "assignment/";
pub const AFFILIATION_PREFIX: &str = "affiliation/";
pub const ACCOUNT_PREFIX: &str = "account/";

pub fn asset_key(id: &str) -> String {
    format!("{ASSET_PREFIX}{id}")
}

pub fn request_key(id: &str) -> String {
    format!("{REQUEST_PREFIX}{id}")
}

pub fn assignment_key(id: &str) -> String {
    format!("{ASSIGNMENT_PREFIX}{id}")
}

// hr first so one HR's ledger is a contiguous prefix scan
pub fn affiliation_key(hr_email: &str, employee_email: &str) -> String {
    format!("{AFFILIATION_PREFIX}{hr_email}/{employee_email}")
}

pub fn account_key(email: &str) -> String {
    format!("{ACCOUNT_PREFIX}{email}")
}

pub fn payment_key(txn_id: &str) -> String {
    format!("payment/{txn_id}")
}

// exists exactly while a request for (asset, employee) is pending
pub fn pending_guard_key(asset_id: &str, employee_email: &str) -> String {
    format!("pending/{asset_id}/{employee_email}")
}

#[derive(Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Ok(Self {
            instance: Arc::new(sled::open(path)?),
        })
    }

    pub fn db(&self) -> &sled::Db {
        &self.instance
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.get(key.as_bytes())? {
            Some(raw) => Ok(Some(minicbor::decode(raw.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn put<T: minicbor::Encode<()>>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.instance.insert(key.as_bytes(), minicbor::to_vec(value)?)?;
        Ok(())
    }

    /// Decode every record stored under a key prefix.
    pub fn scan_prefix<T>(&self, prefix: &str) -> anyhow::Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut out = Vec::new();
        for entry in self.instance.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = entry?;
            out.push(minicbor::decode(raw.as_ref())?);
        }
        Ok(out)
    }

    /// Atomic insert-if-absent. Returns false when the key already exists.
    pub fn insert_if_absent<T: minicbor::Encode<()>>(
        &self,
        key: &str,
        value: &T,
    ) -> anyhow::Result<bool> {
        let bytes = minicbor::to_vec(value)?;
        let swap =
            self.instance
                .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        Ok(swap.is_ok())
    }

    /// Run a closure inside a serializable transaction over the store,
    /// mapping business aborts back out of sled's transaction error. The
    /// closure may run more than once on conflict, so it must be pure over
    /// its captures.
    pub(crate) fn run_tx<R>(
        &self,
        f: impl Fn(&TransactionalTree) -> ConflictableTransactionResult<R, WorkflowError>,
    ) -> anyhow::Result<R> {
        match self.instance.transaction(f) {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(err)) => Err(err.into()),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }
}

pub(crate) fn tx_get<T>(
    tx: &TransactionalTree,
    key: &str,
) -> ConflictableTransactionResult<Option<T>, WorkflowError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tx.get(key.as_bytes())? {
        Some(raw) => match minicbor::decode(raw.as_ref()) {
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(ConflictableTransactionError::Abort(
                WorkflowError::CorruptRecord(format!("{key}: {err}")),
            )),
        },
        None => Ok(None),
    }
}

pub(crate) fn tx_put<T: minicbor::Encode<()>>(
    tx: &TransactionalTree,
    key: &str,
    value: &T,
) -> ConflictableTransactionResult<(), WorkflowError> {
    let bytes = minicbor::to_vec(value).map_err(|err| {
        ConflictableTransactionError::Abort(WorkflowError::CorruptRecord(format!("{key}: {err}")))
    })?;
    tx.insert(key.as_bytes(), bytes)?;
    Ok(())
}
