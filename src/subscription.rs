//! Subscription limits applied by the payment-completion callback
use super::error::{WorkflowError, abort};
use super::records::{HrAccount, PaymentRecord, SubscriptionTier, TimeStamp};
use super::store::{self, Store};

/// Result of applying a payment-completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// False when the transaction id was seen before and nothing changed.
    pub applied: bool,
    pub account: HrAccount,
}

/// Apply a completed checkout to an HR account. The callback transport does
/// not guarantee exactly-once delivery, so the transaction id is the dedupe
/// key: a replay leaves the account untouched. The headcount cache is not
/// recomputed here; that is the reconcile sweep's job.
pub fn apply_payment(
    store: &Store,
    txn_id: &str,
    hr_email: &str,
    tier: SubscriptionTier,
) -> anyhow::Result<PaymentOutcome> {
    let now = TimeStamp::new();
    let payment_key = store::payment_key(txn_id);
    let account_key = store::account_key(hr_email);

    let outcome = store.run_tx(|tx| {
        let account: HrAccount = store::tx_get(tx, &account_key)?
            .ok_or_else(|| abort(WorkflowError::NotFound(format!("hr account {hr_email}"))))?;
        if store::tx_get::<PaymentRecord>(tx, &payment_key)?.is_some() {
            return Ok(PaymentOutcome {
                applied: false,
                account,
            });
        }

        let mut account = account;
        account.subscription = tier;
        account.package_limit = tier.member_limit();
        store::tx_put(tx, &account_key, &account)?;

        let marker = PaymentRecord {
            txn_id: txn_id.to_string(),
            hr_email: hr_email.to_string(),
            tier,
            applied_at: now.clone(),
        };
        store::tx_put(tx, &payment_key, &marker)?;

        Ok(PaymentOutcome {
            applied: true,
            account,
        })
    })?;

    if outcome.applied {
        log::info!(
            "payment {txn_id} set {hr_email} to {:?} (limit {})",
            tier,
            outcome.account.package_limit
        );
    } else {
        log::warn!("payment {txn_id} replayed for {hr_email}; ignored");
    }
    Ok(outcome)
}
