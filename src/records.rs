//! Persisted record types for the asset workflow
use chrono::{DateTime, TimeZone, Utc};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    #[n(0)]
    Returnable,
    #[n(1)]
    Consumable,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffiliationStatus {
    #[n(0)]
    Active,
    #[n(1)]
    Inactive,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    #[n(0)]
    Assigned,
    #[n(1)]
    Returned,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTier {
    #[n(0)]
    Basic,
    #[n(1)]
    Standard,
    #[n(2)]
    Premium,
}

impl SubscriptionTier {
    /// Seats the tier pays for, i.e. the package limit it grants.
    pub fn member_limit(self) -> u32 {
        match self {
            SubscriptionTier::Basic => 5,
            SubscriptionTier::Standard => 10,
            SubscriptionTier::Premium => 20,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A physical asset owned by an HR account, with its quantity counters.
/// `available_quantity` never exceeds `total_quantity` and never goes
/// negative; the two helpers below own that arithmetic.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub kind: AssetKind,
    #[n(3)]
    pub total_quantity: u32,
    #[n(4)]
    pub available_quantity: u32,
    #[n(5)]
    pub hr_email: String,
    #[n(6)]
    pub company_name: String,
    #[n(7)]
    pub company_logo: Option<String>,
    #[n(8)]
    pub image: Option<String>,
    #[n(9)]
    pub created_at: TimeStamp<Utc>,
}

impl AssetRecord {
    pub fn in_stock(&self) -> bool {
        self.available_quantity > 0
    }

    /// Take one unit off the shelf. Fails closed when nothing is available.
    pub fn take_unit(&mut self) -> bool {
        if self.available_quantity == 0 {
            return false;
        }
        self.available_quantity -= 1;
        true
    }

    /// Put `count` units back. Returns how many could not be restocked
    /// because they would push the count above `total_quantity`.
    pub fn restock(&mut self, count: u32) -> u32 {
        let headroom = self.total_quantity - self.available_quantity;
        let accepted = count.min(headroom);
        self.available_quantity += accepted;
        count - accepted
    }
}

/// An employee's ask for one asset unit. Asset and company display fields
/// are copied in at creation time and never refreshed, so listings show the
/// asset as it looked when the request was made.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub asset_id: String,
    #[n(2)]
    pub asset_name: String,
    #[n(3)]
    pub asset_kind: AssetKind,
    #[n(4)]
    pub requester_email: String,
    #[n(5)]
    pub requester_name: String,
    #[n(6)]
    pub hr_email: String,
    #[n(7)]
    pub company_name: String,
    #[n(8)]
    pub status: RequestStatus,
    #[n(9)]
    pub note: Option<String>,
    #[n(10)]
    pub request_date: TimeStamp<Utc>,
    #[n(11)]
    pub approval_date: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub rejection_date: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub processed_by: Option<String>,
}

impl RequestRecord {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub(crate) fn mark_approved(&mut self, by: &str, at: TimeStamp<Utc>) {
        self.status = RequestStatus::Approved;
        self.approval_date = Some(at);
        self.processed_by = Some(by.to_string());
    }

    pub(crate) fn mark_rejected(&mut self, by: &str, at: TimeStamp<Utc>) {
        self.status = RequestStatus::Rejected;
        self.rejection_date = Some(at);
        self.processed_by = Some(by.to_string());
    }
}

/// The employment relation between an employee and an HR account. At most
/// one record ever exists per pair; it toggles between active and inactive
/// and keeps the full join/rejoin/removal history in its date stamps.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AffiliationRecord {
    #[n(0)]
    pub employee_email: String,
    #[n(1)]
    pub hr_email: String,
    #[n(2)]
    pub status: AffiliationStatus,
    #[n(3)]
    pub affiliation_date: TimeStamp<Utc>,
    #[n(4)]
    pub rejoined_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub removed_at: Option<TimeStamp<Utc>>,
}

impl AffiliationRecord {
    pub fn new(employee_email: &str, hr_email: &str, at: TimeStamp<Utc>) -> Self {
        Self {
            employee_email: employee_email.to_string(),
            hr_email: hr_email.to_string(),
            status: AffiliationStatus::Active,
            affiliation_date: at,
            rejoined_at: None,
            removed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AffiliationStatus::Active
    }

    pub(crate) fn reactivate(&mut self, at: TimeStamp<Utc>) {
        self.status = AffiliationStatus::Active;
        self.rejoined_at = Some(at);
    }

    pub(crate) fn deactivate(&mut self, at: TimeStamp<Utc>) {
        self.status = AffiliationStatus::Inactive;
        self.removed_at = Some(at);
    }
}

/// One asset unit held by one employee. A fresh record is written on every
/// approval and closed out on return; records are never reused.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub request_id: String,
    #[n(2)]
    pub asset_id: String,
    #[n(3)]
    pub asset_name: String,
    #[n(4)]
    pub asset_kind: AssetKind,
    #[n(5)]
    pub asset_image: Option<String>,
    #[n(6)]
    pub employee_email: String,
    #[n(7)]
    pub hr_email: String,
    #[n(8)]
    pub status: AssignmentStatus,
    #[n(9)]
    pub assignment_date: TimeStamp<Utc>,
    #[n(10)]
    pub return_date: Option<TimeStamp<Utc>>,
}

impl AssignmentRecord {
    pub fn is_assigned(&self) -> bool {
        self.status == AssignmentStatus::Assigned
    }

    pub(crate) fn mark_returned(&mut self, at: TimeStamp<Utc>) {
        self.status = AssignmentStatus::Returned;
        self.return_date = Some(at);
    }
}

/// HR account subset the workflow touches. `current_employees` is a cache
/// of the active-affiliation count, maintained in the same transactions
/// that write the ledger and resynced by the reconcile sweep.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct HrAccount {
    #[n(0)]
    pub email: String,
    #[n(1)]
    pub company_name: String,
    #[n(2)]
    pub company_logo: Option<String>,
    #[n(3)]
    pub subscription: SubscriptionTier,
    #[n(4)]
    pub package_limit: u32,
    #[n(5)]
    pub current_employees: u32,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl HrAccount {
    pub fn at_capacity(&self) -> bool {
        self.current_employees >= self.package_limit
    }
}

/// Dedupe marker for the payment-completion callback.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    #[n(0)]
    pub txn_id: String,
    #[n(1)]
    pub hr_email: String,
    #[n(2)]
    pub tier: SubscriptionTier,
    #[n(3)]
    pub applied_at: TimeStamp<Utc>,
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    fn asset(total: u32, available: u32) -> AssetRecord {
        AssetRecord {
            id: "asset_test".into(),
            name: "Laptop".into(),
            kind: AssetKind::Returnable,
            total_quantity: total,
            available_quantity: available,
            hr_email: "hr@example.com".into(),
            company_name: "Example".into(),
            company_logo: None,
            image: None,
            created_at: TimeStamp::new(),
        }
    }

    #[test]
    fn take_unit_fails_closed_at_zero() {
        let mut a = asset(2, 1);
        assert!(a.take_unit());
        assert_eq!(a.available_quantity, 0);
        assert!(!a.take_unit());
        assert_eq!(a.available_quantity, 0);
    }

    #[test]
    fn restock_clamps_at_total() {
        let mut a = asset(3, 2);
        assert_eq!(a.restock(5), 4);
        assert_eq!(a.available_quantity, 3);
    }

    #[test]
    fn tier_limits() {
        assert_eq!(SubscriptionTier::Basic.member_limit(), 5);
        assert_eq!(SubscriptionTier::Standard.member_limit(), 10);
        assert_eq!(SubscriptionTier::Premium.member_limit(), 20);
    }

    #[test]
    fn affiliation_toggles_without_losing_history() {
        let joined = TimeStamp::new_with(2025, 1, 10, 9, 0, 0);
        let mut record = AffiliationRecord::new("emp@example.com", "hr@example.com", joined.clone());
        assert!(record.is_active());

        record.deactivate(TimeStamp::new_with(2025, 3, 1, 9, 0, 0));
        assert!(!record.is_active());
        assert!(record.removed_at.is_some());

        record.reactivate(TimeStamp::new_with(2025, 6, 1, 9, 0, 0));
        assert!(record.is_active());
        assert_eq!(record.affiliation_date, joined);
        assert!(record.rejoined_at.is_some());
    }
}
