//! Smoke Screen Unit tests for asset workflow components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path.
//!
#![allow(unused_imports)]

use chrono::{Datelike, Timelike, Utc};
use assetverse::{
    identity::{CurrentUser, Role, require_role},
    records::{AssetKind, AssetRecord, SubscriptionTier, TimeStamp},
    utils::new_uuid_to_bech32,
};

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;
    use assetverse::utils;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let result = new_uuid_to_bech32("asset_");
        assert!(result.is_ok());

        let encoded = result.unwrap();
        assert!(encoded.starts_with("asset_1"));
        assert!(encoded.len() > 10); // UUID should produce substantial output
    }

    /// Test that the function handles empty strings appropriately
    #[test]
    fn handles_empty_hrp() {
        // Empty string should fail
        let result = new_uuid_to_bech32("");
        assert!(result.is_err());
    }

    /// Test that multiple calls generate unique identifiers
    #[test]
    fn generates_unique_ids() {
        let id1 = utils::new_request_id().unwrap();
        let id2 = utils::new_request_id().unwrap();
        let id3 = utils::new_request_id().unwrap();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    /// Test that the record-kind helpers stamp distinct prefixes
    #[test]
    fn record_kinds_get_distinct_prefixes() {
        assert!(utils::new_asset_id().unwrap().starts_with("asset_"));
        assert!(utils::new_request_id().unwrap().starts_with("req_"));
        assert!(utils::new_assignment_id().unwrap().starts_with("assign_"));
    }
}

// RECORDS MODULE TESTS
#[cfg(test)]
mod records_tests {
    use super::*;

    /// Test that TimeStamp::new() creates a timestamp close to current time
    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let now = Utc::now();

        let diff = (now - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1); // Should be within 1 second
    }

    /// Test that TimeStamp can be created with specific date/time values
    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let ts = TimeStamp::new_with(2025, 6, 15, 10, 30, 0);
        let dt = ts.to_datetime_utc();

        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    /// Test that TimeStamp CBOR encoding/decoding round-trips correctly
    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::new();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    fn fresh_asset(total: u32) -> AssetRecord {
        AssetRecord {
            id: "asset_smoke".into(),
            name: "Keyboard".into(),
            kind: AssetKind::Consumable,
            total_quantity: total,
            available_quantity: total,
            hr_email: "hr@example.com".into(),
            company_name: "Example".into(),
            company_logo: None,
            image: None,
            created_at: TimeStamp::new(),
        }
    }

    /// Test that quantity arithmetic holds its bounds on the way down
    #[test]
    fn take_unit_walks_down_to_zero() {
        let mut asset = fresh_asset(3);
        assert!(asset.take_unit());
        assert!(asset.take_unit());
        assert!(asset.take_unit());
        assert!(!asset.take_unit());
        assert_eq!(asset.available_quantity, 0);
    }

    /// Test that quantity arithmetic holds its bounds on the way up
    #[test]
    fn restock_never_exceeds_total() {
        let mut asset = fresh_asset(3);
        asset.take_unit();
        assert_eq!(asset.restock(1), 0);
        assert_eq!(asset.restock(1), 1);
        assert_eq!(asset.available_quantity, asset.total_quantity);
    }

    /// Test that asset records CBOR round-trip with optional fields unset
    #[test]
    fn asset_record_cbor_roundtrip() {
        let original = fresh_asset(2);

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: AssetRecord = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    /// Test that each tier pays for the expected number of seats
    #[test]
    fn tiers_map_to_seat_limits() {
        assert_eq!(SubscriptionTier::Basic.member_limit(), 5);
        assert_eq!(SubscriptionTier::Standard.member_limit(), 10);
        assert_eq!(SubscriptionTier::Premium.member_limit(), 20);
    }
}

// IDENTITY MODULE TESTS
#[cfg(test)]
mod identity_tests {
    use super::*;

    /// Test that the convenience constructors stamp the right role
    #[test]
    fn constructors_set_role() {
        assert_eq!(CurrentUser::hr("a@b.c").role, Role::Hr);
        assert_eq!(CurrentUser::employee("a@b.c").role, Role::Employee);
    }

    /// Test that the role gate passes matching roles and refuses others
    #[test]
    fn require_role_gates_by_role() {
        let worker = CurrentUser::employee("jo@acme.test");
        assert!(require_role(&worker, Role::Employee).is_ok());
        assert!(require_role(&worker, Role::Hr).is_err());
    }
}
