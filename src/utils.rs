//! Identifier helpers for workflow records

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique record id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_asset_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("asset_")
}

pub fn new_request_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("req_")
}

pub fn new_assignment_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("assign_")
}
