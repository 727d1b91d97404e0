//! Utility functions for id minting

use bech32::Bech32m;
use uuid7::{Uuid, uuid7};

// construct a unique entity id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Mint an id and also return the underlying uuid7. The raw uuid bytes sort
/// by creation time, which makes them usable as a time-ordered storage key.
pub fn new_keyed_id(hrp: &str) -> anyhow::Result<(Uuid, String)> {
    let id = uuid7();
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, id.as_bytes())?;
    Ok((id, encode))
}

// encoding only fails for a malformed hrp, and the crate mints ids with
// constant prefixes
pub(crate) fn mint_id(hrp: &str) -> String {
    new_uuid_to_bech32(hrp).expect("failed to encode id with a constant hrp prefix.")
}

pub(crate) fn mint_keyed_id(hrp: &str) -> (Uuid, String) {
    new_keyed_id(hrp).expect("failed to encode id with a constant hrp prefix.")
}
