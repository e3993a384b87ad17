//! Identifier minting for marketplace entities.

use bech32::Bech32m;
use uuid7::uuid7;

/// Id namespaces owned by this crate. Caller-side principals (farmers,
/// buyers, loan officers) arrive already encoded and are not minted here.
pub mod prefix {
    pub const HARVEST: &str = "harvest_";
    pub const LOAN: &str = "loan_";
    pub const TOKEN: &str = "token_";
    pub const TRANSACTION: &str = "txn_";
    pub const REDEMPTION: &str = "redeem_";
}

// uuid7 keeps ids time-ordered within a tree; bech32m makes them
// copy-paste safe behind a readable namespace prefix.
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    Ok(bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?)
}
