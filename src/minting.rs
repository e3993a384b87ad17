//! Seam to the external on-chain minting collaborator.

use crate::token::Token;

/// What a successful mint hands back for bookkeeping.
#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub chain_tx_id: String,
    pub contract_address: String,
    pub on_chain_token_id: String,
}

/// The external chain collaborator. May fail or time out; a timeout is
/// treated like any other minting failure by the caller.
pub trait Minter: Send + Sync {
    fn mint(&self, token: &Token) -> anyhow::Result<MintReceipt>;
}
