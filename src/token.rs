//! Token entity: a value-transfer certificate earned against a harvest.
//!
//! Tokens carry two coupled state dimensions: the market status and a
//! separate blockchain sub-status tracking the on-chain life of the token.

use crate::error::{MarketError, Result};
use crate::store::Record;
use crate::types::{Amount, TimeStamp};
use crate::utils;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum TokenStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Active,
    #[n(2)]
    Redeemed,
    #[n(3)]
    Expired,
    #[n(4)]
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum BlockchainStatus {
    #[n(0)]
    Unminted,
    #[n(1)]
    PendingMinting,
    #[n(2)]
    Minted,
    #[n(3)]
    TransferPending,
    #[n(4)]
    TransferComplete,
    #[n(5)]
    Failed,
}

pub fn is_redeemable(status: TokenStatus) -> bool {
    matches!(status, TokenStatus::Pending | TokenStatus::Active)
}

/// Minting is a one-shot: only a token that never went on chain qualifies.
/// A Failed attempt does not revert to Unminted, so it stays unmintable.
pub fn is_mintable(status: TokenStatus, chain: BlockchainStatus) -> bool {
    is_redeemable(status) && chain == BlockchainStatus::Unminted
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Token {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub harvest_id: String,
    #[n(2)]
    pub farmer_id: String,
    #[n(3)]
    pub amount: Amount,
    #[n(4)]
    pub earned_date: TimeStamp<Utc>,
    #[n(5)]
    pub expiry_date: TimeStamp<Utc>,
    #[n(6)]
    pub status: TokenStatus,
    #[n(7)]
    pub blockchain_status: BlockchainStatus,
    #[n(8)]
    pub chain_tx_id: Option<String>,
    #[n(9)]
    pub contract_address: Option<String>,
    #[n(10)]
    pub on_chain_token_id: Option<String>,
    #[n(11)]
    pub redemption_amount: Option<Amount>,
    #[n(12)]
    pub redemption_date: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub redemption_tx_id: Option<String>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
}

impl Token {
    /// Redemption fields are set exactly once, when the token moves to
    /// Redeemed, and all three must be present together.
    pub fn validate(&self) -> Result<()> {
        let fields_set = [
            self.redemption_amount.is_some(),
            self.redemption_date.is_some(),
            self.redemption_tx_id.is_some(),
        ];
        if self.status == TokenStatus::Redeemed {
            if fields_set.contains(&false) {
                return Err(MarketError::validation(
                    "redeemed token requires redemption amount, date and tx id",
                ));
            }
        } else if fields_set.contains(&true) {
            return Err(MarketError::validation(
                "redemption fields are only valid on a redeemed token",
            ));
        }
        Ok(())
    }
}

impl Record for Token {
    const ENTITY: &'static str = "token";
    const TREE: &'static str = "tokens";

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> &str {
        &self.farmer_id
    }
    fn stamp_created(&mut self, at: TimeStamp<Utc>) {
        self.created_at = at;
    }
    fn stamp_updated(&mut self, at: TimeStamp<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Default)]
pub struct TokenDraft {
    harvest_id: Option<String>,
    farmer_id: Option<String>,
    amount: Option<Amount>,
    earned_date: Option<TimeStamp<Utc>>,
    expiry_date: Option<TimeStamp<Utc>>,
}

impl TokenDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_harvest(mut self, harvest_id: &str) -> Self {
        self.harvest_id = Some(harvest_id.to_string());
        self
    }
    pub fn set_farmer(mut self, farmer_id: &str) -> Self {
        self.farmer_id = Some(farmer_id.to_string());
        self
    }
    pub fn set_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }
    pub fn set_earned_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.earned_date = Some(date);
        self
    }
    pub fn set_expiry_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.expiry_date = Some(date);
        self
    }

    /// Checks fields and mints a Pending, unminted token. Amounts are held
    /// at 2-decimal precision.
    pub fn finalise(self) -> Result<Token> {
        let harvest_id = self
            .harvest_id
            .ok_or_else(|| MarketError::validation("token requires a harvest id"))?;
        let farmer_id = self
            .farmer_id
            .ok_or_else(|| MarketError::validation("token requires a farmer id"))?;
        let amount = self
            .amount
            .ok_or_else(|| MarketError::validation("token requires an amount"))?;
        if !amount.is_positive() {
            return Err(MarketError::validation("token amount must be positive"));
        }
        let expiry_date = self
            .expiry_date
            .ok_or_else(|| MarketError::validation("token requires an expiry date"))?;

        let now = TimeStamp::now();
        Ok(Token {
            id: utils::new_uuid_to_bech32(utils::prefix::TOKEN)?,
            harvest_id,
            farmer_id,
            amount: amount.round_2dp(),
            earned_date: self.earned_date.unwrap_or_else(TimeStamp::now),
            expiry_date,
            status: TokenStatus::Pending,
            blockchain_status: BlockchainStatus::Unminted,
            chain_tx_id: None,
            contract_address: None,
            on_chain_token_id: None,
            redemption_amount: None,
            redemption_date: None,
            redemption_tx_id: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}
