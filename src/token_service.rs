//! Service layer for the token status machine and its blockchain sub-status.

use crate::error::{MarketError, Result};
use crate::ledger::{Ledger, best_effort};
use crate::minting::Minter;
use crate::store::{Page, Store};
use crate::token::{
    BlockchainStatus, Token, TokenDraft, TokenStatus, is_mintable, is_redeemable,
};
use crate::transaction::{PaymentMethod, TransactionDraft, TransactionType};
use crate::types::{Amount, TimeStamp};
use crate::utils;
use chrono::Utc;
use std::sync::Arc;

/// Unconditional blockchain-status field update; see `update_blockchain_status`.
#[derive(Debug)]
pub struct BlockchainUpdate {
    pub status: BlockchainStatus,
    pub chain_tx_id: Option<String>,
    pub contract_address: Option<String>,
    pub on_chain_token_id: Option<String>,
}

#[derive(Debug)]
pub struct RedemptionRequest {
    pub amount: Amount,
    pub redemption_date: Option<TimeStamp<Utc>>,
    pub redemption_tx_id: Option<String>,
    pub notes: Option<String>,
}

pub struct TokenService {
    store: Store<Token>,
    ledger: Arc<dyn Ledger>,
    minter: Arc<dyn Minter>,
}

impl TokenService {
    pub fn new(store: Store<Token>, ledger: Arc<dyn Ledger>, minter: Arc<dyn Minter>) -> Self {
        Self {
            store,
            ledger,
            minter,
        }
    }

    pub fn create(&self, draft: TokenDraft) -> Result<Token> {
        self.store.create(draft.finalise()?)
    }

    pub fn get(&self, token_id: &str) -> Result<Token> {
        self.store.get(token_id)
    }

    pub fn list_for_farmer(&self, farmer_id: &str, page: Page) -> Result<(Vec<Token>, usize)> {
        self.store.find_by_owner(farmer_id, page)
    }

    /// Record what the chain reported. The only gate is that the token
    /// exists; the market status is untouched. Crossing into Minted emits a
    /// TokenIssuance ledger entry, best-effort.
    pub fn update_blockchain_status(
        &self,
        token_id: &str,
        change: BlockchainUpdate,
    ) -> Result<Token> {
        let mut token = self.store.get(token_id)?;
        let was_minted = token.blockchain_status == BlockchainStatus::Minted;

        token.blockchain_status = change.status;
        if let Some(tx_id) = change.chain_tx_id {
            token.chain_tx_id = Some(tx_id);
        }
        if let Some(address) = change.contract_address {
            token.contract_address = Some(address);
        }
        if let Some(on_chain_id) = change.on_chain_token_id {
            token.on_chain_token_id = Some(on_chain_id);
        }
        self.store.save(&mut token)?;

        if change.status == BlockchainStatus::Minted && !was_minted {
            best_effort(
                "token issuance",
                self.ledger.record(
                    TransactionDraft::new()
                        .set_farmer(&token.farmer_id)
                        .set_harvest(&token.harvest_id)
                        .set_kind(TransactionType::TokenIssuance)
                        .set_amount(token.amount)
                        .set_payment_method(PaymentMethod::Wallet)
                        .set_reference(&token.id),
                ),
            );
        }

        Ok(token)
    }

    /// Put the token on chain. The token is marked PendingMinting before the
    /// external call; if the collaborator fails the attempt is recorded as
    /// Failed and the original error is returned. A Failed token is not
    /// reverted to Unminted, so retrying requires a distinct decision.
    pub fn mint(&self, token_id: &str) -> Result<Token> {
        let mut token = self.store.get(token_id)?;

        if !is_mintable(token.status, token.blockchain_status) {
            return Err(MarketError::conflict(format!(
                "token cannot be minted. Status: {:?}, blockchain status: {:?}",
                token.status, token.blockchain_status
            )));
        }

        token.blockchain_status = BlockchainStatus::PendingMinting;
        self.store.save(&mut token)?;

        match self.minter.mint(&token) {
            Ok(receipt) => self.update_blockchain_status(
                token_id,
                BlockchainUpdate {
                    status: BlockchainStatus::Minted,
                    chain_tx_id: Some(receipt.chain_tx_id),
                    contract_address: Some(receipt.contract_address),
                    on_chain_token_id: Some(receipt.on_chain_token_id),
                },
            ),
            Err(err) => {
                token.blockchain_status = BlockchainStatus::Failed;
                self.store.save(&mut token)?;
                Err(MarketError::Minting(err))
            }
        }
    }

    /// Cash the token out. A redemption attempt doubles as lazy expiry
    /// detection: a past expiry date flips the token to Expired and the call
    /// fails with Conflict. On success all three redemption fields are set —
    /// a tx id is generated when the caller supplies none — and a
    /// TokenRedemption ledger entry is emitted, best-effort.
    pub fn redeem(&self, token_id: &str, request: RedemptionRequest) -> Result<Token> {
        let mut token = self.store.get(token_id)?;

        if !is_redeemable(token.status) {
            return Err(MarketError::conflict(format!(
                "token cannot be redeemed. Current status: {:?}",
                token.status
            )));
        }
        if token.expiry_date.is_past() {
            token.status = TokenStatus::Expired;
            self.store.save(&mut token)?;
            return Err(MarketError::conflict("cannot redeem expired token"));
        }
        if !request.amount.is_positive() {
            return Err(MarketError::validation("redemption amount must be positive"));
        }

        let redemption_tx_id = match request.redemption_tx_id {
            Some(tx_id) => tx_id,
            None => utils::new_uuid_to_bech32(utils::prefix::REDEMPTION)?,
        };

        token.status = TokenStatus::Redeemed;
        token.redemption_amount = Some(request.amount.round_2dp());
        token.redemption_date = Some(request.redemption_date.unwrap_or_else(TimeStamp::now));
        token.redemption_tx_id = Some(redemption_tx_id);
        token.validate()?;
        self.store.save(&mut token)?;

        let mut draft = TransactionDraft::new()
            .set_farmer(&token.farmer_id)
            .set_harvest(&token.harvest_id)
            .set_kind(TransactionType::TokenRedemption)
            .set_amount(request.amount.round_2dp())
            .set_payment_method(PaymentMethod::Wallet)
            .set_reference(&token.id);
        if let Some(notes) = &request.notes {
            draft = draft.set_notes(notes);
        }
        best_effort("token redemption", self.ledger.record(draft));

        Ok(token)
    }

    /// Batch sweep: expire every live token whose expiry date has passed.
    /// One token failing does not abort the rest; returns the count actually
    /// updated.
    pub fn sweep_expired(&self) -> Result<usize> {
        let candidates = self.store.scan(|token| {
            !matches!(token.status, TokenStatus::Redeemed | TokenStatus::Expired)
                && token.expiry_date.is_past()
        })?;

        let mut updated = 0;
        for mut token in candidates {
            token.status = TokenStatus::Expired;
            match self.store.save(&mut token) {
                Ok(()) => updated += 1,
                Err(err) => {
                    tracing::warn!(token_id = %token.id, error = %err, "expiry sweep skipped token");
                }
            }
        }
        Ok(updated)
    }
}
