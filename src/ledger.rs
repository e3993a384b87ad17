//! Ledger service: the sole writer of transaction records.
//!
//! Lifecycle services never touch the transaction tree directly; they hand
//! a draft to `Ledger::record`. Side-effect entries triggered by an already
//! committed state transition go through `best_effort`, which logs and
//! swallows the failure instead of propagating it.

use crate::error::{MarketError, Result};
use crate::harvest::Harvest;
use crate::harvest_service::HarvestService;
use crate::store::{Page, Store};
use crate::transaction::{
    Currency, PaymentMethod, Transaction, TransactionDraft, TransactionStatus, TransactionType,
    transition_allowed,
};
use crate::types::{Amount, TimeStamp};
use std::sync::Arc;

/// Narrow seam for transaction creation, so lifecycle services can be
/// tested against a failing fake.
pub trait Ledger: Send + Sync {
    fn record(&self, draft: TransactionDraft) -> Result<Transaction>;
}

/// Runs a secondary ledger write whose failure must not affect the already
/// committed primary transition. The error is logged and dropped.
pub fn best_effort(label: &str, outcome: Result<Transaction>) -> Option<Transaction> {
    match outcome {
        Ok(tx) => Some(tx),
        Err(err) => {
            tracing::warn!(label, error = %err, "ledger side effect dropped");
            None
        }
    }
}

/// Optional criteria for transaction search, applied conjunctively.
#[derive(Debug, Default)]
pub struct TransactionFilter {
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub harvest_id: Option<String>,
}

/// Everything needed to settle a harvest sale in one call.
#[derive(Debug)]
pub struct HarvestSale {
    pub harvest_id: String,
    pub buyer_id: String,
    pub payment_method: PaymentMethod,
    pub amount: Amount,
    pub currency: Option<Currency>,
    pub notes: Option<String>,
}

pub struct LedgerService {
    store: Store<Transaction>,
    harvests: Arc<HarvestService>,
}

impl LedgerService {
    pub fn new(store: Store<Transaction>, harvests: Arc<HarvestService>) -> Self {
        Self { store, harvests }
    }

    pub fn get(&self, transaction_id: &str) -> Result<Transaction> {
        self.store.get(transaction_id)
    }

    pub fn list_for_farmer(&self, farmer_id: &str, page: Page) -> Result<(Vec<Transaction>, usize)> {
        self.store.find_by_owner(farmer_id, page)
    }

    pub fn search(&self, filter: &TransactionFilter, page: Page) -> Result<(Vec<Transaction>, usize)> {
        self.store.search(
            |tx| {
                filter.kind.is_none_or(|kind| tx.kind == kind)
                    && filter.status.is_none_or(|status| tx.status == status)
                    && filter
                        .harvest_id
                        .as_ref()
                        .is_none_or(|harvest| tx.harvest_id.as_ref() == Some(harvest))
            },
            page,
        )
    }

    /// Move a transaction along its status machine. Completed entries may
    /// only be refunded; Failed/Cancelled/Refunded are terminal.
    pub fn update_status(&self, transaction_id: &str, to: TransactionStatus) -> Result<Transaction> {
        let mut tx = self.store.get(transaction_id)?;

        if !transition_allowed(tx.status, to) {
            return Err(MarketError::conflict(format!(
                "transaction cannot move from {:?} to {:?}",
                tx.status, to
            )));
        }

        tx.status = to;
        self.store.save(&mut tx)?;
        Ok(tx)
    }

    /// Settle a harvest sale: look up the harvest, append the Sale entry,
    /// then close the sale on the harvest with the new transaction id.
    ///
    /// If the lookup or the transaction write fails nothing has changed.
    /// If `sell` fails after the write, the Sale entry stays Pending and
    /// unreferenced; there is no compensating delete.
    pub fn record_harvest_sale(&self, sale: HarvestSale) -> Result<(Transaction, Harvest)> {
        let harvest = self.harvests.get(&sale.harvest_id)?;

        let mut draft = TransactionDraft::new()
            .set_farmer(&harvest.farmer_id)
            .set_buyer(&sale.buyer_id)
            .set_harvest(&sale.harvest_id)
            .set_kind(TransactionType::Sale)
            .set_amount(sale.amount)
            .set_payment_method(sale.payment_method)
            .set_transaction_date(TimeStamp::now());
        if let Some(currency) = sale.currency {
            draft = draft.set_currency(currency);
        }
        if let Some(notes) = &sale.notes {
            draft = draft.set_notes(notes);
        }

        let tx = self.record(draft)?;
        let harvest = self
            .harvests
            .sell(&sale.harvest_id, &sale.buyer_id, Some(&tx.id))?;

        Ok((tx, harvest))
    }
}

impl Ledger for LedgerService {
    fn record(&self, draft: TransactionDraft) -> Result<Transaction> {
        let tx = draft.finalise()?;
        self.store.create(tx)
    }
}
