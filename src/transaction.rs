//! Transaction entity: the ledger record for every money/value movement.

use crate::error::{MarketError, Result};
use crate::store::Record;
use crate::types::{Amount, TimeStamp};
use crate::utils;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum TransactionType {
    #[n(0)]
    Sale,
    #[n(1)]
    Payment,
    #[n(2)]
    Deposit,
    #[n(3)]
    TokenIssuance,
    #[n(4)]
    TokenRedemption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum TransactionStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Completed,
    #[n(2)]
    Failed,
    #[n(3)]
    Cancelled,
    #[n(4)]
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Currency {
    #[n(0)]
    KES,
    #[n(1)]
    USD,
    #[n(2)]
    EUR,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum PaymentMethod {
    #[n(0)]
    MobileMoney,
    #[n(1)]
    BankTransfer,
    #[n(2)]
    Cash,
    #[n(3)]
    Wallet,
}

/// Legal status edges. Completed is a near-ratchet: only a refund may
/// follow it. Failed/Cancelled/Refunded are terminal.
pub fn transition_allowed(from: TransactionStatus, to: TransactionStatus) -> bool {
    use TransactionStatus::*;
    matches!(
        (from, to),
        (Pending, Completed | Failed | Cancelled) | (Completed, Refunded)
    )
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Transaction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub farmer_id: String,
    #[n(2)]
    pub buyer_id: Option<String>,
    #[n(3)]
    pub harvest_id: Option<String>,
    #[n(4)]
    pub kind: TransactionType,
    #[n(5)]
    pub amount: Amount,
    #[n(6)]
    pub currency: Currency,
    #[n(7)]
    pub payment_method: PaymentMethod,
    #[n(8)]
    pub status: TransactionStatus,
    #[n(9)]
    pub reference: Option<String>,
    #[n(10)]
    pub notes: Option<String>,
    #[n(11)]
    pub transaction_date: TimeStamp<Utc>,
    #[n(12)]
    pub created_at: TimeStamp<Utc>,
    #[n(13)]
    pub updated_at: TimeStamp<Utc>,
}

impl Record for Transaction {
    const ENTITY: &'static str = "transaction";
    const TREE: &'static str = "transactions";

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

// Draft for a ledger entry. The ledger fills defaults on finalise:
// currency KES, status Pending, transaction date now.
#[derive(Debug, Default)]
pub struct TransactionDraft {
    farmer_id: Option<String>,
    buyer_id: Option<String>,
    harvest_id: Option<String>,
    kind: Option<TransactionType>,
    amount: Option<Amount>,
    currency: Option<Currency>,
    payment_method: Option<PaymentMethod>,
    status: Option<TransactionStatus>,
    reference: Option<String>,
    notes: Option<String>,
    transaction_date: Option<TimeStamp<Utc>>,
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_farmer(mut self, farmer_id: &str) -> Self {
        self.farmer_id = Some(farmer_id.to_string());
        self
    }
    pub fn set_buyer(mut self, buyer_id: &str) -> Self {
        self.buyer_id = Some(buyer_id.to_string());
        self
    }
    pub fn set_harvest(mut self, harvest_id: &str) -> Self {
        self.harvest_id = Some(harvest_id.to_string());
        self
    }
    pub fn set_kind(mut self, kind: TransactionType) -> Self {
        self.kind = Some(kind);
        self
    }
    pub fn set_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }
    pub fn set_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
    pub fn set_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }
    pub fn set_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }
    pub fn set_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
    pub fn set_transaction_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.transaction_date = Some(date);
        self
    }

    /// Checks fields, applies defaults and mints the id.
    pub fn finalise(self) -> Result<Transaction> {
        let farmer_id = self
            .farmer_id
            .ok_or_else(|| MarketError::validation("transaction requires a farmer id"))?;
        let kind = self
            .kind
            .ok_or_else(|| MarketError::validation("transaction requires a type"))?;
        let amount = self
            .amount
            .ok_or_else(|| MarketError::validation("transaction requires an amount"))?;
        if !amount.is_positive() {
            return Err(MarketError::validation("transaction amount must be positive"));
        }
        let payment_method = self
            .payment_method
            .ok_or_else(|| MarketError::validation("transaction requires a payment method"))?;
        if kind == TransactionType::Sale && self.harvest_id.is_none() {
            return Err(MarketError::validation(
                "sale transactions must reference a harvest",
            ));
        }

        let now = TimeStamp::now();
        Ok(Transaction {
            id: utils::new_uuid_to_bech32(utils::prefix::TRANSACTION)?,
            farmer_id,
            buyer_id: self.buyer_id,
            harvest_id: self.harvest_id,
            kind,
            amount,
            currency: self.currency.unwrap_or(Currency::KES),
            payment_method,
            status: self.status.unwrap_or(TransactionStatus::Pending),
            reference: self.reference,
            notes: self.notes,
            transaction_date: self.transaction_date.unwrap_or_else(TimeStamp::now),
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_without_harvest_is_rejected() {
        let err = TransactionDraft::new()
            .set_farmer("farmer_1abc")
            .set_kind(TransactionType::Sale)
            .set_amount("200".parse().unwrap())
            .set_payment_method(PaymentMethod::MobileMoney)
            .finalise()
            .unwrap_err();

        assert!(err.is_validation());
    }

    #[test]
    fn finalise_applies_defaults() {
        let tx = TransactionDraft::new()
            .set_farmer("farmer_1abc")
            .set_kind(TransactionType::Deposit)
            .set_amount("1000".parse().unwrap())
            .set_payment_method(PaymentMethod::BankTransfer)
            .finalise()
            .unwrap();

        assert_eq!(tx.currency, Currency::KES);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.id.starts_with("txn_1"));
    }

    #[test]
    fn completed_only_moves_to_refunded() {
        use TransactionStatus::*;
        for to in [Pending, Completed, Failed, Cancelled] {
            assert!(!transition_allowed(Completed, to));
        }
        assert!(transition_allowed(Completed, Refunded));
    }
}
