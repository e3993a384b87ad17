//! Service layer for the loan status machine and payment accounting.

use crate::error::{MarketError, Result};
use crate::ledger::{Ledger, best_effort};
use crate::loan::{Loan, LoanDraft, LoanStatus, accepts_payment, is_deletable, transition_allowed};
use crate::store::{Page, Store};
use crate::transaction::{PaymentMethod, TransactionDraft, TransactionType};
use crate::types::{Amount, TimeStamp};
use chrono::Utc;
use std::sync::Arc;

/// Requested status change plus the fields certain edges stamp.
#[derive(Debug, Default)]
pub struct LoanStatusChange {
    pub status: Option<LoanStatus>,
    pub approved_by: Option<String>,
    pub approved_date: Option<TimeStamp<Utc>>,
    pub disbursed_date: Option<TimeStamp<Utc>>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug)]
pub struct PaymentRecord {
    pub amount: Amount,
    pub payment_date: Option<TimeStamp<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

pub struct LoanService {
    store: Store<Loan>,
    ledger: Arc<dyn Ledger>,
}

impl LoanService {
    pub fn new(store: Store<Loan>, ledger: Arc<dyn Ledger>) -> Self {
        Self { store, ledger }
    }

    pub fn create(&self, draft: LoanDraft) -> Result<Loan> {
        self.store.create(draft.finalise()?)
    }

    pub fn get(&self, loan_id: &str) -> Result<Loan> {
        self.store.get(loan_id)
    }

    pub fn list_for_farmer(&self, farmer_id: &str, page: Page) -> Result<(Vec<Loan>, usize)> {
        self.store.find_by_owner(farmer_id, page)
    }

    /// Validate and apply a status transition. The first move into Active is
    /// the disbursement: it stamps the issue/due dates and records a Deposit
    /// for the full principal. The deposit is best-effort — the loan's own
    /// transition is already committed and is not rolled back if the ledger
    /// write fails.
    pub fn update_status(&self, loan_id: &str, change: LoanStatusChange) -> Result<Loan> {
        let mut loan = self.store.get(loan_id)?;
        let to = change
            .status
            .ok_or_else(|| MarketError::validation("a target status is required"))?;

        if !transition_allowed(loan.status, to) {
            return Err(MarketError::conflict(format!(
                "loan cannot move from {:?} to {:?}",
                loan.status, to
            )));
        }

        let mut disbursed = false;
        match to {
            LoanStatus::Approved => {
                loan.approved_by = change.approved_by;
                loan.approved_date = Some(change.approved_date.unwrap_or_else(TimeStamp::now));
            }
            LoanStatus::Rejected => {
                let reason = change
                    .rejection_reason
                    .ok_or_else(|| MarketError::validation("rejection requires a reason"))?;
                loan.rejection_reason = Some(reason);
            }
            LoanStatus::Active if loan.disbursed_date.is_none() => {
                let disbursed_date = change.disbursed_date.unwrap_or_else(TimeStamp::now);
                let due_date = disbursed_date
                    .plus_months(loan.duration_months)
                    .ok_or_else(|| {
                        MarketError::validation("loan duration overflows the calendar")
                    })?;
                loan.issued_date = Some(disbursed_date.clone());
                loan.due_date = Some(due_date);
                loan.disbursed_date = Some(disbursed_date);
                disbursed = true;
            }
            _ => {}
        }

        loan.status = to;
        self.store.save(&mut loan)?;

        if disbursed {
            tracing::info!(loan_id, "loan disbursed");
            best_effort(
                "loan disbursement deposit",
                self.ledger.record(
                    TransactionDraft::new()
                        .set_farmer(&loan.farmer_id)
                        .set_kind(TransactionType::Deposit)
                        .set_amount(loan.amount)
                        .set_payment_method(PaymentMethod::BankTransfer)
                        .set_reference(&loan.id)
                        .set_notes("loan disbursement"),
                ),
            );
        }

        Ok(loan)
    }

    /// Book a repayment against an active or overdue loan. Overpayment is
    /// not rejected here; capping is a business-policy decision left to the
    /// caller. The Payment ledger entry is best-effort.
    pub fn record_payment(&self, loan_id: &str, payment: PaymentRecord) -> Result<Loan> {
        let mut loan = self.store.get(loan_id)?;

        if !accepts_payment(loan.status) {
            return Err(MarketError::conflict(format!(
                "loan does not accept payments. Current status: {:?}",
                loan.status
            )));
        }
        if !payment.amount.is_positive() {
            return Err(MarketError::validation("payment amount must be positive"));
        }

        loan.amount_paid = loan.amount_paid + payment.amount;
        loan.remaining_balance = loan.amount - loan.amount_paid;
        self.store.save(&mut loan)?;

        let mut draft = TransactionDraft::new()
            .set_farmer(&loan.farmer_id)
            .set_kind(TransactionType::Payment)
            .set_amount(payment.amount)
            .set_payment_method(payment.payment_method.unwrap_or(PaymentMethod::MobileMoney))
            .set_reference(&loan.id);
        if let Some(date) = payment.payment_date {
            draft = draft.set_transaction_date(date);
        }
        if let Some(notes) = &payment.notes {
            draft = draft.set_notes(notes);
        }
        best_effort("loan payment", self.ledger.record(draft));

        Ok(loan)
    }

    pub fn delete(&self, loan_id: &str) -> Result<()> {
        let loan = self.store.get(loan_id)?;

        if !is_deletable(loan.status) {
            return Err(MarketError::forbidden(format!(
                "loan cannot be deleted. Current status: {:?}",
                loan.status
            )));
        }

        self.store.delete(loan_id)?;
        Ok(())
    }

    /// Batch sweep: push every active loan whose due date has passed into
    /// Overdue. One loan failing does not abort the rest; returns the count
    /// actually updated.
    pub fn sweep_overdue(&self) -> Result<usize> {
        let candidates = self.store.scan(|loan| {
            loan.status == LoanStatus::Active
                && loan.due_date.as_ref().is_some_and(|due| due.is_past())
        })?;

        let mut updated = 0;
        for mut loan in candidates {
            loan.status = LoanStatus::Overdue;
            match self.store.save(&mut loan) {
                Ok(()) => updated += 1,
                Err(err) => {
                    tracing::warn!(loan_id = %loan.id, error = %err, "overdue sweep skipped loan");
                }
            }
        }
        Ok(updated)
    }
}
