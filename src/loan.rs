//! Loan entity and its status machine.

use crate::error::{MarketError, Result};
use crate::store::Record;
use crate::types::{Amount, TimeStamp};
use crate::utils;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum LoanStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Active,
    #[n(4)]
    Overdue,
    #[n(5)]
    Repaid,
    #[n(6)]
    Defaulted,
    #[n(7)]
    Restructured,
    #[n(8)]
    Cancelled,
}

/// The full edge set of the loan machine. Repaid is a ratchet: the only
/// permitted "transition" out of it is staying Repaid. Defaulted loans can
/// only be recovered administratively, into Active or Restructured.
pub fn transition_allowed(from: LoanStatus, to: LoanStatus) -> bool {
    use LoanStatus::*;
    matches!(
        (from, to),
        (Pending, Approved | Rejected | Cancelled)
            | (Approved, Active)
            | (Active, Overdue | Repaid | Defaulted)
            | (Overdue, Repaid | Defaulted | Active)
            | (Defaulted, Active | Restructured)
            | (Repaid, Repaid)
    )
}

pub fn accepts_payment(status: LoanStatus) -> bool {
    matches!(status, LoanStatus::Active | LoanStatus::Overdue)
}

/// Loans that never disbursed money can still be removed.
pub fn is_deletable(status: LoanStatus) -> bool {
    matches!(
        status,
        LoanStatus::Pending | LoanStatus::Rejected | LoanStatus::Cancelled
    )
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Loan {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub farmer_id: String,
    /// Principal.
    #[n(2)]
    pub amount: Amount,
    /// Percent.
    #[n(3)]
    pub interest_rate: Amount,
    #[n(4)]
    pub duration_months: u32,
    #[n(5)]
    pub purpose: Option<String>,
    #[n(6)]
    pub status: LoanStatus,
    #[n(7)]
    pub issued_date: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub due_date: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub approved_date: Option<TimeStamp<Utc>>,
    #[n(10)]
    pub disbursed_date: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub approved_by: Option<String>,
    #[n(12)]
    pub rejection_reason: Option<String>,
    #[n(13)]
    pub amount_paid: Amount,
    #[n(14)]
    pub remaining_balance: Amount,
    #[n(15)]
    pub created_at: TimeStamp<Utc>,
    #[n(16)]
    pub updated_at: TimeStamp<Utc>,
}

impl Record for Loan {
    const ENTITY: &'static str = "loan";
    const TREE: &'static str = "loans";

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
pub struct LoanDraft {
    farmer_id: Option<String>,
    amount: Option<Amount>,
    interest_rate: Option<Amount>,
    duration_months: Option<u32>,
    purpose: Option<String>,
}

impl LoanDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_farmer(mut self, farmer_id: &str) -> Self {
        self.farmer_id = Some(farmer_id.to_string());
        self
    }
    pub fn set_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }
    pub fn set_interest_rate(mut self, rate: Amount) -> Self {
        self.interest_rate = Some(rate);
        self
    }
    pub fn set_duration_months(mut self, months: u32) -> Self {
        self.duration_months = Some(months);
        self
    }
    pub fn set_purpose(mut self, purpose: &str) -> Self {
        self.purpose = Some(purpose.to_string());
        self
    }

    /// Checks fields and mints a Pending loan application. The balance
    /// starts at the full principal with nothing paid.
    pub fn finalise(self) -> Result<Loan> {
        let farmer_id = self
            .farmer_id
            .ok_or_else(|| MarketError::validation("loan requires a farmer id"))?;
        let amount = self
            .amount
            .ok_or_else(|| MarketError::validation("loan requires a principal amount"))?;
        if !amount.is_positive() {
            return Err(MarketError::validation("loan principal must be positive"));
        }
        let interest_rate = self
            .interest_rate
            .ok_or_else(|| MarketError::validation("loan requires an interest rate"))?;
        if interest_rate.is_negative() {
            return Err(MarketError::validation("interest rate cannot be negative"));
        }
        let duration_months = self
            .duration_months
            .ok_or_else(|| MarketError::validation("loan requires a duration"))?;
        if duration_months == 0 {
            return Err(MarketError::validation("loan duration must be at least one month"));
        }

        let now = TimeStamp::now();
        Ok(Loan {
            id: utils::new_uuid_to_bech32(utils::prefix::LOAN)?,
            farmer_id,
            amount,
            interest_rate,
            duration_months,
            purpose: self.purpose,
            status: LoanStatus::Pending,
            issued_date: None,
            due_date: None,
            approved_date: None,
            disbursed_date: None,
            approved_by: None,
            rejection_reason: None,
            amount_paid: Amount::zero(),
            remaining_balance: amount,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoanStatus::*;

    const ALL: [LoanStatus; 9] = [
        Pending,
        Approved,
        Rejected,
        Active,
        Overdue,
        Repaid,
        Defaulted,
        Restructured,
        Cancelled,
    ];

    #[test]
    fn repaid_is_a_ratchet() {
        for to in ALL {
            assert_eq!(transition_allowed(Repaid, to), to == Repaid);
        }
    }

    #[test]
    fn rejected_and_cancelled_are_terminal() {
        for to in ALL {
            assert!(!transition_allowed(Rejected, to));
            assert!(!transition_allowed(Cancelled, to));
        }
    }

    #[test]
    fn defaulted_only_recovers_administratively() {
        for to in ALL {
            assert_eq!(
                transition_allowed(Defaulted, to),
                matches!(to, Active | Restructured)
            );
        }
    }

    #[test]
    fn overdue_loans_can_cure() {
        assert!(transition_allowed(Overdue, Active));
        assert!(transition_allowed(Overdue, Repaid));
        assert!(transition_allowed(Overdue, Defaulted));
        assert!(!transition_allowed(Overdue, Pending));
    }

    #[test]
    fn new_loan_balance_equals_principal() {
        let loan = LoanDraft::new()
            .set_farmer("farmer_1abc")
            .set_amount("1000".parse().unwrap())
            .set_interest_rate("12.5".parse().unwrap())
            .set_duration_months(6)
            .finalise()
            .unwrap();

        assert_eq!(loan.status, Pending);
        assert_eq!(loan.amount_paid, Amount::zero());
        assert_eq!(loan.remaining_balance, loan.amount);
    }
}
