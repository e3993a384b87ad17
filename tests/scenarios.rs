//! End-to-end scenarios across the four lifecycle services.
#![allow(unused_imports)]

use std::sync::Arc;

use harvest_market::{
    harvest::{HarvestDraft, HarvestStatus},
    ledger::{HarvestSale, TransactionFilter},
    loan::{LoanDraft, LoanStatus},
    loan_service::{LoanStatusChange, PaymentRecord},
    market::Marketplace,
    minting::{MintReceipt, Minter},
    store::Page,
    token::{BlockchainStatus, Token, TokenDraft, TokenStatus},
    token_service::RedemptionRequest,
    transaction::{PaymentMethod, TransactionType},
    types::{Amount, TimeStamp},
    utils,
};

use tempfile::TempDir; // Use for test db cleanup.

/// A chain collaborator that always succeeds.
struct StaticMinter;

impl Minter for StaticMinter {
    fn mint(&self, token: &Token) -> anyhow::Result<MintReceipt> {
        Ok(MintReceipt {
            chain_tx_id: format!("0xchain-{}", token.id),
            contract_address: "0xcontract".to_string(),
            on_chain_token_id: "42".to_string(),
        })
    }
}

/// A chain collaborator that always fails.
struct OfflineMinter;

impl Minter for OfflineMinter {
    fn mint(&self, _token: &Token) -> anyhow::Result<MintReceipt> {
        Err(anyhow::anyhow!("chain unavailable"))
    }
}

// Sled uses file-based locking to prevent concurrent access, so each test
// opens its own database on temp for simplified cleanup.
fn open_market(minter: Arc<dyn Minter>) -> anyhow::Result<(TempDir, Marketplace)> {
    let temp_dir = tempfile::tempdir()?;
    let db = sled::open(temp_dir.path().join("market.db"))?;
    let market = Marketplace::open(Arc::new(db), minter)?;
    Ok((temp_dir, market))
}

#[test]
fn harvest_sale_settles_and_binds_transaction() -> anyhow::Result<()> {
    let (_guard, market) = open_market(Arc::new(StaticMinter))?;

    let farmer_id = utils::new_uuid_to_bech32("farmer_")?;
    let buyer_id = utils::new_uuid_to_bech32("buyer_")?;

    let harvest = market.harvests.create(
        HarvestDraft::new()
            .set_farmer(&farmer_id)
            .set_crop_type("maize")
            .set_quantity("150.5".parse()?)
            .set_unit("kg")
            .set_expected_price("35".parse()?),
    )?;
    assert_eq!(harvest.status, HarvestStatus::Available);

    let (tx, harvest) = market.ledger.record_harvest_sale(HarvestSale {
        harvest_id: harvest.id.clone(),
        buyer_id: buyer_id.clone(),
        payment_method: PaymentMethod::MobileMoney,
        amount: "200".parse()?,
        currency: None,
        notes: None,
    })?;

    assert_eq!(harvest.status, HarvestStatus::Sold);
    assert_eq!(harvest.buyer_id.as_deref(), Some(buyer_id.as_str()));
    assert_eq!(harvest.transaction_id.as_deref(), Some(tx.id.as_str()));

    assert_eq!(tx.kind, TransactionType::Sale);
    assert_eq!(tx.amount, "200".parse()?);
    assert_eq!(tx.harvest_id.as_deref(), Some(harvest.id.as_str()));

    // the sale entry is findable through the ledger by harvest reference
    let (rows, total) = market.ledger.search(
        &TransactionFilter {
            harvest_id: Some(harvest.id.clone()),
            ..Default::default()
        },
        Page::default(),
    )?;
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, tx.id);

    Ok(())
}

#[test]
fn loan_payment_updates_balances_and_ledger() -> anyhow::Result<()> {
    let (_guard, market) = open_market(Arc::new(StaticMinter))?;

    let farmer_id = utils::new_uuid_to_bech32("farmer_")?;
    let loan = market.loans.create(
        LoanDraft::new()
            .set_farmer(&farmer_id)
            .set_amount("1000".parse()?)
            .set_interest_rate("12.5".parse()?)
            .set_duration_months(6),
    )?;

    let loan = market.loans.update_status(
        &loan.id,
        LoanStatusChange {
            status: Some(LoanStatus::Approved),
            approved_by: Some(utils::new_uuid_to_bech32("officer_")?),
            ..Default::default()
        },
    )?;
    let loan = market.loans.update_status(
        &loan.id,
        LoanStatusChange {
            status: Some(LoanStatus::Active),
            ..Default::default()
        },
    )?;
    assert!(loan.disbursed_date.is_some());
    assert!(loan.due_date.is_some());

    let loan = market.loans.record_payment(
        &loan.id,
        PaymentRecord {
            amount: "400".parse()?,
            payment_date: None,
            payment_method: None,
            notes: Some("first instalment".to_string()),
        },
    )?;

    assert_eq!(loan.amount_paid, "400".parse()?);
    assert_eq!(loan.remaining_balance, "600".parse()?);
    assert_eq!(loan.amount_paid + loan.remaining_balance, loan.amount);

    // one Payment entry, plus the Deposit from disbursement
    let (_, payments) = market.ledger.search(
        &TransactionFilter {
            kind: Some(TransactionType::Payment),
            ..Default::default()
        },
        Page::default(),
    )?;
    assert_eq!(payments, 1);
    let (_, deposits) = market.ledger.search(
        &TransactionFilter {
            kind: Some(TransactionType::Deposit),
            ..Default::default()
        },
        Page::default(),
    )?;
    assert_eq!(deposits, 1);

    Ok(())
}

#[test]
fn repaid_loan_rejects_reactivation() -> anyhow::Result<()> {
    let (_guard, market) = open_market(Arc::new(StaticMinter))?;

    let farmer_id = utils::new_uuid_to_bech32("farmer_")?;
    let loan = market.loans.create(
        LoanDraft::new()
            .set_farmer(&farmer_id)
            .set_amount("500".parse()?)
            .set_interest_rate("10".parse()?)
            .set_duration_months(3),
    )?;
    for status in [LoanStatus::Approved, LoanStatus::Active, LoanStatus::Repaid] {
        market.loans.update_status(
            &loan.id,
            LoanStatusChange {
                status: Some(status),
                ..Default::default()
            },
        )?;
    }

    let (_, before) = market
        .ledger
        .search(&TransactionFilter::default(), Page::default())?;

    let err = market
        .loans
        .update_status(
            &loan.id,
            LoanStatusChange {
                status: Some(LoanStatus::Active),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_conflict());

    // no mutation, no new transaction
    let loan = market.loans.get(&loan.id)?;
    assert_eq!(loan.status, LoanStatus::Repaid);
    let (_, after) = market
        .ledger
        .search(&TransactionFilter::default(), Page::default())?;
    assert_eq!(before, after);

    Ok(())
}

#[test]
fn failed_mint_leaves_token_failed_and_surfaces_error() -> anyhow::Result<()> {
    let (_guard, market) = open_market(Arc::new(OfflineMinter))?;

    let farmer_id = utils::new_uuid_to_bech32("farmer_")?;
    let token = market.tokens.create(
        TokenDraft::new()
            .set_harvest(utils::new_uuid_to_bech32("harvest_")?.as_str())
            .set_farmer(&farmer_id)
            .set_amount("75.5".parse()?)
            .set_expiry_date(TimeStamp::new_with(2030, 1, 1, 0, 0, 0)),
    )?;
    assert_eq!(token.blockchain_status, BlockchainStatus::Unminted);

    let err = market.tokens.mint(&token.id).unwrap_err();
    assert!(err.to_string().contains("minting failed"));

    let token = market.tokens.get(&token.id)?;
    assert_eq!(token.blockchain_status, BlockchainStatus::Failed);
    assert_eq!(token.status, TokenStatus::Pending);

    Ok(())
}

#[test]
fn redeeming_expired_token_flips_it_to_expired() -> anyhow::Result<()> {
    let (_guard, market) = open_market(Arc::new(StaticMinter))?;

    let farmer_id = utils::new_uuid_to_bech32("farmer_")?;
    let token = market.tokens.create(
        TokenDraft::new()
            .set_harvest(utils::new_uuid_to_bech32("harvest_")?.as_str())
            .set_farmer(&farmer_id)
            .set_amount("30".parse()?)
            .set_expiry_date(TimeStamp::new_with(2020, 1, 1, 0, 0, 0)),
    )?;

    let err = market
        .tokens
        .redeem(
            &token.id,
            RedemptionRequest {
                amount: "30".parse()?,
                redemption_date: None,
                redemption_tx_id: None,
                notes: None,
            },
        )
        .unwrap_err();
    assert!(err.is_conflict());

    let token = market.tokens.get(&token.id)?;
    assert_eq!(token.status, TokenStatus::Expired);
    assert!(token.redemption_amount.is_none());
    assert!(token.redemption_date.is_none());
    assert!(token.redemption_tx_id.is_none());

    // no redemption entry was written
    let (_, redemptions) = market.ledger.search(
        &TransactionFilter {
            kind: Some(TransactionType::TokenRedemption),
            ..Default::default()
        },
        Page::default(),
    )?;
    assert_eq!(redemptions, 0);

    Ok(())
}

#[test]
fn sell_is_idempotent_for_the_same_settlement() -> anyhow::Result<()> {
    let (_guard, market) = open_market(Arc::new(StaticMinter))?;

    let farmer_id = utils::new_uuid_to_bech32("farmer_")?;
    let buyer_id = utils::new_uuid_to_bech32("buyer_")?;
    let harvest = market.harvests.create(
        HarvestDraft::new()
            .set_farmer(&farmer_id)
            .set_crop_type("beans")
            .set_quantity("80".parse()?)
            .set_unit("kg")
            .set_expected_price("60".parse()?),
    )?;

    let tx_id = utils::new_uuid_to_bech32("txn_")?;
    let first = market.harvests.sell(&harvest.id, &buyer_id, Some(&tx_id))?;
    let second = market.harvests.sell(&harvest.id, &buyer_id, Some(&tx_id))?;

    assert_eq!(first.status, HarvestStatus::Sold);
    assert_eq!(second.status, HarvestStatus::Sold);
    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(first.updated_at, second.updated_at); // second call wrote nothing

    // a different settlement against the sold harvest is still a conflict
    let other_buyer = utils::new_uuid_to_bech32("buyer_")?;
    let err = market
        .harvests
        .sell(&harvest.id, &other_buyer, Some(&tx_id))
        .unwrap_err();
    assert!(err.is_conflict());

    Ok(())
}
