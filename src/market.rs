//! Wiring facade: builds the four services over one sled database.

use crate::error::Result;
use crate::harvest_service::HarvestService;
use crate::ledger::{Ledger, LedgerService};
use crate::loan_service::LoanService;
use crate::minting::Minter;
use crate::store::Store;
use crate::token_service::TokenService;
use std::sync::Arc;

pub struct Marketplace {
    pub harvests: Arc<HarvestService>,
    pub ledger: Arc<LedgerService>,
    pub loans: LoanService,
    pub tokens: TokenService,
}

impl Marketplace {
    pub fn open(db: Arc<sled::Db>, minter: Arc<dyn Minter>) -> Result<Self> {
        let harvests = Arc::new(HarvestService::new(Store::open(&db)?));
        let ledger = Arc::new(LedgerService::new(Store::open(&db)?, harvests.clone()));

        let loan_ledger: Arc<dyn Ledger> = ledger.clone();
        let loans = LoanService::new(Store::open(&db)?, loan_ledger);

        let token_ledger: Arc<dyn Ledger> = ledger.clone();
        let tokens = TokenService::new(Store::open(&db)?, token_ledger, minter);

        Ok(Self {
            harvests,
            ledger,
            loans,
            tokens,
        })
    }
}
