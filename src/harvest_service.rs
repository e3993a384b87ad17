//! Service layer for the harvest market-status machine.

use crate::error::{MarketError, Result};
use crate::harvest::{Harvest, HarvestDraft, HarvestStatus, HarvestUpdate, is_sellable};
use crate::store::{Page, Store};

pub struct HarvestService {
    store: Store<Harvest>,
}

/// Optional criteria for harvest search, applied conjunctively.
#[derive(Debug, Default)]
pub struct HarvestFilter {
    pub status: Option<HarvestStatus>,
    pub crop_type: Option<String>,
    pub farmer_id: Option<String>,
}

impl HarvestService {
    pub fn new(store: Store<Harvest>) -> Self {
        Self { store }
    }

    pub fn create(&self, draft: HarvestDraft) -> Result<Harvest> {
        self.store.create(draft.finalise()?)
    }

    pub fn get(&self, harvest_id: &str) -> Result<Harvest> {
        self.store.get(harvest_id)
    }

    pub fn list_for_farmer(&self, farmer_id: &str, page: Page) -> Result<(Vec<Harvest>, usize)> {
        self.store.find_by_owner(farmer_id, page)
    }

    pub fn search(&self, filter: &HarvestFilter, page: Page) -> Result<(Vec<Harvest>, usize)> {
        self.store.search(
            |h| {
                filter.status.is_none_or(|status| h.status == status)
                    && filter
                        .crop_type
                        .as_ref()
                        .is_none_or(|crop| &h.crop_type == crop)
                    && filter
                        .farmer_id
                        .as_ref()
                        .is_none_or(|farmer| &h.farmer_id == farmer)
            },
            page,
        )
    }

    /// Hold an available harvest for a buyer.
    pub fn reserve(&self, harvest_id: &str, buyer_id: Option<&str>) -> Result<Harvest> {
        let mut harvest = self.store.get(harvest_id)?;

        if harvest.status != HarvestStatus::Available {
            return Err(MarketError::conflict(format!(
                "harvest cannot be reserved. Current status: {:?}",
                harvest.status
            )));
        }

        harvest.status = HarvestStatus::Reserved;
        harvest.buyer_id = buyer_id.map(str::to_string);
        self.store.save(&mut harvest)?;

        Ok(harvest)
    }

    /// Close a sale. Called directly or from the ledger's sale-transaction
    /// path, so a retry with the same buyer and transaction id on an
    /// already-sold harvest is a no-op success rather than a Conflict.
    pub fn sell(
        &self,
        harvest_id: &str,
        buyer_id: &str,
        transaction_id: Option<&str>,
    ) -> Result<Harvest> {
        let mut harvest = self.store.get(harvest_id)?;

        if harvest.status == HarvestStatus::Sold {
            if harvest.buyer_id.as_deref() == Some(buyer_id)
                && harvest.transaction_id.as_deref() == transaction_id
            {
                return Ok(harvest);
            }
            return Err(MarketError::conflict("harvest is already sold"));
        }
        if !is_sellable(harvest.status) {
            return Err(MarketError::conflict(format!(
                "harvest cannot be sold. Current status: {:?}",
                harvest.status
            )));
        }

        harvest.status = HarvestStatus::Sold;
        harvest.buyer_id = Some(buyer_id.to_string());
        harvest.transaction_id = transaction_id.map(str::to_string);
        self.store.save(&mut harvest)?;

        tracing::info!(harvest_id, buyer_id, "harvest sold");
        Ok(harvest)
    }

    /// Field-level edits. Once sold, the crop identity and quantity are
    /// locked; the record itself survives for the financial trail.
    pub fn update(&self, harvest_id: &str, changes: HarvestUpdate) -> Result<Harvest> {
        let mut harvest = self.store.get(harvest_id)?;

        if harvest.status == HarvestStatus::Sold && changes.touches_core_fields() {
            return Err(MarketError::forbidden(
                "core fields of a sold harvest cannot be changed",
            ));
        }

        if let Some(crop_type) = changes.crop_type {
            harvest.crop_type = crop_type;
        }
        if let Some(variety) = changes.variety {
            harvest.variety = Some(variety);
        }
        if let Some(quantity) = changes.quantity {
            if quantity.is_negative() {
                return Err(MarketError::validation("harvest quantity cannot be negative"));
            }
            harvest.quantity = quantity;
        }
        if let Some(unit) = changes.unit {
            harvest.unit = unit;
        }
        if let Some(grade) = changes.quality_grade {
            harvest.quality_grade = Some(grade);
        }
        if let Some(date) = changes.harvest_date {
            harvest.harvest_date = date;
        }
        if let Some(price) = changes.expected_price {
            if !price.is_positive() {
                return Err(MarketError::validation("expected price must be positive"));
            }
            harvest.expected_price = price;
        }

        self.store.save(&mut harvest)?;
        Ok(harvest)
    }

    pub fn delete(&self, harvest_id: &str) -> Result<()> {
        let harvest = self.store.get(harvest_id)?;

        if harvest.status == HarvestStatus::Sold {
            return Err(MarketError::forbidden("a sold harvest cannot be deleted"));
        }

        self.store.delete(harvest_id)?;
        Ok(())
    }
}
