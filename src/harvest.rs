//! Harvest entity and its market-status machine.

use crate::error::{MarketError, Result};
use crate::store::Record;
use crate::types::{Amount, TimeStamp};
use crate::utils;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum HarvestStatus {
    #[n(0)]
    Available,
    #[n(1)]
    Reserved,
    #[n(2)]
    Sold,
    #[n(3)]
    Processing,
    #[n(4)]
    Expired,
    #[n(5)]
    Cancelled,
}

/// A harvest can be sold while it sits on the market or is held for a buyer.
pub fn is_sellable(status: HarvestStatus) -> bool {
    matches!(status, HarvestStatus::Available | HarvestStatus::Reserved)
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct Harvest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub farmer_id: String,
    #[n(2)]
    pub crop_type: String,
    #[n(3)]
    pub variety: Option<String>,
    #[n(4)]
    pub quantity: Amount,
    #[n(5)]
    pub unit: String,
    #[n(6)]
    pub quality_grade: Option<String>,
    #[n(7)]
    pub harvest_date: TimeStamp<Utc>,
    #[n(8)]
    pub expected_price: Amount,
    #[n(9)]
    pub status: HarvestStatus,
    #[n(10)]
    pub buyer_id: Option<String>,
    #[n(11)]
    pub transaction_id: Option<String>,
    #[n(12)]
    pub created_at: TimeStamp<Utc>,
    #[n(13)]
    pub updated_at: TimeStamp<Utc>,
}

impl Record for Harvest {
    const ENTITY: &'static str = "harvest";
    const TREE: &'static str = "harvests";

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

// Also used for constructing listings before they hit the market
#[derive(Debug, Default)]
pub struct HarvestDraft {
    farmer_id: Option<String>,
    crop_type: Option<String>,
    variety: Option<String>,
    quantity: Option<Amount>,
    unit: Option<String>,
    quality_grade: Option<String>,
    harvest_date: Option<TimeStamp<Utc>>,
    expected_price: Option<Amount>,
}

impl HarvestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_farmer(mut self, farmer_id: &str) -> Self {
        self.farmer_id = Some(farmer_id.to_string());
        self
    }
    pub fn set_crop_type(mut self, crop_type: &str) -> Self {
        self.crop_type = Some(crop_type.to_string());
        self
    }
    pub fn set_variety(mut self, variety: &str) -> Self {
        self.variety = Some(variety.to_string());
        self
    }
    pub fn set_quantity(mut self, quantity: Amount) -> Self {
        self.quantity = Some(quantity);
        self
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
    pub fn set_quality_grade(mut self, grade: &str) -> Self {
        self.quality_grade = Some(grade.to_string());
        self
    }
    pub fn set_harvest_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.harvest_date = Some(date);
        self
    }
    pub fn set_expected_price(mut self, price: Amount) -> Self {
        self.expected_price = Some(price);
        self
    }

    /// Checks fields and mints a fresh Available listing.
    pub fn finalise(self) -> Result<Harvest> {
        let farmer_id = self
            .farmer_id
            .ok_or_else(|| MarketError::validation("harvest requires a farmer id"))?;
        let crop_type = self
            .crop_type
            .ok_or_else(|| MarketError::validation("harvest requires a crop type"))?;
        let quantity = self
            .quantity
            .ok_or_else(|| MarketError::validation("harvest requires a quantity"))?;
        if quantity.is_negative() {
            return Err(MarketError::validation("harvest quantity cannot be negative"));
        }
        let unit = self
            .unit
            .ok_or_else(|| MarketError::validation("harvest requires a unit"))?;
        let expected_price = self
            .expected_price
            .ok_or_else(|| MarketError::validation("harvest requires an expected price"))?;
        if !expected_price.is_positive() {
            return Err(MarketError::validation("expected price must be positive"));
        }

        let now = TimeStamp::now();
        Ok(Harvest {
            id: utils::new_uuid_to_bech32(utils::prefix::HARVEST)?,
            farmer_id,
            crop_type,
            variety: self.variety,
            quantity,
            unit,
            quality_grade: self.quality_grade,
            harvest_date: self.harvest_date.unwrap_or_else(TimeStamp::now),
            expected_price,
            status: HarvestStatus::Available,
            buyer_id: None,
            transaction_id: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

/// Field-level changes to a listing. Status, buyer and transaction ids are
/// owned by the lifecycle operations and cannot be changed here.
#[derive(Debug, Default)]
pub struct HarvestUpdate {
    pub crop_type: Option<String>,
    pub variety: Option<String>,
    pub quantity: Option<Amount>,
    pub unit: Option<String>,
    pub quality_grade: Option<String>,
    pub harvest_date: Option<TimeStamp<Utc>>,
    pub expected_price: Option<Amount>,
}

impl HarvestUpdate {
    /// Crop identity and quantity are locked once the harvest is sold.
    pub fn touches_core_fields(&self) -> bool {
        self.crop_type.is_some() || self.variety.is_some() || self.quantity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sellable_statuses() {
        assert!(is_sellable(HarvestStatus::Available));
        assert!(is_sellable(HarvestStatus::Reserved));
        assert!(!is_sellable(HarvestStatus::Sold));
        assert!(!is_sellable(HarvestStatus::Expired));
        assert!(!is_sellable(HarvestStatus::Cancelled));
    }

    #[test]
    fn draft_rejects_negative_quantity() {
        let err = HarvestDraft::new()
            .set_farmer("farmer_1abc")
            .set_crop_type("maize")
            .set_quantity("-1".parse().unwrap())
            .set_unit("kg")
            .set_expected_price("35".parse().unwrap())
            .finalise()
            .unwrap_err();

        assert!(err.is_validation());
    }
}
