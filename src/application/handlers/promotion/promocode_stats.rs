//! GetPromocodeStatsHandler - Admin query over promocode usage.

use crate::application::PromotionLedger;
use crate::domain::promotion::{Promocode, PromotionError};

#[derive(Debug, Clone, Default)]
pub struct GetPromocodeStatsQuery;

#[derive(Debug, Clone)]
pub struct GetPromocodeStatsResult {
    /// Codes used at least once, most used first.
    pub promocodes: Vec<Promocode>,
}

pub struct GetPromocodeStatsHandler {
    promotions: PromotionLedger,
}

impl GetPromocodeStatsHandler {
    pub fn new(promotions: PromotionLedger) -> Self {
        Self { promotions }
    }

    pub async fn handle(
        &self,
        _query: GetPromocodeStatsQuery,
    ) -> Result<GetPromocodeStatsResult, PromotionError> {
        let promocodes = self.promotions.usage_report().await?;
        Ok(GetPromocodeStatsResult { promocodes })
    }
}
