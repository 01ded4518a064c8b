//! Market-data access port trait.

use crate::domain::error::AllocatorError;
use crate::domain::price_series::{HistoryPeriod, PricePoint};

pub trait PricePort {
    /// Daily adjusted closes for `ticker`, oldest first.
    fn fetch_adjusted_close(
        &self,
        ticker: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<PricePoint>, AllocatorError>;

    fn name(&self) -> &str;
}
