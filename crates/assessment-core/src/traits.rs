use crate::{AssessmentError, Candle, CompanyProfile, FinancialSnapshot};
use async_trait::async_trait;

/// Vendor-agnostic market data source. The orchestrator only sees this
/// trait, so a second data vendor plugs in without touching the scoring
/// path.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Normalized fundamentals plus current price for one symbol
    async fn snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, AssessmentError>;

    /// Company profile data
    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AssessmentError>;

    /// Daily candles covering roughly the last `months` months
    async fn candles(&self, symbol: &str, months: u32) -> Result<Vec<Candle>, AssessmentError>;
}
