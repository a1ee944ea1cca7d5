use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time fundamental metrics for one ticker, normalized for scoring.
///
/// Every field is either a finite number or absent. Absence means the vendor
/// did not report the metric; it is never collapsed to zero. Ratio-style
/// fields (`return_on_equity`, `revenue_growth`, `dividend_yield`,
/// `profit_margin`) are fractional, e.g. 0.12 = 12%.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub price: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub current_ratio: Option<f64>,
    pub profit_margin: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub beta: Option<f64>,
}

/// Categorical recommendation derived from the confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Avoid,
}

impl Recommendation {
    /// Map a confidence percentage to a recommendation tier.
    ///
    /// Total over 0..=100; boundaries belong to the higher tier (75 is
    /// StrongBuy, 60 is Buy, 40 is Hold).
    pub fn from_confidence(percent: u8) -> Self {
        match percent {
            p if p >= 75 => Recommendation::StrongBuy,
            p if p >= 60 => Recommendation::Buy,
            p if p >= 40 => Recommendation::Hold,
            _ => Recommendation::Avoid,
        }
    }

    /// Human-readable label for the recommendation
    pub fn to_label(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Hold => "Hold",
            Recommendation::Avoid => "Avoid",
        }
    }
}

/// Verdict on a user-supplied target price relative to the current price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTargetVerdict {
    pub message: String,
    pub favorable: bool,
}

/// Scoring output for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAssessment {
    pub raw_score: i32,
    pub max_score: i32,
    pub confidence_percent: u8,
    pub recommendation: Recommendation,
    /// One entry per satisfied rule, in rule-declaration order
    pub reasons: Vec<String>,
    /// Present only when both current price and target price are known
    pub price_target_verdict: Option<PriceTargetVerdict>,
}

/// Intraday quote. A current price of exactly zero from the vendor means
/// "unknown symbol" and is normalized to `None` before it reaches here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub current: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub previous_close: Option<f64>,
}

/// Daily OHLCV candle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Company profile data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub exchange: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub currency: Option<String>,
}

/// Ordered daily closing history for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub candles: Vec<Candle>,
}
