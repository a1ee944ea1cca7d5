use assessment_core::{
    AssessmentError, Candle, CompanyProfile, FinancialSnapshot, MarketDataProvider, PriceHistory,
    StockAssessment,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use scoring_engine::{ScoringEngine, ScoringProfile};
use serde::{Deserialize, Serialize};

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

const CACHE_TTL_SECS: i64 = 300; // 5 minutes

/// Full per-ticker output: normalized inputs, scoring result, and the user
/// parameters the assessment was run with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerReport {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub company: Option<CompanyProfile>,
    pub snapshot: FinancialSnapshot,
    pub assessment: StockAssessment,
    pub scoring_profile: String,
    pub target_price: Option<f64>,
    pub hold_months: u32,
    pub history: Option<PriceHistory>,
}

/// Composes the market data provider with the scoring engine. Stateless
/// apart from short-lived response caches; every report is built fresh.
pub struct AssessmentOrchestrator<P: MarketDataProvider> {
    provider: P,
    /// Cache snapshots per symbol (5-min TTL)
    snapshot_cache: DashMap<String, CacheEntry<FinancialSnapshot>>,
    /// Cache company profiles per symbol (5-min TTL)
    profile_cache: DashMap<String, CacheEntry<CompanyProfile>>,
    /// Cache candles per (symbol, months) (5-min TTL)
    candles_cache: DashMap<String, CacheEntry<Vec<Candle>>>,
}

impl<P: MarketDataProvider> AssessmentOrchestrator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            snapshot_cache: DashMap::new(),
            profile_cache: DashMap::new(),
            candles_cache: DashMap::new(),
        }
    }

    fn is_fresh<T>(entry: &CacheEntry<T>) -> bool {
        (Utc::now() - entry.cached_at).num_seconds() < CACHE_TTL_SECS
    }

    /// Normalized snapshot for a symbol, served from cache when fresh.
    pub async fn snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, AssessmentError> {
        if let Some(entry) = self.snapshot_cache.get(symbol) {
            if Self::is_fresh(&entry) {
                return Ok(entry.data.clone());
            }
        }

        let snapshot = self.provider.snapshot(symbol).await?;
        self.snapshot_cache.insert(
            symbol.to_string(),
            CacheEntry {
                data: snapshot.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(snapshot)
    }

    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, AssessmentError> {
        if let Some(entry) = self.profile_cache.get(symbol) {
            if Self::is_fresh(&entry) {
                return Ok(entry.data.clone());
            }
        }

        let profile = self.provider.profile(symbol).await?;
        self.profile_cache.insert(
            symbol.to_string(),
            CacheEntry {
                data: profile.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(profile)
    }

    /// Daily price history for the chart, served from cache when fresh.
    pub async fn history(
        &self,
        symbol: &str,
        months: u32,
    ) -> Result<PriceHistory, AssessmentError> {
        let cache_key = format!("{}:{}", symbol, months);
        if let Some(entry) = self.candles_cache.get(&cache_key) {
            if Self::is_fresh(&entry) {
                return Ok(PriceHistory {
                    symbol: symbol.to_string(),
                    candles: entry.data.clone(),
                });
            }
        }

        let candles = self.provider.candles(symbol, months).await?;
        self.candles_cache.insert(
            cache_key,
            CacheEntry {
                data: candles.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(PriceHistory {
            symbol: symbol.to_string(),
            candles,
        })
    }

    /// Build a full report for one ticker.
    ///
    /// The snapshot is the hard dependency; company profile and price
    /// history degrade to absent with a warning, so a partially failing
    /// vendor still yields a complete assessment.
    pub async fn report(
        &self,
        symbol: &str,
        target_price: Option<f64>,
        hold_months: u32,
        profile: ScoringProfile,
        history_months: Option<u32>,
    ) -> Result<TickerReport, AssessmentError> {
        tracing::info!("Building assessment report for {}", symbol);

        let (snapshot_result, company_result, history_result) = tokio::join!(
            self.snapshot(symbol),
            self.company_profile(symbol),
            async {
                match history_months {
                    Some(months) => Some(self.history(symbol, months).await),
                    None => None,
                }
            },
        );

        let snapshot = snapshot_result?;

        let company = match company_result {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Company profile unavailable for {}: {}", symbol, e);
                None
            }
        };

        let history = match history_result {
            Some(Ok(history)) => Some(history),
            Some(Err(e)) => {
                tracing::warn!("Price history unavailable for {}: {}", symbol, e);
                None
            }
            None => None,
        };

        let engine = ScoringEngine::new(profile);
        let assessment = engine.assess(&snapshot, target_price);
        tracing::info!(
            "{}: score {}/{} -> {}",
            symbol,
            assessment.raw_score,
            assessment.max_score,
            assessment.recommendation.to_label()
        );

        Ok(TickerReport {
            symbol: symbol.to_string(),
            generated_at: Utc::now(),
            company,
            snapshot,
            assessment,
            scoring_profile: engine.profile().name.clone(),
            target_price,
            hold_months,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assessment_core::Recommendation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        snapshot_calls: AtomicUsize,
        fail_profile: bool,
    }

    impl MockProvider {
        fn new(fail_profile: bool) -> Self {
            Self {
                snapshot_calls: AtomicUsize::new(0),
                fail_profile,
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn snapshot(&self, _symbol: &str) -> Result<FinancialSnapshot, AssessmentError> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            Ok(FinancialSnapshot {
                price: Some(100.0),
                eps: Some(5.0),
                return_on_equity: Some(0.15),
                revenue_growth: Some(0.12),
                debt_to_equity: Some(0.5),
                pe_ratio: Some(18.0),
                dividend_yield: Some(0.03),
                ..Default::default()
            })
        }

        async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AssessmentError> {
            if self.fail_profile {
                return Err(AssessmentError::ApiError("profile endpoint down".to_string()));
            }
            Ok(CompanyProfile {
                name: format!("{} Inc.", symbol),
                exchange: Some("NASDAQ".to_string()),
                industry: Some("Technology".to_string()),
                market_cap: Some(1_500_000.0),
                currency: Some("USD".to_string()),
            })
        }

        async fn candles(&self, _symbol: &str, _months: u32) -> Result<Vec<Candle>, AssessmentError> {
            Ok(vec![Candle {
                timestamp: Utc::now(),
                open: 99.0,
                high: 101.0,
                low: 98.5,
                close: 100.0,
                volume: 10_000.0,
            }])
        }
    }

    #[tokio::test]
    async fn report_composes_all_parts() {
        let orchestrator = AssessmentOrchestrator::new(MockProvider::new(false));

        let report = orchestrator
            .report("AAPL", Some(89.0), 3, ScoringProfile::default_profile(), Some(12))
            .await
            .unwrap();

        assert_eq!(report.symbol, "AAPL");
        assert_eq!(report.scoring_profile, "default");
        assert_eq!(report.hold_months, 3);
        assert_eq!(report.assessment.raw_score, 65);
        assert_eq!(report.assessment.recommendation, Recommendation::StrongBuy);
        assert_eq!(report.company.unwrap().name, "AAPL Inc.");
        assert_eq!(report.history.unwrap().candles.len(), 1);

        let verdict = report.assessment.price_target_verdict.unwrap();
        assert!(verdict.favorable);
    }

    #[tokio::test]
    async fn profile_failure_degrades_to_partial_report() {
        let orchestrator = AssessmentOrchestrator::new(MockProvider::new(true));

        let report = orchestrator
            .report("MSFT", None, 6, ScoringProfile::default_profile(), None)
            .await
            .unwrap();

        assert!(report.company.is_none());
        assert!(report.history.is_none());
        assert_eq!(report.assessment.raw_score, 65);
    }

    #[tokio::test]
    async fn snapshot_is_cached_within_ttl() {
        let orchestrator = AssessmentOrchestrator::new(MockProvider::new(false));

        orchestrator.snapshot("NVDA").await.unwrap();
        orchestrator.snapshot("NVDA").await.unwrap();

        assert_eq!(
            orchestrator.provider.snapshot_calls.load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn history_carries_symbol_and_candles() {
        let orchestrator = AssessmentOrchestrator::new(MockProvider::new(false));

        let history = orchestrator.history("TSLA", 12).await.unwrap();
        assert_eq!(history.symbol, "TSLA");
        assert_eq!(history.candles.len(), 1);
    }
}
