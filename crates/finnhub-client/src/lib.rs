use assessment_core::{
    AssessmentError, Candle, CompanyProfile, FinancialSnapshot, MarketDataProvider, Quote,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Need to wait until the oldest request falls out of the window
            let wait_until = ts.front().unwrap().checked_add(self.window).unwrap();
            let sleep_dur = wait_until.duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for Finnhub API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct FinnhubClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl FinnhubClient {
    pub fn new(api_key: String) -> Self {
        // Free tier allows 60 req/min; paid plans can raise FINNHUB_RATE_LIMIT.
        let rate_limit: usize = std::env::var("FINNHUB_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AssessmentError> {
        let request = builder
            .build()
            .map_err(|e| AssessmentError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| AssessmentError::ApiError("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| AssessmentError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "Finnhub 429 rate limited, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AssessmentError::ApiError(
            "Rate limited by Finnhub after 3 retries".to_string(),
        ))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, AssessmentError> {
        let response = self.send_request(self.client.get(url).query(query)).await?;

        if !response.status().is_success() {
            return Err(AssessmentError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AssessmentError::ApiError(e.to_string()))
    }

    /// Get the real-time quote for a symbol. Finnhub reports every field as
    /// zero for unknown symbols, so zeros normalize to absent.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, AssessmentError> {
        let url = format!("{}/quote", BASE_URL);
        let resp: QuoteResponse = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("token", self.api_key.clone()),
                ],
            )
            .await?;

        Ok(Quote {
            current: non_zero(resp.current),
            high: non_zero(resp.high),
            low: non_zero(resp.low),
            open: non_zero(resp.open),
            previous_close: non_zero(resp.previous_close),
        })
    }

    /// Get normalized fundamentals for a symbol (without the current price).
    ///
    /// Finnhub quotes ROE, revenue growth, margins, and dividend yield in
    /// percent; they are converted to fractions here so the scoring core
    /// sees one consistent unit.
    pub async fn get_metrics(&self, symbol: &str) -> Result<FinancialSnapshot, AssessmentError> {
        let url = format!("{}/stock/metric", BASE_URL);
        let resp: MetricResponse = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("metric", "all".to_string()),
                    ("token", self.api_key.clone()),
                ],
            )
            .await?;

        Ok(snapshot_from_metrics(&resp.metric))
    }

    /// Get the company profile for a symbol.
    pub async fn get_profile(&self, symbol: &str) -> Result<CompanyProfile, AssessmentError> {
        let url = format!("{}/stock/profile2", BASE_URL);
        let resp: ProfileResponse = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("token", self.api_key.clone()),
                ],
            )
            .await?;

        Ok(CompanyProfile {
            name: resp.name.unwrap_or_else(|| symbol.to_string()),
            exchange: resp.exchange,
            industry: resp.industry,
            market_cap: resp.market_cap,
            currency: resp.currency,
        })
    }

    /// Get daily candles covering roughly the last `months` months. A
    /// `no_data` status from the vendor yields an empty history, not an
    /// error.
    pub async fn get_candles(
        &self,
        symbol: &str,
        months: u32,
    ) -> Result<Vec<Candle>, AssessmentError> {
        let to = Utc::now();
        let from = to - ChronoDuration::days(30 * months as i64);

        let url = format!("{}/stock/candle", BASE_URL);
        let resp: CandleResponse = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("resolution", "D".to_string()),
                    ("from", from.timestamp().to_string()),
                    ("to", to.timestamp().to_string()),
                    ("token", self.api_key.clone()),
                ],
            )
            .await?;

        if resp.status != "ok" {
            tracing::warn!("No candle data for {} ({})", symbol, resp.status);
            return Ok(Vec::new());
        }

        Ok(candles_from_columns(&resp))
    }

    /// Quote and fundamentals joined into one scoring-ready snapshot.
    /// Fundamentals are the hard dependency; a failed quote degrades to an
    /// absent price.
    pub async fn get_snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, AssessmentError> {
        let (quote_result, metrics_result) =
            tokio::join!(self.get_quote(symbol), self.get_metrics(symbol));

        let mut snapshot = metrics_result?;
        match quote_result {
            Ok(quote) => snapshot.price = quote.current,
            Err(e) => tracing::warn!("Quote fetch failed for {}: {}", symbol, e),
        }

        Ok(snapshot)
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubClient {
    async fn snapshot(&self, symbol: &str) -> Result<FinancialSnapshot, AssessmentError> {
        self.get_snapshot(symbol).await
    }

    async fn profile(&self, symbol: &str) -> Result<CompanyProfile, AssessmentError> {
        self.get_profile(symbol).await
    }

    async fn candles(&self, symbol: &str, months: u32) -> Result<Vec<Candle>, AssessmentError> {
        self.get_candles(symbol, months).await
    }
}

fn non_zero(value: f64) -> Option<f64> {
    if value == 0.0 || !value.is_finite() {
        None
    } else {
        Some(value)
    }
}

/// Read a raw metric, dropping nulls and non-finite values so the core
/// never sees a NaN/inf sentinel as a valid number.
fn metric_f64(metric: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<f64> {
    metric.get(key).and_then(|v| v.as_f64()).filter(|v| v.is_finite())
}

/// Percent-quoted vendor metric to fraction (12.5 -> 0.125)
fn metric_pct(metric: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<f64> {
    metric_f64(metric, key).map(|v| v / 100.0)
}

fn snapshot_from_metrics(metric: &serde_json::Map<String, serde_json::Value>) -> FinancialSnapshot {
    FinancialSnapshot {
        price: None,
        pe_ratio: metric_f64(metric, "peNormalizedAnnual"),
        forward_pe: metric_f64(metric, "forwardPE"),
        peg_ratio: metric_f64(metric, "pegAnnual"),
        eps: metric_f64(metric, "epsAnnual"),
        return_on_equity: metric_pct(metric, "roeAnnual"),
        revenue_growth: metric_pct(metric, "revenueGrowthYearOverYear"),
        debt_to_equity: metric_f64(metric, "debtEquityRatio"),
        dividend_yield: metric_pct(metric, "dividendYieldIndicatedAnnual"),
        current_ratio: metric_f64(metric, "currentRatioAnnual"),
        profit_margin: metric_pct(metric, "netProfitMarginAnnual"),
        interest_coverage: metric_f64(metric, "netInterestCoverageAnnual"),
        beta: metric_f64(metric, "beta"),
    }
}

/// Finnhub candles arrive column-oriented; zip them into row candles,
/// tolerating ragged arrays by truncating to the shortest column.
fn candles_from_columns(resp: &CandleResponse) -> Vec<Candle> {
    let n = resp
        .timestamps
        .len()
        .min(resp.opens.len())
        .min(resp.highs.len())
        .min(resp.lows.len())
        .min(resp.closes.len())
        .min(resp.volumes.len());

    (0..n)
        .map(|i| Candle {
            timestamp: DateTime::from_timestamp(resp.timestamps[i], 0)
                .unwrap_or_else(Utc::now),
            open: resp.opens[i],
            high: resp.highs[i],
            low: resp.lows[i],
            close: resp.closes[i],
            volume: resp.volumes[i],
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "c", default)]
    current: f64,
    #[serde(rename = "h", default)]
    high: f64,
    #[serde(rename = "l", default)]
    low: f64,
    #[serde(rename = "o", default)]
    open: f64,
    #[serde(rename = "pc", default)]
    previous_close: f64,
}

#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(rename = "finnhubIndustry", default)]
    industry: Option<String>,
    #[serde(rename = "marketCapitalization", default)]
    market_cap: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    #[serde(rename = "s")]
    status: String,
    #[serde(rename = "t", default)]
    timestamps: Vec<i64>,
    #[serde(rename = "o", default)]
    opens: Vec<f64>,
    #[serde(rename = "h", default)]
    highs: Vec<f64>,
    #[serde(rename = "l", default)]
    lows: Vec<f64>,
    #[serde(rename = "c", default)]
    closes: Vec<f64>,
    #[serde(rename = "v", default)]
    volumes: Vec<f64>,
}
