use assessment_core::{FinancialSnapshot, PriceTargetVerdict, Recommendation, StockAssessment};
use serde::{Deserialize, Serialize};

/// Snapshot field a rule reads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Metric {
    Eps,
    ReturnOnEquity,
    RevenueGrowth,
    DebtToEquity,
    PeRatio,
    ForwardPe,
    PegRatio,
    DividendYield,
    CurrentRatio,
    ProfitMargin,
    InterestCoverage,
    Beta,
}

impl Metric {
    /// Pull this metric out of a snapshot. Absent stays absent.
    pub fn extract(&self, snapshot: &FinancialSnapshot) -> Option<f64> {
        match self {
            Metric::Eps => snapshot.eps,
            Metric::ReturnOnEquity => snapshot.return_on_equity,
            Metric::RevenueGrowth => snapshot.revenue_growth,
            Metric::DebtToEquity => snapshot.debt_to_equity,
            Metric::PeRatio => snapshot.pe_ratio,
            Metric::ForwardPe => snapshot.forward_pe,
            Metric::PegRatio => snapshot.peg_ratio,
            Metric::DividendYield => snapshot.dividend_yield,
            Metric::CurrentRatio => snapshot.current_ratio,
            Metric::ProfitMargin => snapshot.profit_margin,
            Metric::InterestCoverage => snapshot.interest_coverage,
            Metric::Beta => snapshot.beta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Comparator {
    Above,
    Below,
}

impl Comparator {
    fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Above => value > threshold,
            Comparator::Below => value < threshold,
        }
    }
}

/// One threshold check: if the metric is present and the comparison holds,
/// award the points and emit the reason. Rules do not interact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    pub metric: Metric,
    pub comparator: Comparator,
    pub threshold: f64,
    pub points: i32,
    pub reason: String,
}

impl ScoreRule {
    pub fn new(
        metric: Metric,
        comparator: Comparator,
        threshold: f64,
        points: i32,
        reason: &str,
    ) -> Self {
        Self {
            metric,
            comparator,
            threshold,
            points,
            reason: reason.to_string(),
        }
    }
}

/// Named, ordered rule table. The maximum score is always derived from the
/// rules actually present, never hardcoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    pub name: String,
    pub rules: Vec<ScoreRule>,
}

impl ScoringProfile {
    pub fn new(name: impl Into<String>, rules: Vec<ScoreRule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// Canonical rule table (65 points)
    pub fn default_profile() -> Self {
        Self::new(
            "default",
            vec![
                ScoreRule::new(
                    Metric::Eps,
                    Comparator::Above,
                    0.0,
                    15,
                    "positive earnings per share",
                ),
                ScoreRule::new(
                    Metric::ReturnOnEquity,
                    Comparator::Above,
                    0.10,
                    10,
                    "return on equity exceeds 10%",
                ),
                ScoreRule::new(
                    Metric::RevenueGrowth,
                    Comparator::Above,
                    0.10,
                    15,
                    "revenue growth exceeds 10% year over year",
                ),
                ScoreRule::new(Metric::DebtToEquity, Comparator::Below, 1.0, 10, "low leverage"),
                ScoreRule::new(
                    Metric::PeRatio,
                    Comparator::Below,
                    20.0,
                    10,
                    "price/earnings below 20 (possible undervaluation)",
                ),
                ScoreRule::new(
                    Metric::DividendYield,
                    Comparator::Above,
                    0.02,
                    5,
                    "dividend yield exceeds 2%",
                ),
            ],
        )
    }

    /// Default rules plus balance-sheet safety checks
    pub fn conservative() -> Self {
        let mut rules = Self::default_profile().rules;
        rules.extend([
            ScoreRule::new(
                Metric::CurrentRatio,
                Comparator::Above,
                1.5,
                5,
                "healthy short-term liquidity",
            ),
            ScoreRule::new(
                Metric::ProfitMargin,
                Comparator::Above,
                0.10,
                5,
                "net margin exceeds 10%",
            ),
            ScoreRule::new(
                Metric::InterestCoverage,
                Comparator::Above,
                3.0,
                5,
                "interest comfortably covered by operating income",
            ),
            ScoreRule::new(Metric::Beta, Comparator::Below, 1.2, 5, "below-market volatility"),
        ]);
        Self::new("conservative", rules)
    }

    /// Growth-tilted weights over valuation-forward metrics
    pub fn aggressive() -> Self {
        Self::new(
            "aggressive",
            vec![
                ScoreRule::new(
                    Metric::Eps,
                    Comparator::Above,
                    0.0,
                    10,
                    "positive earnings per share",
                ),
                ScoreRule::new(
                    Metric::RevenueGrowth,
                    Comparator::Above,
                    0.10,
                    25,
                    "revenue growth exceeds 10% year over year",
                ),
                ScoreRule::new(
                    Metric::ReturnOnEquity,
                    Comparator::Above,
                    0.10,
                    10,
                    "return on equity exceeds 10%",
                ),
                ScoreRule::new(
                    Metric::PegRatio,
                    Comparator::Below,
                    1.5,
                    10,
                    "growth priced reasonably (PEG below 1.5)",
                ),
                ScoreRule::new(
                    Metric::ForwardPe,
                    Comparator::Below,
                    25.0,
                    10,
                    "forward earnings multiple below 25",
                ),
            ],
        )
    }

    /// Resolve a profile by its public name
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default_profile()),
            "conservative" => Some(Self::conservative()),
            "aggressive" => Some(Self::aggressive()),
            _ => None,
        }
    }

    /// Sum of all rule point values
    pub fn max_score(&self) -> i32 {
        self.rules.iter().map(|r| r.points).sum()
    }
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self::default_profile()
    }
}

/// Deterministic, stateless scoring over a normalized snapshot
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    profile: ScoringProfile,
}

impl ScoringEngine {
    pub fn new(profile: ScoringProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }

    /// Apply the rule table. A rule whose metric is absent contributes zero
    /// points and no reason; that is not an error.
    pub fn evaluate(&self, snapshot: &FinancialSnapshot) -> (i32, Vec<String>) {
        let mut score = 0;
        let mut reasons = Vec::new();

        for rule in &self.profile.rules {
            if let Some(value) = rule.metric.extract(snapshot) {
                if rule.comparator.holds(value, rule.threshold) {
                    score += rule.points;
                    reasons.push(rule.reason.clone());
                }
            }
        }

        (score, reasons)
    }

    /// Full assessment: evaluate, derive confidence, classify, and check the
    /// target price when one was supplied. Always produces a well-formed
    /// assessment, even from an all-absent snapshot.
    pub fn assess(
        &self,
        snapshot: &FinancialSnapshot,
        target_price: Option<f64>,
    ) -> StockAssessment {
        let (raw_score, reasons) = self.evaluate(snapshot);
        let max_score = self.profile.max_score();
        let confidence = confidence_percent(raw_score, max_score);

        StockAssessment {
            raw_score,
            max_score,
            confidence_percent: confidence,
            recommendation: Recommendation::from_confidence(confidence),
            reasons,
            price_target_verdict: target_price
                .and_then(|target| evaluate_price_target(snapshot.price, target)),
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringProfile::default_profile())
    }
}

/// `round(100 * raw / max)`, clamped to 0..=100. An empty rule table
/// (`max_score == 0`) yields 0 rather than a division error. The clamp
/// matters once a profile carries negative-point penalty rules.
pub fn confidence_percent(raw_score: i32, max_score: i32) -> u8 {
    if max_score <= 0 {
        return 0;
    }
    let percent = (raw_score as f64 / max_score as f64) * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}

/// Compare a user-supplied target price against the current price.
///
/// Returns `None` when the current price is unknown (callers must render
/// that as an explicit unknown state, not drop it silently). A current
/// price of exactly zero is treated as unknown. Within ±10% the target
/// counts as close; beyond that the direction decides favorability.
pub fn evaluate_price_target(
    current_price: Option<f64>,
    target_price: f64,
) -> Option<PriceTargetVerdict> {
    let current = match current_price {
        Some(p) if p > 0.0 => p,
        _ => return None,
    };

    let diff = (target_price - current) / current * 100.0;

    let verdict = if diff > 10.0 {
        PriceTargetVerdict {
            message: format!(
                "Target price is {:.2}% above current price, consider waiting.",
                diff
            ),
            favorable: false,
        }
    } else if diff < -10.0 {
        PriceTargetVerdict {
            message: format!(
                "Target price is {:.2}% below current price, potential strong buy.",
                diff.abs()
            ),
            favorable: true,
        }
    } else {
        PriceTargetVerdict {
            message: format!("Target is close to current price ({:.2}%).", diff),
            favorable: true,
        }
    };

    Some(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Snapshot that satisfies every rule in the default table
    fn all_good_snapshot() -> FinancialSnapshot {
        FinancialSnapshot {
            price: Some(150.0),
            pe_ratio: Some(15.0),
            eps: Some(6.1),
            return_on_equity: Some(0.22),
            revenue_growth: Some(0.14),
            debt_to_equity: Some(0.6),
            dividend_yield: Some(0.025),
            ..Default::default()
        }
    }

    #[test]
    fn all_absent_snapshot_scores_zero() {
        let engine = ScoringEngine::default();
        let assessment = engine.assess(&FinancialSnapshot::default(), None);

        assert_eq!(assessment.raw_score, 0);
        assert_eq!(assessment.max_score, 65);
        assert_eq!(assessment.confidence_percent, 0);
        assert_eq!(assessment.recommendation, Recommendation::Avoid);
        assert!(assessment.reasons.is_empty());
        assert!(assessment.price_target_verdict.is_none());
    }

    #[test]
    fn all_rules_satisfied_is_strong_buy() {
        let engine = ScoringEngine::default();
        let assessment = engine.assess(&all_good_snapshot(), None);

        assert_eq!(assessment.raw_score, 65);
        assert_eq!(assessment.max_score, 65);
        assert_eq!(assessment.confidence_percent, 100);
        assert_eq!(assessment.recommendation, Recommendation::StrongBuy);
        assert_eq!(assessment.reasons.len(), 6);
    }

    #[test]
    fn raw_score_stays_within_bounds() {
        let engine = ScoringEngine::default();
        let snapshots = [
            FinancialSnapshot::default(),
            all_good_snapshot(),
            FinancialSnapshot {
                eps: Some(-3.0),
                pe_ratio: Some(80.0),
                debt_to_equity: Some(4.0),
                ..Default::default()
            },
        ];

        for snapshot in &snapshots {
            let (raw, _) = engine.evaluate(snapshot);
            assert!(raw >= 0);
            assert!(raw <= engine.profile().max_score());
        }
    }

    #[test]
    fn missing_field_never_scores() {
        // eps absent, everything else satisfied: the eps rule is skipped,
        // not treated as satisfied and not treated as failed input.
        let snapshot = FinancialSnapshot {
            eps: None,
            ..all_good_snapshot()
        };
        let (raw, reasons) = ScoringEngine::default().evaluate(&snapshot);

        assert_eq!(raw, 50);
        assert_eq!(reasons.len(), 5);
        assert!(!reasons.iter().any(|r| r.contains("earnings per share")));
    }

    #[test]
    fn present_but_failing_field_scores_nothing() {
        let snapshot = FinancialSnapshot {
            eps: Some(-1.2),
            ..Default::default()
        };
        let (raw, reasons) = ScoringEngine::default().evaluate(&snapshot);

        assert_eq!(raw, 0);
        assert!(reasons.is_empty());
    }

    #[test]
    fn reasons_follow_rule_declaration_order() {
        // Satisfy only the first and last default rules; order must match
        // the table, not satisfaction count or metric name.
        let snapshot = FinancialSnapshot {
            eps: Some(2.0),
            dividend_yield: Some(0.03),
            ..Default::default()
        };
        let (raw, reasons) = ScoringEngine::default().evaluate(&snapshot);

        assert_eq!(raw, 20);
        assert_eq!(
            reasons,
            vec![
                "positive earnings per share".to_string(),
                "dividend yield exceeds 2%".to_string(),
            ]
        );
    }

    #[test]
    fn evaluate_is_pure() {
        let engine = ScoringEngine::default();
        let snapshot = all_good_snapshot();

        assert_eq!(engine.evaluate(&snapshot), engine.evaluate(&snapshot));
        assert_eq!(
            engine.assess(&snapshot, Some(140.0)),
            engine.assess(&snapshot, Some(140.0))
        );
    }

    #[test]
    fn confidence_is_monotone_in_raw_score() {
        let mut last = 0;
        for raw in 0..=65 {
            let pct = confidence_percent(raw, 65);
            assert!(pct >= last);
            last = pct;
        }
    }

    #[test]
    fn confidence_rounds_to_nearest() {
        // 33/65 = 50.77% -> 51
        assert_eq!(confidence_percent(33, 65), 51);
        // 13/65 = 20.0% exactly
        assert_eq!(confidence_percent(13, 65), 20);
    }

    #[test]
    fn confidence_handles_empty_rule_set() {
        assert_eq!(confidence_percent(0, 0), 0);

        let engine = ScoringEngine::new(ScoringProfile::new("empty", Vec::new()));
        let assessment = engine.assess(&all_good_snapshot(), None);
        assert_eq!(assessment.confidence_percent, 0);
        assert_eq!(assessment.recommendation, Recommendation::Avoid);
    }

    #[test]
    fn confidence_clamps_penalty_rules() {
        // A net-negative score from penalty rules clamps to 0 rather than
        // underflowing the percentage.
        assert_eq!(confidence_percent(-5, 10), 0);
        assert_eq!(confidence_percent(110, 100), 100);
    }

    #[test]
    fn classification_ladder_boundaries() {
        assert_eq!(Recommendation::from_confidence(100), Recommendation::StrongBuy);
        assert_eq!(Recommendation::from_confidence(75), Recommendation::StrongBuy);
        assert_eq!(Recommendation::from_confidence(74), Recommendation::Buy);
        assert_eq!(Recommendation::from_confidence(60), Recommendation::Buy);
        assert_eq!(Recommendation::from_confidence(59), Recommendation::Hold);
        assert_eq!(Recommendation::from_confidence(40), Recommendation::Hold);
        assert_eq!(Recommendation::from_confidence(39), Recommendation::Avoid);
        assert_eq!(Recommendation::from_confidence(0), Recommendation::Avoid);
    }

    #[test]
    fn classification_is_total_over_percent_range() {
        for pct in 0..=100u8 {
            // Every value maps to exactly one tier; just exercise the match.
            let _ = Recommendation::from_confidence(pct);
        }
    }

    #[test]
    fn target_well_above_current_is_unfavorable() {
        let verdict = evaluate_price_target(Some(100.0), 111.0).unwrap();
        assert!(!verdict.favorable);
        assert!(verdict.message.contains("11.00% above"));
    }

    #[test]
    fn target_well_below_current_is_favorable() {
        let verdict = evaluate_price_target(Some(100.0), 89.0).unwrap();
        assert!(verdict.favorable);
        assert!(verdict.message.contains("11.00% below"));
    }

    #[test]
    fn target_near_current_is_favorable() {
        let verdict = evaluate_price_target(Some(100.0), 105.0).unwrap();
        assert!(verdict.favorable);
        assert!(verdict.message.contains("close to current price"));
        assert!(verdict.message.contains("5.00%"));
    }

    #[test]
    fn unknown_current_price_yields_no_verdict() {
        assert_eq!(evaluate_price_target(None, 100.0), None);
        // Vendor's zero sentinel counts as unknown, which also keeps the
        // percentage math away from a zero divisor.
        assert_eq!(evaluate_price_target(Some(0.0), 100.0), None);
    }

    #[test]
    fn assessment_carries_price_verdict_only_when_possible() {
        let engine = ScoringEngine::default();

        let with_price = engine.assess(&all_good_snapshot(), Some(120.0));
        assert!(with_price.price_target_verdict.is_some());

        let no_target = engine.assess(&all_good_snapshot(), None);
        assert!(no_target.price_target_verdict.is_none());

        let no_price = engine.assess(&FinancialSnapshot::default(), Some(120.0));
        assert!(no_price.price_target_verdict.is_none());
    }

    #[test]
    fn max_score_is_derived_from_rules() {
        assert_eq!(ScoringProfile::default_profile().max_score(), 65);
        assert_eq!(ScoringProfile::conservative().max_score(), 85);
        assert_eq!(ScoringProfile::aggressive().max_score(), 65);

        let mut profile = ScoringProfile::default_profile();
        profile.rules.push(ScoreRule::new(
            Metric::Beta,
            Comparator::Below,
            1.0,
            7,
            "low beta",
        ));
        assert_eq!(profile.max_score(), 72);
    }

    #[test]
    fn profiles_resolve_by_name() {
        assert_eq!(ScoringProfile::by_name("default").unwrap().name, "default");
        assert_eq!(
            ScoringProfile::by_name("conservative").unwrap().name,
            "conservative"
        );
        assert_eq!(
            ScoringProfile::by_name("aggressive").unwrap().name,
            "aggressive"
        );
        assert!(ScoringProfile::by_name("yolo").is_none());
    }

    #[test]
    fn conservative_profile_rewards_balance_sheet_strength() {
        let snapshot = FinancialSnapshot {
            current_ratio: Some(2.1),
            profit_margin: Some(0.18),
            interest_coverage: Some(8.0),
            beta: Some(0.9),
            ..all_good_snapshot()
        };
        let engine = ScoringEngine::new(ScoringProfile::conservative());
        let assessment = engine.assess(&snapshot, None);

        assert_eq!(assessment.raw_score, 85);
        assert_eq!(assessment.confidence_percent, 100);
        assert_eq!(assessment.recommendation, Recommendation::StrongBuy);
    }

    #[test]
    fn partial_snapshot_lands_in_middle_tiers() {
        // eps + roe + low debt = 35/65 = 53.8% -> 54 -> Hold
        let snapshot = FinancialSnapshot {
            eps: Some(4.2),
            return_on_equity: Some(0.15),
            debt_to_equity: Some(0.4),
            ..Default::default()
        };
        let assessment = ScoringEngine::default().assess(&snapshot, None);

        assert_eq!(assessment.raw_score, 35);
        assert_eq!(assessment.confidence_percent, 54);
        assert_eq!(assessment.recommendation, Recommendation::Hold);
    }

    #[test]
    fn price_diff_math_matches_expected_percent() {
        // Keep the band arithmetic honest around the documented cases.
        let current = 100.0;
        for (target, expected) in [(111.0, 11.0), (89.0, -11.0), (105.0, 5.0)] {
            let diff = (target - current) / current * 100.0;
            assert_relative_eq!(diff, expected, epsilon = 1e-9);
        }
    }
}
