//! Single-market edge evaluation.
//!
//! The market price is the prior. Contextual signals shift it in logit space so
//! that stacked penalties can never push the probability past 0 or 1.

use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};
use crate::market::{Market, OddsSnapshot, Side, TotalSide};
use crate::math::{clamp, logit, sigmoid};
use crate::odds::{american_to_decimal, decimal_to_american, implied_probability};

const PROB_FLOOR: f64 = 0.001;
const PROB_CEIL: f64 = 0.999;

const INJURY_WEIGHT: f64 = 0.9;
const FATIGUE_WEIGHT: f64 = 0.7;
const TRAVEL_WEIGHT: f64 = 0.5;
const PUBLIC_BIAS_WEIGHT: f64 = 0.35;
const PACE_MIN: f64 = 0.8;
const PACE_MAX: f64 = 1.25;

const SAFE_MIN_EV_PCT: f64 = 4.0;
const SAFE_MIN_PROB: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentSignals {
    #[serde(default)]
    pub injury_impact: f64,
    #[serde(default)]
    pub fatigue_impact: f64,
    #[serde(default)]
    pub travel_impact: f64,
    #[serde(default = "neutral_pace")]
    pub pace_factor: f64,
    #[serde(default)]
    pub matchup_edge: f64,
    #[serde(default)]
    pub public_bias: f64,
}

fn neutral_pace() -> f64 {
    1.0
}

impl Default for AdjustmentSignals {
    fn default() -> Self {
        Self {
            injury_impact: 0.0,
            fatigue_impact: 0.0,
            travel_impact: 0.0,
            pace_factor: neutral_pace(),
            matchup_edge: 0.0,
            public_bias: 0.0,
        }
    }
}

impl AdjustmentSignals {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("injuryImpact", self.injury_impact),
            ("fatigueImpact", self.fatigue_impact),
            ("travelImpact", self.travel_impact),
            ("paceFactor", self.pace_factor),
            ("matchupEdge", self.matchup_edge),
            ("publicBias", self.public_bias),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(EdgeError::InvalidSignal { name });
            }
        }
        Ok(())
    }

    /// Net logit shift implied by these signals.
    pub fn logit_shift(&self) -> f64 {
        -INJURY_WEIGHT * self.injury_impact - FATIGUE_WEIGHT * self.fatigue_impact
            - TRAVEL_WEIGHT * self.travel_impact
            + clamp(self.pace_factor, PACE_MIN, PACE_MAX).ln()
            + self.matchup_edge
            - PUBLIC_BIAS_WEIGHT * self.public_bias
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyTier {
    Safe,
    Neutral,
    Risky,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEdgeResult {
    pub true_probability: f64,
    pub fair_odds: i32,
    pub market_probability: f64,
    pub market_odds: i32,
    pub ev_percent: f64,
    pub safety_tier: SafetyTier,
}

/// Flat request shape used at the HTTP edge: odds plus every signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRequest {
    pub market_odds: i32,
    #[serde(flatten)]
    pub signals: AdjustmentSignals,
}

pub fn evaluate(market_odds: i32, signals: &AdjustmentSignals) -> Result<MarketEdgeResult> {
    signals.validate()?;
    let odds = market_odds as f64;
    let market_probability = implied_probability(odds)?;
    let market_decimal = american_to_decimal(odds)?;

    let base_logit = logit(clamp(market_probability, PROB_FLOOR, PROB_CEIL))?;
    let adjusted_logit = base_logit + signals.logit_shift();
    let true_probability = clamp(sigmoid(adjusted_logit), PROB_FLOOR, PROB_CEIL);

    let fair_odds = decimal_to_american(1.0 / true_probability)?;
    let ev_percent = (true_probability * market_decimal - 1.0) * 100.0;

    Ok(MarketEdgeResult {
        true_probability,
        fair_odds,
        market_probability,
        market_odds,
        ev_percent,
        safety_tier: classify(ev_percent, true_probability),
    })
}

pub fn evaluate_request(req: &EdgeRequest) -> Result<MarketEdgeResult> {
    evaluate(req.market_odds, &req.signals)
}

fn classify(ev_percent: f64, true_probability: f64) -> SafetyTier {
    if ev_percent >= SAFE_MIN_EV_PCT && true_probability >= SAFE_MIN_PROB {
        SafetyTier::Safe
    } else if ev_percent < 0.0 {
        SafetyTier::Risky
    } else {
        SafetyTier::Neutral
    }
}

// ---------------------------------------------------------------------------
// Game-level signal derivation
// ---------------------------------------------------------------------------

/// Signals shared by every market of one game, oriented to the home side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSignals {
    pub injury_impact: f64,
    pub fatigue_impact: f64,
    pub travel_impact: f64,
    pub pace_factor: f64,
    pub public_bias: f64,
    pub matchup_edge_home: f64,
}

impl Default for GameSignals {
    fn default() -> Self {
        Self {
            injury_impact: 0.0,
            fatigue_impact: 0.0,
            travel_impact: 0.0,
            pace_factor: 1.0,
            public_bias: 0.0,
            matchup_edge_home: 0.0,
        }
    }
}

/// 0.02 per listed injury that is not `active`.
pub fn injury_impact_from_statuses<'a, I>(statuses: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let listed = statuses
        .into_iter()
        .filter(|s| !s.trim().eq_ignore_ascii_case("active"))
        .count();
    listed as f64 * 0.02
}

/// Fatigue penalty for one team given days since its previous game.
pub fn fatigue_for_rest(rest_days: Option<i64>) -> f64 {
    match rest_days {
        None => 0.05,
        Some(d) if d <= 1 => 0.25,
        Some(2) => 0.15,
        Some(3) => 0.08,
        Some(_) => 0.03,
    }
}

pub fn game_fatigue(home_rest_days: Option<i64>, away_rest_days: Option<i64>) -> f64 {
    (fatigue_for_rest(home_rest_days) + fatigue_for_rest(away_rest_days)) / 2.0
}

/// Travel penalty for the visiting team's turnaround.
pub fn travel_for_turnaround(away_rest_days: Option<i64>) -> f64 {
    match away_rest_days {
        None => 0.05,
        Some(d) if d <= 1 => 0.2,
        Some(2) => 0.1,
        Some(_) => 0.05,
    }
}

/// Pace proxy from the summed points baselines of both rosters.
pub fn game_pace_factor(total_points_baseline: f64) -> f64 {
    clamp(total_points_baseline / 220.0, 0.8, 1.3)
}

/// Lopsided lines draw public money; capped at 0.15.
pub fn public_bias_from_lines(spread: Option<f64>, ml_home: Option<i32>, ml_away: Option<i32>) -> f64 {
    let spread = spread.unwrap_or(0.0).abs();
    let ml_diff = (ml_home.unwrap_or(0) as f64 - ml_away.unwrap_or(0) as f64).abs();
    (spread / 12.0 + ml_diff / 8000.0).min(0.15)
}

/// Orient the game signals to one market.
pub fn signals_for(market: &Market, game: &GameSignals) -> AdjustmentSignals {
    let home = AdjustmentSignals {
        injury_impact: game.injury_impact,
        fatigue_impact: game.fatigue_impact,
        travel_impact: game.travel_impact,
        pace_factor: game.pace_factor,
        matchup_edge: game.matchup_edge_home,
        public_bias: game.public_bias,
    };
    let away = AdjustmentSignals {
        matchup_edge: -game.matchup_edge_home,
        public_bias: -game.public_bias,
        ..home
    };

    match market {
        Market::Moneyline { side: Side::Home, .. } => home,
        Market::Moneyline { side: Side::Away, .. } => away,
        Market::Spread { side: Side::Home, line, .. } => AdjustmentSignals {
            matchup_edge: home.matchup_edge - line * 0.01,
            ..home
        },
        Market::Spread { side: Side::Away, line, .. } => AdjustmentSignals {
            matchup_edge: away.matchup_edge - line * 0.01,
            ..away
        },
        Market::Total { side: TotalSide::Over, .. } => AdjustmentSignals {
            injury_impact: game.injury_impact * 0.5,
            pace_factor: game.pace_factor * 1.05,
            ..home
        },
        Market::Total { side: TotalSide::Under, .. } => AdjustmentSignals {
            injury_impact: game.injury_impact * 0.5,
            pace_factor: game.pace_factor * 0.95,
            ..away
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEvaluation {
    pub label: String,
    pub market: Market,
    pub edge: MarketEdgeResult,
}

pub fn evaluate_market(market: &Market, game: &GameSignals) -> Result<MarketEdgeResult> {
    evaluate(market.quote().american_odds(), &signals_for(market, game))
}

pub fn evaluate_markets(
    markets: &[Market],
    game: &GameSignals,
    home_abbr: &str,
    away_abbr: &str,
) -> Result<Vec<MarketEvaluation>> {
    markets
        .iter()
        .map(|market| {
            Ok(MarketEvaluation {
                label: market.label(home_abbr, away_abbr),
                market: *market,
                edge: evaluate_market(market, game)?,
            })
        })
        .collect()
}

/// Every priced market of one game, as read from an odds row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMarketsRequest {
    pub home: String,
    pub away: String,
    pub odds: OddsSnapshot,
    #[serde(default)]
    pub signals: GameSignals,
}

pub fn evaluate_game(req: &GameMarketsRequest) -> Result<Vec<MarketEvaluation>> {
    evaluate_markets(&req.odds.markets(), &req.signals, &req.home, &req.away)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::MarketQuote;

    #[test]
    fn neutral_signals_return_market_probability() {
        let r = evaluate(-150, &AdjustmentSignals::default()).unwrap();
        assert!((r.true_probability - 0.6).abs() < 1e-9);
        assert!((r.market_probability - 0.6).abs() < 1e-12);
        assert!(r.ev_percent.abs() < 1e-6);
        assert_eq!(r.fair_odds, -150);
        assert_eq!(r.market_odds, -150);
    }

    #[test]
    fn penalties_lower_probability() {
        let signals = AdjustmentSignals {
            injury_impact: 0.3,
            fatigue_impact: 0.2,
            travel_impact: 0.1,
            ..Default::default()
        };
        let r = evaluate(-110, &signals).unwrap();
        assert!(r.true_probability < r.market_probability);
        assert_eq!(r.safety_tier, SafetyTier::Risky);
    }

    #[test]
    fn pace_is_clamped_before_log() {
        let slow = AdjustmentSignals { pace_factor: 0.0, ..Default::default() };
        let floor = AdjustmentSignals { pace_factor: 0.8, ..Default::default() };
        let a = evaluate(100, &slow).unwrap();
        let b = evaluate(100, &floor).unwrap();
        assert_eq!(a.true_probability, b.true_probability);
        assert!(a.true_probability.is_finite());
    }

    #[test]
    fn extreme_signals_stay_inside_bounds() {
        let huge = AdjustmentSignals { matchup_edge: 1e6, ..Default::default() };
        let r = evaluate(-100000, &huge).unwrap();
        assert_eq!(r.true_probability, 0.999);
        let tiny = AdjustmentSignals { injury_impact: 1e6, ..Default::default() };
        let r = evaluate(100000, &tiny).unwrap();
        assert_eq!(r.true_probability, 0.001);
        assert!(r.fair_odds > 0);
    }

    #[test]
    fn non_finite_signal_is_rejected() {
        let bad = AdjustmentSignals { public_bias: f64::NAN, ..Default::default() };
        assert_eq!(
            evaluate(110, &bad),
            Err(EdgeError::InvalidSignal { name: "publicBias" })
        );
        assert!(matches!(
            evaluate(0, &AdjustmentSignals::default()),
            Err(EdgeError::InvalidOdds(_))
        ));
    }

    #[test]
    fn fatigue_and_travel_tables() {
        assert_eq!(fatigue_for_rest(None), 0.05);
        assert_eq!(fatigue_for_rest(Some(0)), 0.25);
        assert_eq!(fatigue_for_rest(Some(1)), 0.25);
        assert_eq!(fatigue_for_rest(Some(2)), 0.15);
        assert_eq!(fatigue_for_rest(Some(3)), 0.08);
        assert_eq!(fatigue_for_rest(Some(6)), 0.03);
        assert!((game_fatigue(Some(1), Some(5)) - 0.14).abs() < 1e-12);
        assert_eq!(travel_for_turnaround(Some(1)), 0.2);
        assert_eq!(travel_for_turnaround(Some(2)), 0.1);
        assert_eq!(travel_for_turnaround(Some(4)), 0.05);
    }

    #[test]
    fn public_bias_is_capped() {
        assert_eq!(public_bias_from_lines(Some(-12.0), Some(-800), Some(550)), 0.15);
        let small = public_bias_from_lines(Some(-1.0), Some(-120), Some(100));
        assert!((small - (1.0 / 12.0 + 220.0 / 8000.0)).abs() < 1e-12);
        assert_eq!(public_bias_from_lines(None, None, None), 0.0);
    }

    #[test]
    fn injury_impact_ignores_active() {
        let v = injury_impact_from_statuses(["out", "Active", "questionable"]);
        assert!((v - 0.04).abs() < 1e-12);
    }

    #[test]
    fn away_markets_flip_edge_and_bias() {
        let game = GameSignals {
            matchup_edge_home: 0.1,
            public_bias: 0.05,
            ..Default::default()
        };
        let odds = MarketQuote::new(-110).unwrap();
        let away = signals_for(&Market::Moneyline { side: Side::Away, odds }, &game);
        assert_eq!(away.matchup_edge, -0.1);
        assert_eq!(away.public_bias, -0.05);

        let spread = signals_for(
            &Market::Spread { side: Side::Home, line: -5.0, odds },
            &game,
        );
        assert!((spread.matchup_edge - 0.15).abs() < 1e-12);

        let under = signals_for(
            &Market::Total { side: TotalSide::Under, line: 220.0, odds },
            &GameSignals { injury_impact: 0.1, ..game },
        );
        assert!((under.pace_factor - 0.95).abs() < 1e-12);
        assert!((under.injury_impact - 0.05).abs() < 1e-12);
        assert_eq!(under.matchup_edge, -0.1);
    }
}
