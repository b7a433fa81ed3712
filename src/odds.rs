use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};

/// Highest probability we ever price. Keeps fair odds finite when a model or a
/// simulation lands on exactly 1.
pub const MAX_PRICED_PROBABILITY: f64 = 0.999;

/// A single offered price in American format. Zero means "unset" and is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct MarketQuote {
    american_odds: i32,
}

impl MarketQuote {
    pub fn new(american_odds: i32) -> Result<Self> {
        if american_odds == 0 {
            return Err(EdgeError::InvalidOdds("american odds of 0".to_string()));
        }
        Ok(Self { american_odds })
    }

    pub fn american_odds(&self) -> i32 {
        self.american_odds
    }

    pub fn decimal_odds(&self) -> f64 {
        // Construction guarantees non-zero, so the conversion cannot fail.
        american_to_decimal(self.american_odds as f64).unwrap_or(1.0)
    }

    pub fn implied_probability(&self) -> f64 {
        implied_probability(self.american_odds as f64).unwrap_or(0.5)
    }
}

impl TryFrom<i32> for MarketQuote {
    type Error = EdgeError;

    fn try_from(value: i32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MarketQuote> for i32 {
    fn from(quote: MarketQuote) -> Self {
        quote.american_odds
    }
}

fn check_american(odds: f64) -> Result<()> {
    if !odds.is_finite() {
        return Err(EdgeError::InvalidOdds(format!("american odds {odds} is not finite")));
    }
    if odds == 0.0 {
        return Err(EdgeError::InvalidOdds("american odds of 0".to_string()));
    }
    Ok(())
}

pub fn american_to_decimal(odds: f64) -> Result<f64> {
    check_american(odds)?;
    Ok(if odds > 0.0 {
        1.0 + odds / 100.0
    } else {
        1.0 + 100.0 / odds.abs()
    })
}

pub fn decimal_to_american(decimal: f64) -> Result<i32> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return Err(EdgeError::InvalidOdds(format!(
            "decimal odds must be finite and greater than 1, got {decimal}"
        )));
    }
    let american = if decimal >= 2.0 {
        ((decimal - 1.0) * 100.0).round()
    } else {
        (-100.0 / (decimal - 1.0)).round()
    };
    if american < i32::MIN as f64 || american > i32::MAX as f64 {
        return Err(EdgeError::InvalidOdds(format!(
            "decimal odds {decimal} have no american equivalent in range"
        )));
    }
    Ok(american as i32)
}

pub fn implied_probability(odds: f64) -> Result<f64> {
    check_american(odds)?;
    Ok(if odds > 0.0 {
        100.0 / (odds + 100.0)
    } else {
        odds.abs() / (odds.abs() + 100.0)
    })
}

/// Fractional Kelly stake as a share of bankroll, in `[0, 1]`.
///
/// Degenerate prices (`decimal_odds <= 1`) and negative-edge bets size to zero.
pub fn kelly_fraction(true_prob: f64, decimal_odds: f64, kelly_share: f64) -> f64 {
    if !decimal_odds.is_finite() || decimal_odds <= 1.0 || !true_prob.is_finite() {
        return 0.0;
    }
    let edge = true_prob * decimal_odds - 1.0;
    let fraction = edge / (decimal_odds - 1.0);
    if fraction <= 0.0 {
        return 0.0;
    }
    let share = if kelly_share.is_finite() {
        kelly_share.clamp(0.0, 1.0)
    } else {
        0.0
    };
    fraction.clamp(0.0, 1.0) * share
}

/// Expected profit per unit staked, in percent.
pub fn ev_percent(true_prob: f64, american_odds: f64) -> Result<f64> {
    let decimal = american_to_decimal(american_odds)?;
    Ok((true_prob * decimal - 1.0) * 100.0)
}

/// Fair American price for `prob`, capped at [`MAX_PRICED_PROBABILITY`].
pub fn fair_american_odds(prob: f64) -> Result<i32> {
    if !prob.is_finite() || prob <= 0.0 {
        return Err(EdgeError::DomainError(prob));
    }
    decimal_to_american(1.0 / prob.min(MAX_PRICED_PROBABILITY))
}

/// Proportional de-vig of a two-way market. Returns the fair probabilities of
/// both sides and the book's overround (sum of implied probabilities minus 1).
pub fn remove_vig_two_way(side_a: f64, side_b: f64) -> Result<(f64, f64, f64)> {
    let pa = implied_probability(side_a)?;
    let pb = implied_probability(side_b)?;
    let sum = pa + pb;
    Ok((pa / sum, pb / sum, sum - 1.0))
}
