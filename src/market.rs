use serde::{Deserialize, Serialize};

use crate::odds::MarketQuote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalSide {
    Over,
    Under,
}

/// One priceable game market. Each kind carries only the fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Market {
    Moneyline {
        side: Side,
        odds: MarketQuote,
    },
    Spread {
        side: Side,
        line: f64,
        odds: MarketQuote,
    },
    Total {
        side: TotalSide,
        line: f64,
        odds: MarketQuote,
    },
}

impl Market {
    pub fn quote(&self) -> MarketQuote {
        match self {
            Market::Moneyline { odds, .. }
            | Market::Spread { odds, .. }
            | Market::Total { odds, .. } => *odds,
        }
    }

    pub fn line(&self) -> Option<f64> {
        match self {
            Market::Moneyline { .. } => None,
            Market::Spread { line, .. } | Market::Total { line, .. } => Some(*line),
        }
    }

    pub fn label(&self, home_abbr: &str, away_abbr: &str) -> String {
        let team = |side: &Side| match side {
            Side::Home => home_abbr,
            Side::Away => away_abbr,
        };
        match self {
            Market::Moneyline { side, .. } => format!("{} ML", team(side)),
            Market::Spread { side, line, .. } => format!("{} {}", team(side), signed_line(*line)),
            Market::Total { side: TotalSide::Over, line, .. } => format!("Over {line}"),
            Market::Total { side: TotalSide::Under, line, .. } => format!("Under {line}"),
        }
    }
}

fn signed_line(line: f64) -> String {
    if line > 0.0 {
        format!("+{line}")
    } else {
        format!("{line}")
    }
}

/// Latest odds row for a game as the odds feed stores it. Any column may be
/// missing; a zero price counts as missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsSnapshot {
    #[serde(default)]
    pub ml_home: Option<i32>,
    #[serde(default)]
    pub ml_away: Option<i32>,
    #[serde(default)]
    pub spread_home: Option<f64>,
    #[serde(default)]
    pub spread_home_odds: Option<i32>,
    #[serde(default)]
    pub spread_away: Option<f64>,
    #[serde(default)]
    pub spread_away_odds: Option<i32>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub over_odds: Option<i32>,
    #[serde(default)]
    pub under_odds: Option<i32>,
}

impl OddsSnapshot {
    /// Expand the row into the markets it actually prices, in display order:
    /// moneylines, spreads, then totals.
    pub fn markets(&self) -> Vec<Market> {
        let quote = |odds: Option<i32>| odds.and_then(|o| MarketQuote::new(o).ok());
        let mut out = Vec::with_capacity(6);

        if let Some(odds) = quote(self.ml_home) {
            out.push(Market::Moneyline { side: Side::Home, odds });
        }
        if let Some(odds) = quote(self.ml_away) {
            out.push(Market::Moneyline { side: Side::Away, odds });
        }
        if let (Some(line), Some(odds)) = (self.spread_home, quote(self.spread_home_odds)) {
            out.push(Market::Spread { side: Side::Home, line, odds });
        }
        if let (Some(line), Some(odds)) = (self.spread_away, quote(self.spread_away_odds)) {
            out.push(Market::Spread { side: Side::Away, line, odds });
        }
        if let Some(line) = self.total {
            if let Some(odds) = quote(self.over_odds) {
                out.push(Market::Total { side: TotalSide::Over, line, odds });
            }
            if let Some(odds) = quote(self.under_odds) {
                out.push(Market::Total { side: TotalSide::Under, line, odds });
            }
        }
        out
    }
}
