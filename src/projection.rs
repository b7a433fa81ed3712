use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};
use crate::math::{clamp, mean, normal_cdf, sample_stdev};

const HISTORY_WINDOW: usize = 20;
const LEAGUE_AVG_PACE: f64 = 99.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Points,
    Rebounds,
    Assists,
    Threes,
    Pra,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatType::Points => "points",
            StatType::Rebounds => "rebounds",
            StatType::Assists => "assists",
            StatType::Threes => "threes",
            StatType::Pra => "pra",
        }
    }

    fn extract(&self, row: &GameStatLine) -> f64 {
        match self {
            StatType::Points => row.points,
            StatType::Rebounds => row.rebounds,
            StatType::Assists => row.assists,
            StatType::Threes => row.threes,
            StatType::Pra => row.points + row.rebounds + row.assists,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Over,
    Under,
}

/// One player's box-score line from a past game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStatLine {
    pub minutes: f64,
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    #[serde(default)]
    pub threes: f64,
}

/// Historical distribution of one stat for one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatBaseline {
    pub stat: StatType,
    pub mean: f64,
    pub stdev: f64,
    #[serde(default)]
    pub minutes: Option<f64>,
    #[serde(default)]
    pub usage_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub mean: f64,
    pub stdev: f64,
}

/// Build a baseline from the most recent games (newest first, at most 20 used).
pub fn baseline_from_history(
    player_id: u32,
    stat: StatType,
    games: &[GameStatLine],
) -> Result<StatBaseline> {
    let recent = &games[..games.len().min(HISTORY_WINDOW)];
    if recent.is_empty() {
        return Err(EdgeError::MissingBaseline { player_id });
    }

    let samples: Vec<f64> = recent.iter().map(|g| stat.extract(g)).collect();
    let minutes: Vec<f64> = recent.iter().map(|g| g.minutes).collect();

    let m = mean(&samples);
    let avg_minutes = mean(&minutes);
    let usage_rate = if avg_minutes > 0.0 { m / avg_minutes } else { 0.0 };

    Ok(StatBaseline {
        stat,
        mean: m,
        stdev: sample_stdev(&samples, m),
        minutes: Some(avg_minutes),
        usage_rate: Some(usage_rate),
    })
}

/// Per-game context multipliers keyed by team abbreviation or player name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameContext {
    pub pace_factor: f64,
    pub blowout_risk: f64,
    #[serde(default)]
    pub team_injury_impact: HashMap<String, f64>,
    #[serde(default)]
    pub matchup_difficulty: HashMap<String, f64>,
    #[serde(default)]
    pub rest_days: HashMap<String, i64>,
    #[serde(default)]
    pub travel_penalty: HashMap<String, f64>,
}

impl Default for GameContext {
    fn default() -> Self {
        Self {
            pace_factor: 1.0,
            blowout_risk: blowout_risk(0.0),
            team_injury_impact: HashMap::new(),
            matchup_difficulty: HashMap::new(),
            rest_days: HashMap::new(),
            travel_penalty: HashMap::new(),
        }
    }
}

/// Bigger spreads mean more garbage time for starters.
pub fn blowout_risk(spread_home: f64) -> f64 {
    clamp(spread_home.abs() / 20.0, 0.05, 0.35)
}

/// Pace relative to league average from recent per-game pace estimates.
pub fn pace_factor_from_recent(recent_paces: &[f64]) -> f64 {
    let avg = if recent_paces.is_empty() {
        LEAGUE_AVG_PACE
    } else {
        mean(recent_paces)
    };
    clamp(avg / LEAGUE_AVG_PACE, 0.8, 1.2)
}

/// Per-game pace estimate: points per player-minute scaled to a 240-minute game.
pub fn pace_from_box_score(lines: &[GameStatLine]) -> Option<f64> {
    let minutes: f64 = lines.iter().map(|l| l.minutes).sum();
    if minutes <= 0.0 {
        return None;
    }
    let points: f64 = lines.iter().map(|l| l.points).sum();
    Some(points / minutes * 240.0)
}

/// 0.03 per player listed out or doubtful.
pub fn team_injury_impact(out_or_doubtful: usize) -> f64 {
    out_or_doubtful as f64 * 0.03
}

pub fn adjust_projection(
    mean: f64,
    stdev: f64,
    team_abbr: &str,
    player_name: &str,
    ctx: &GameContext,
) -> Projection {
    let mut m = mean * ctx.pace_factor;
    m *= 1.0 + ctx.team_injury_impact.get(team_abbr).copied().unwrap_or(0.0);
    m *= ctx.matchup_difficulty.get(player_name).copied().unwrap_or(1.0);
    if ctx.rest_days.get(team_abbr).is_some_and(|d| *d <= 1) {
        m *= 0.97;
    }
    m *= 1.0 + ctx.travel_penalty.get(team_abbr).copied().unwrap_or(0.0);
    m *= 1.0 - ctx.blowout_risk * 0.25;

    let s = stdev * (1.0 + 0.15 * ctx.blowout_risk);
    Projection {
        mean: m,
        stdev: s.max(0.5),
    }
}

pub fn project_from_baseline(
    baseline: &StatBaseline,
    team_abbr: &str,
    player_name: &str,
    ctx: &GameContext,
) -> Projection {
    adjust_projection(baseline.mean, baseline.stdev, team_abbr, player_name, ctx)
}

/// Shift a baseline by the player's matchup rating (60 is neutral) and game pace.
pub fn rating_adjusted_projection(baseline: &StatBaseline, matchup_rating: f64, pace: f64) -> Projection {
    let adj = (matchup_rating - 60.0) / 100.0;
    Projection {
        mean: baseline.mean * (1.0 + adj) * pace,
        stdev: clamp(baseline.stdev * (1.0 + adj.abs()), 0.5, 12.0),
    }
}

/// Closed-form probability that the stat lands on the `direction` side of `line`.
///
/// A zero stdev is a point mass at the mean; landing exactly on the line counts
/// as a hit for either direction.
pub fn hit_probability(projection: &Projection, line: f64, direction: Direction) -> f64 {
    if projection.stdev <= 0.0 {
        let hit = match direction {
            Direction::Over => projection.mean >= line,
            Direction::Under => projection.mean <= line,
        };
        return if hit { 1.0 } else { 0.0 };
    }
    let p_under = normal_cdf((line - projection.mean) / projection.stdev);
    match direction {
        Direction::Over => 1.0 - p_under,
        Direction::Under => p_under,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(minutes: f64, points: f64, rebounds: f64, assists: f64) -> GameStatLine {
        GameStatLine {
            minutes,
            points,
            rebounds,
            assists,
            threes: 0.0,
        }
    }

    #[test]
    fn baseline_requires_history() {
        assert_eq!(
            baseline_from_history(7, StatType::Points, &[]),
            Err(EdgeError::MissingBaseline { player_id: 7 })
        );
    }

    #[test]
    fn baseline_uses_pra_sum_and_window() {
        let mut games = vec![line(30.0, 20.0, 5.0, 5.0); 20];
        // Older games beyond the window must be ignored.
        games.extend(vec![line(10.0, 0.0, 0.0, 0.0); 5]);
        let b = baseline_from_history(1, StatType::Pra, &games).unwrap();
        assert!((b.mean - 30.0).abs() < 1e-12);
        assert!((b.stdev - 0.1).abs() < 1e-12);
        assert_eq!(b.minutes, Some(30.0));
        assert_eq!(b.usage_rate, Some(1.0));
    }

    #[test]
    fn context_adjustments_compound() {
        let mut ctx = GameContext {
            pace_factor: 1.1,
            blowout_risk: 0.2,
            ..Default::default()
        };
        ctx.rest_days.insert("BOS".to_string(), 1);
        ctx.team_injury_impact.insert("BOS".to_string(), 0.06);
        let p = adjust_projection(20.0, 4.0, "BOS", "Someone", &ctx);
        let expected = 20.0 * 1.1 * 1.06 * 0.97 * (1.0 - 0.05);
        assert!((p.mean - expected).abs() < 1e-9);
        assert!((p.stdev - 4.0 * 1.03).abs() < 1e-9);

        let other = adjust_projection(20.0, 0.1, "NYK", "Someone", &ctx);
        assert!((other.mean - 20.0 * 1.1 * 0.95).abs() < 1e-9);
        assert_eq!(other.stdev, 0.5);
    }

    #[test]
    fn rating_adjustment_is_neutral_at_sixty() {
        let b = StatBaseline {
            stat: StatType::Points,
            mean: 22.0,
            stdev: 5.0,
            minutes: None,
            usage_rate: None,
        };
        let p = rating_adjusted_projection(&b, 60.0, 1.0);
        assert_eq!(p.mean, 22.0);
        assert_eq!(p.stdev, 5.0);
        let hot = rating_adjusted_projection(&b, 80.0, 1.0);
        assert!((hot.mean - 26.4).abs() < 1e-9);
        assert!((hot.stdev - 6.0).abs() < 1e-9);
    }

    #[test]
    fn hit_probability_sides_are_complementary() {
        let p = Projection { mean: 24.0, stdev: 6.0 };
        let over = hit_probability(&p, 22.5, Direction::Over);
        let under = hit_probability(&p, 22.5, Direction::Under);
        assert!((over + under - 1.0).abs() < 1e-12);
        assert!(over > 0.5);

        let point = Projection { mean: 10.0, stdev: 0.0 };
        assert_eq!(hit_probability(&point, 10.0, Direction::Over), 1.0);
        assert_eq!(hit_probability(&point, 10.5, Direction::Over), 0.0);
    }

    #[test]
    fn blowout_and_pace_are_bounded() {
        assert_eq!(blowout_risk(0.0), 0.05);
        assert_eq!(blowout_risk(-14.0), 0.35);
        assert_eq!(pace_factor_from_recent(&[]), 1.0);
        assert_eq!(pace_factor_from_recent(&[150.0]), 1.2);
        let pace = pace_from_box_score(&[line(240.0, 110.0, 0.0, 0.0)]).unwrap();
        assert!((pace - 110.0).abs() < 1e-12);
        assert!(pace_from_box_score(&[]).is_none());
    }
}
