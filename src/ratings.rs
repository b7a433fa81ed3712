//! Player matchup ratings on a 0–99 scale.
//!
//! A context-free `base_overall` comes from per-stat baselines; `matchup_overall`
//! rescales it for one specific game (injury, rest, opponent defence) and is
//! recomputed every time, never stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EdgeError, Result};
use crate::math::{clamp, normalize_probability_weights, round_to};
use crate::projection::{StatBaseline, StatType};

const DEFAULT_REST_DAYS: i64 = 3;
const LEAGUE_POINTS_PER_GAME: f64 = 220.0;
const DEFAULT_USAGE: f64 = 0.18;
const DEFAULT_POINTS_STDEV: f64 = 1.5;
const DEFAULT_MINUTES: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InjuryStatus {
    Out,
    Doubtful,
    Questionable,
    Probable,
    Active,
    Unknown,
}

impl From<&str> for InjuryStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "out" => InjuryStatus::Out,
            "doubtful" => InjuryStatus::Doubtful,
            "questionable" => InjuryStatus::Questionable,
            "probable" => InjuryStatus::Probable,
            "active" | "available" => InjuryStatus::Active,
            _ => InjuryStatus::Unknown,
        }
    }
}

impl From<String> for InjuryStatus {
    fn from(raw: String) -> Self {
        InjuryStatus::from(raw.as_str())
    }
}

impl From<InjuryStatus> for String {
    fn from(status: InjuryStatus) -> Self {
        status.as_str().to_string()
    }
}

impl InjuryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjuryStatus::Out => "out",
            InjuryStatus::Doubtful => "doubtful",
            InjuryStatus::Questionable => "questionable",
            InjuryStatus::Probable => "probable",
            InjuryStatus::Active => "active",
            InjuryStatus::Unknown => "unknown",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            InjuryStatus::Out | InjuryStatus::Doubtful => 0.6,
            InjuryStatus::Questionable => 0.8,
            InjuryStatus::Probable => 0.95,
            InjuryStatus::Active | InjuryStatus::Unknown => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPlayer {
    pub player_id: u32,
    pub name: String,
    #[serde(default)]
    pub baselines: Vec<StatBaseline>,
    /// Most recent injury report, if any.
    #[serde(default)]
    pub injury_status: Option<InjuryStatus>,
}

impl RosterPlayer {
    fn baseline(&self, stat: StatType) -> Option<&StatBaseline> {
        self.baselines.iter().find(|b| b.stat == stat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRoster {
    pub team_id: u32,
    #[serde(default)]
    pub abbr: String,
    pub players: Vec<RosterPlayer>,
    /// Date of the team's previous game before the one being rated.
    #[serde(default)]
    pub previous_game: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentContext {
    pub team_id: u32,
    /// Combined points scored in the opponent's recent games.
    #[serde(default)]
    pub recent_game_points: Vec<f64>,
}

impl OpponentContext {
    /// Normalized points-conceded index in `[0.8, 1.2]`; 1.0 without data.
    pub fn defensive_index(&self) -> f64 {
        if self.recent_game_points.is_empty() {
            return 1.0;
        }
        let weights = normalize_probability_weights(&self.recent_game_points);
        let weighted: f64 = weights
            .iter()
            .zip(&self.recent_game_points)
            .map(|(w, pts)| w * pts)
            .sum();
        clamp(weighted / LEAGUE_POINTS_PER_GAME, 0.8, 1.2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRatingRecord {
    pub player_id: u32,
    pub player_name: String,
    pub base_overall: f64,
    pub matchup_overall: f64,
    pub offense: f64,
    pub defense: f64,
    pub playmaking: f64,
    pub usage: f64,
    pub fatigue: f64,
    pub volatility: f64,
}

/// Team-level inputs shared by every player in one matchup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchupContext {
    pub rest_days: i64,
    pub fatigue_penalty: f64,
    pub pace_adjustment: f64,
}

impl MatchupContext {
    pub fn new(previous_game: Option<NaiveDate>, game_date: NaiveDate, opponent: &OpponentContext) -> Self {
        let rest_days = rest_days(previous_game, game_date);
        Self {
            rest_days,
            fatigue_penalty: fatigue_penalty(rest_days),
            pace_adjustment: clamp(1.0 / opponent.defensive_index(), 0.85, 1.15),
        }
    }
}

/// Whole days between the previous game and this one; 3 when unknown.
pub fn rest_days(previous_game: Option<NaiveDate>, game_date: NaiveDate) -> i64 {
    match previous_game {
        Some(prev) => (game_date - prev).num_days().max(0),
        None => DEFAULT_REST_DAYS,
    }
}

pub fn fatigue_penalty(rest_days: i64) -> f64 {
    if rest_days <= 1 {
        0.2
    } else if rest_days == 2 {
        0.1
    } else {
        0.0
    }
}

/// Linear map of `[lo, hi]` onto `[40, 90]`, bounded to `[25, 99]`.
fn scale_to_rating(value: f64, lo: f64, hi: f64) -> f64 {
    if hi == lo {
        return 50.0;
    }
    clamp(40.0 + (value - lo) / (hi - lo) * 50.0, 25.0, 99.0)
}

pub fn rate_player(player: &RosterPlayer, ctx: &MatchupContext) -> Result<PlayerRatingRecord> {
    if player.baselines.is_empty() {
        return Err(EdgeError::MissingBaseline {
            player_id: player.player_id,
        });
    }

    let mean_of = |stat| player.baseline(stat).map(|b| b.mean).unwrap_or(0.0);
    let points = player.baseline(StatType::Points);

    let offense = scale_to_rating(mean_of(StatType::Points), 5.0, 35.0);
    let playmaking = scale_to_rating(mean_of(StatType::Assists), 1.0, 12.0);
    let rebounding = scale_to_rating(mean_of(StatType::Rebounds), 2.0, 16.0);
    // No defensive box-score stats here, so rebounding stands in, inverted.
    let defense = clamp(100.0 - rebounding * 0.6, 40.0, 95.0);

    let base_overall = clamp(
        offense * 0.45 + defense * 0.2 + playmaking * 0.2 + rebounding * 0.15,
        30.0,
        99.0,
    );

    let injury_factor = player
        .injury_status
        .map(|s| s.multiplier())
        .unwrap_or(1.0);
    let matchup_overall = clamp(
        base_overall * injury_factor * (1.0 - ctx.fatigue_penalty) * ctx.pace_adjustment,
        20.0,
        99.0,
    );

    let usage_rate = points.and_then(|b| b.usage_rate).unwrap_or(DEFAULT_USAGE);
    let minutes = points.and_then(|b| b.minutes).unwrap_or(DEFAULT_MINUTES);
    let stdev = points.map(|b| b.stdev).unwrap_or(DEFAULT_POINTS_STDEV);

    Ok(PlayerRatingRecord {
        player_id: player.player_id,
        player_name: player.name.clone(),
        base_overall: round_to(base_overall, 1),
        matchup_overall: round_to(matchup_overall, 1),
        offense: round_to(offense, 1),
        defense: round_to(defense, 1),
        playmaking: round_to(playmaking, 1),
        usage: round_to(usage_rate.clamp(0.0, 1.0), 3),
        fatigue: round_to(1.0 - (ctx.rest_days as f64 / 4.0).min(1.0), 3),
        volatility: round_to(clamp(stdev / minutes.max(1.0), 0.1, 0.8), 3),
    })
}

/// Rate every player with baseline data, best matchup first. Players without
/// any baseline are left out rather than rated at zero.
pub fn build_ratings(
    team: &TeamRoster,
    opponent: &OpponentContext,
    game_date: NaiveDate,
) -> Vec<PlayerRatingRecord> {
    let ctx = MatchupContext::new(team.previous_game, game_date, opponent);

    let mut skipped = 0usize;
    let mut ratings: Vec<PlayerRatingRecord> = team
        .players
        .iter()
        .filter_map(|p| match rate_player(p, &ctx) {
            Ok(r) => Some(r),
            Err(err) => {
                warn!(player_id = p.player_id, name = %p.name, %err, "skipping player");
                skipped += 1;
                None
            }
        })
        .collect();

    ratings.sort_by(|a, b| {
        b.matchup_overall
            .total_cmp(&a.matchup_overall)
            .then(a.player_id.cmp(&b.player_id))
    });

    debug!(
        team_id = team.team_id,
        opponent_id = opponent.team_id,
        rated = ratings.len(),
        skipped,
        rest_days = ctx.rest_days,
        "built matchup ratings"
    );
    ratings
}

/// Both sides of one game, rated against each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingsRequest {
    pub game_date: NaiveDate,
    pub home: TeamRoster,
    pub away: TeamRoster,
    #[serde(default)]
    pub home_recent_points: Vec<f64>,
    #[serde(default)]
    pub away_recent_points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupRatings {
    pub home: Vec<PlayerRatingRecord>,
    pub away: Vec<PlayerRatingRecord>,
    pub matchup_edge_home: f64,
}

pub fn rate_matchup(req: &RatingsRequest) -> MatchupRatings {
    let home_opponent = OpponentContext {
        team_id: req.away.team_id,
        recent_game_points: req.away_recent_points.clone(),
    };
    let away_opponent = OpponentContext {
        team_id: req.home.team_id,
        recent_game_points: req.home_recent_points.clone(),
    };
    let home = build_ratings(&req.home, &home_opponent, req.game_date);
    let away = build_ratings(&req.away, &away_opponent, req.game_date);
    let matchup_edge_home = round_to(matchup_edge(&home, &away), 4);
    MatchupRatings {
        home,
        away,
        matchup_edge_home,
    }
}

/// Home-oriented team edge: difference of average matchup ratings over 100.
pub fn matchup_edge(home: &[PlayerRatingRecord], away: &[PlayerRatingRecord]) -> f64 {
    let avg = |rows: &[PlayerRatingRecord]| {
        if rows.is_empty() {
            0.0
        } else {
            rows.iter().map(|r| r.matchup_overall).sum::<f64>() / rows.len() as f64
        }
    };
    (avg(home) - avg(away)) / 100.0
}
