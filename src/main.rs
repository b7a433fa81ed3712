use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sgp_edge::config::ModelConfig;
use sgp_edge::edge::{self, EdgeRequest, GameMarketsRequest};
use sgp_edge::ratings::{self, RatingsRequest};
use sgp_edge::simulation::{self, SimulationRequest};

const USAGE: &str = "usage: sgp_edge <simulate|evaluate|ratings> <input.json>";

/// `evaluate` accepts a whole game's odds row or a single priced market.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EvaluateInput {
    Game(GameMarketsRequest),
    Single(EdgeRequest),
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    // stdout carries the JSON answer; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let (Some(command), Some(input)) = (args.next(), args.next().map(PathBuf::from)) else {
        bail!(USAGE);
    };

    let output = match command.as_str() {
        "simulate" => run_simulate(&input)?,
        "evaluate" => run_evaluate(&input)?,
        "ratings" => run_ratings(&input)?,
        other => bail!("unknown command `{other}`\n{USAGE}"),
    };
    println!("{output}");
    Ok(())
}

fn load_config() -> Result<ModelConfig> {
    match env::var("SGP_CONFIG") {
        Ok(path) if !path.trim().is_empty() => ModelConfig::from_file(path.trim()),
        _ => Ok(ModelConfig::from_env()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn run_simulate(path: &Path) -> Result<String> {
    let config = load_config()?;
    let request: SimulationRequest = read_json(path)?;
    let seed = request.seed.unwrap_or_else(rand::random);
    info!(
        legs = request.legs.len(),
        offered_odds = request.offered_odds,
        seed,
        iterations = request.iterations.unwrap_or(config.iterations),
        "simulating parlay"
    );
    let result = simulation::simulate_request(request, &config.simulation_options(seed))?;
    Ok(serde_json::to_string_pretty(&result)?)
}

fn run_evaluate(path: &Path) -> Result<String> {
    let input: EvaluateInput = read_json(path)?;
    let json = match input {
        EvaluateInput::Game(game) => {
            let rows = edge::evaluate_game(&game)?;
            info!(home = %game.home, away = %game.away, markets = rows.len(), "evaluated game");
            serde_json::to_string_pretty(&rows)?
        }
        EvaluateInput::Single(req) => serde_json::to_string_pretty(&edge::evaluate_request(&req)?)?,
    };
    Ok(json)
}

fn run_ratings(path: &Path) -> Result<String> {
    let request: RatingsRequest = read_json(path)?;
    let rated = ratings::rate_matchup(&request);
    info!(
        home = rated.home.len(),
        away = rated.away.len(),
        edge = rated.matchup_edge_home,
        "rated matchup"
    );
    Ok(serde_json::to_string_pretty(&rated)?)
}
