//! Correlated same-game parlay pricing by Monte Carlo.
//!
//! Every leg is a normal distribution compared against a line. Legs are tied
//! together with a Gaussian copula: independent standard normals are mixed
//! through the Cholesky factor of the pairwise correlation matrix, then each
//! leg's value is `mean + stdev * y[i]`. A trial hits when every leg hits.
//!
//! Trials are split into fixed-size batches, each with its own RNG seeded
//! from `(seed, batch index)`. Batches run on rayon and only integer hit
//! counts are merged, so a given seed produces the same result on any number
//! of threads.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::correlation::{CorrelationKey, CorrelationModel, PivotPolicy, cholesky, correlation_matrix};
use crate::error::{EdgeError, Result};
use crate::math::inverse_normal;
use crate::odds::{american_to_decimal, ev_percent, fair_american_odds, kelly_fraction};
use crate::projection::{Direction, Projection, hit_probability};

/// Floor for the reported joint probability so odds stay finite.
pub const MIN_JOINT_PROBABILITY: f64 = 1e-6;

pub const DEFAULT_ITERATIONS: u32 = 20_000;
/// Upper bound on trials per run, including request overrides.
pub const MAX_ITERATIONS: u32 = 1_000_000;
pub const DEFAULT_BATCH_SIZE: u32 = 2_500;
pub const DEFAULT_KELLY_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegDistribution {
    pub projected_mean: f64,
    pub projected_stdev: f64,
    pub line: f64,
    pub direction: Direction,
}

impl LegDistribution {
    /// Standard normal under an inverse-CDF line, so the leg hits with
    /// probability `p`. `p` of 0 or 1 puts the line at -inf / +inf.
    pub fn from_probability(p: f64) -> Result<Self> {
        Ok(Self {
            projected_mean: 0.0,
            projected_stdev: 1.0,
            line: inverse_normal(p)?,
            direction: Direction::Under,
        })
    }

    /// Name of the first field that cannot be simulated, if any. The line
    /// may be infinite so certain and impossible legs stay expressible.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if !self.projected_mean.is_finite() {
            Some("projectedMean")
        } else if !self.projected_stdev.is_finite() || self.projected_stdev < 0.0 {
            Some("projectedStdev")
        } else if self.line.is_nan() {
            Some("line")
        } else {
            None
        }
    }

    pub fn base_hit_probability(&self) -> f64 {
        let projection = Projection {
            mean: self.projected_mean,
            stdev: self.projected_stdev,
        };
        hit_probability(&projection, self.line, self.direction)
    }

    fn hits(&self, y: f64) -> bool {
        let value = if self.projected_stdev > 0.0 {
            self.projected_mean + self.projected_stdev * y
        } else {
            self.projected_mean
        };
        match self.direction {
            Direction::Over => value >= self.line,
            Direction::Under => value <= self.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationLeg {
    pub id: String,
    pub correlation_key: CorrelationKey,
    pub distribution: LegDistribution,
}

impl SimulationLeg {
    pub fn new(id: impl Into<String>, correlation_key: CorrelationKey, distribution: LegDistribution) -> Self {
        Self {
            id: id.into(),
            correlation_key,
            distribution,
        }
    }

    pub fn from_probability(id: impl Into<String>, correlation_key: CorrelationKey, p: f64) -> Result<Self> {
        Ok(Self::new(id, correlation_key, LegDistribution::from_probability(p)?))
    }

    pub fn validate(&self) -> Result<()> {
        match self.distribution.invalid_field() {
            Some(field) => Err(EdgeError::InvalidLeg {
                id: self.id.clone(),
                field,
            }),
            None => Ok(()),
        }
    }
}

/// A leg as it arrives over the wire: either a full distribution or just a
/// marginal hit probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegInput {
    pub id: String,
    pub correlation_key: CorrelationKey,
    #[serde(flatten)]
    pub shape: LegShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegShape {
    Distribution(LegDistribution),
    Probability {
        #[serde(rename = "marginalHitProbability")]
        marginal_hit_probability: f64,
    },
}

impl TryFrom<LegInput> for SimulationLeg {
    type Error = EdgeError;

    fn try_from(wire: LegInput) -> Result<Self> {
        match wire.shape {
            LegShape::Distribution(distribution) => {
                let leg = SimulationLeg::new(wire.id, wire.correlation_key, distribution);
                leg.validate()?;
                Ok(leg)
            }
            LegShape::Probability {
                marginal_hit_probability,
            } => SimulationLeg::from_probability(wire.id, wire.correlation_key, marginal_hit_probability),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub legs: Vec<LegInput>,
    pub offered_odds: i32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub iterations: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOptions {
    pub iterations: u32,
    pub seed: u64,
    pub kelly_share: f64,
    pub correlation: CorrelationModel,
    pub pivot_policy: PivotPolicy,
    pub batch_size: u32,
    /// Size of a dedicated rayon pool; `None` uses the global pool.
    pub threads: Option<usize>,
}

impl SimulationOptions {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            seed,
            kelly_share: DEFAULT_KELLY_SHARE,
            correlation: CorrelationModel::default(),
            pivot_policy: PivotPolicy::Clamp,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegDiagnostic {
    pub id: String,
    pub base_hit_prob: f64,
    pub simulated_hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub joint_prob: f64,
    pub fair_odds: i32,
    pub ev_pct: f64,
    pub kelly_fraction: f64,
    pub legs: Vec<LegDiagnostic>,
    pub iterations: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Default)]
struct HitCounts {
    joint: u64,
    per_leg: Vec<u64>,
}

impl HitCounts {
    fn zeroed(legs: usize) -> Self {
        Self {
            joint: 0,
            per_leg: vec![0; legs],
        }
    }

    fn merge(mut self, other: HitCounts) -> HitCounts {
        self.joint += other.joint;
        for (acc, v) in self.per_leg.iter_mut().zip(other.per_leg) {
            *acc += v;
        }
        self
    }
}

/// Box–Muller pairs from uniform draws; the second value of each pair is kept
/// for the next call.
struct NormalSampler {
    rng: StdRng,
    spare: Option<f64>,
}

impl NormalSampler {
    fn new(rng: StdRng) -> Self {
        Self { rng, spare: None }
    }

    fn sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = std::f64::consts::TAU * u2;
        self.spare = Some(r * theta.sin());
        r * theta.cos()
    }
}

fn batch_seed(seed: u64, batch: u64) -> u64 {
    seed ^ batch.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn run_batch(
    legs: &[SimulationLeg],
    factor: &[Vec<f64>],
    trials: u32,
    seed: u64,
) -> HitCounts {
    let n = legs.len();
    let mut sampler = NormalSampler::new(StdRng::seed_from_u64(seed));
    let mut counts = HitCounts::zeroed(n);
    let mut z = vec![0.0; n];

    for _ in 0..trials {
        for zi in z.iter_mut() {
            *zi = sampler.sample();
        }
        let mut all_hit = true;
        for (i, leg) in legs.iter().enumerate() {
            let y: f64 = factor[i][..=i].iter().zip(&z).map(|(l, zk)| l * zk).sum();
            if leg.distribution.hits(y) {
                counts.per_leg[i] += 1;
            } else {
                all_hit = false;
            }
        }
        if all_hit {
            counts.joint += 1;
        }
    }
    counts
}

static POOLS: Lazy<Mutex<HashMap<usize, Arc<rayon::ThreadPool>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// One dedicated pool per thread count, built on first use.
fn cached_pool(threads: usize) -> Option<Arc<rayon::ThreadPool>> {
    let mut pools = POOLS.lock().ok()?;
    if let Some(pool) = pools.get(&threads) {
        return Some(Arc::clone(pool));
    }
    let pool = Arc::new(rayon::ThreadPoolBuilder::new().num_threads(threads).build().ok()?);
    pools.insert(threads, Arc::clone(&pool));
    Some(pool)
}

fn with_pool<T: Send>(threads: Option<usize>, action: impl FnOnce() -> T + Send) -> T {
    match threads.and_then(cached_pool) {
        Some(pool) => pool.install(action),
        None => action(),
    }
}

pub fn simulate(
    legs: &[SimulationLeg],
    offered_odds: i32,
    options: &SimulationOptions,
) -> Result<SimulationResult> {
    if legs.is_empty() {
        return Err(EdgeError::EmptyLegSet);
    }
    for leg in legs {
        leg.validate()?;
    }
    let decimal = american_to_decimal(offered_odds as f64)?;
    if options.iterations == 0 {
        return Err(EdgeError::InvalidConfig("iterations must be at least 1".to_string()));
    }
    if options.batch_size == 0 {
        return Err(EdgeError::InvalidConfig("batch size must be at least 1".to_string()));
    }

    let keys: Vec<&CorrelationKey> = legs.iter().map(|l| &l.correlation_key).collect();
    let matrix = correlation_matrix(&keys, &options.correlation);
    let factor = cholesky(&matrix, options.pivot_policy)?;

    let iterations = options.iterations;
    let batch_size = options.batch_size;
    let batches = iterations.div_ceil(batch_size);

    let counts = with_pool(options.threads, || {
        (0..batches)
            .into_par_iter()
            .map(|b| {
                let trials = batch_size.min(iterations - b * batch_size);
                run_batch(legs, &factor, trials, batch_seed(options.seed, b as u64))
            })
            .reduce(|| HitCounts::zeroed(legs.len()), HitCounts::merge)
    });

    let total = iterations as f64;
    let joint_prob = (counts.joint as f64 / total).max(MIN_JOINT_PROBABILITY);
    let fair_odds = fair_american_odds(joint_prob)?;
    let ev_pct = ev_percent(joint_prob, offered_odds as f64)?;
    let kelly = kelly_fraction(joint_prob, decimal, options.kelly_share);

    let diagnostics = legs
        .iter()
        .zip(&counts.per_leg)
        .map(|(leg, hits)| LegDiagnostic {
            id: leg.id.clone(),
            base_hit_prob: leg.distribution.base_hit_probability(),
            simulated_hit_rate: *hits as f64 / total,
        })
        .collect();

    debug!(
        legs = legs.len(),
        iterations,
        batches,
        seed = options.seed,
        joint_prob,
        ev_pct,
        "simulated parlay"
    );

    Ok(SimulationResult {
        joint_prob,
        fair_odds,
        ev_pct,
        kelly_fraction: kelly,
        legs: diagnostics,
        iterations,
        seed: options.seed,
    })
}

/// Resolve wire legs and apply the request's seed/iteration overrides. The
/// iteration override is capped at [`MAX_ITERATIONS`].
pub fn simulate_request(request: SimulationRequest, options: &SimulationOptions) -> Result<SimulationResult> {
    let legs = request
        .legs
        .into_iter()
        .map(SimulationLeg::try_from)
        .collect::<Result<Vec<_>>>()?;
    let mut options = *options;
    if let Some(seed) = request.seed {
        options.seed = seed;
    }
    if let Some(iterations) = request.iterations {
        options.iterations = iterations.min(MAX_ITERATIONS);
    }
    simulate(&legs, request.offered_odds, &options)
}
