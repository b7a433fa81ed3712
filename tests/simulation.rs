use std::fs;
use std::path::PathBuf;

use sgp_edge::EdgeError;
use sgp_edge::correlation::{CorrelationKey, CorrelationModel, PivotPolicy};
use sgp_edge::odds::{american_to_decimal, kelly_fraction};
use sgp_edge::projection::Direction;
use sgp_edge::simulation::{
    LegDistribution, MAX_ITERATIONS, SimulationLeg, SimulationOptions, SimulationRequest, simulate,
    simulate_request,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn leg(id: &str, entity: &str, quantity: &str, p: f64) -> SimulationLeg {
    let key = CorrelationKey::new(entity).with_team("BOS").with_quantity(quantity);
    SimulationLeg::from_probability(id, key, p).expect("valid probability")
}

fn options(seed: u64) -> SimulationOptions {
    SimulationOptions {
        iterations: 40_000,
        ..SimulationOptions::with_seed(seed)
    }
}

#[test]
fn correlated_legs_beat_independence() {
    // Same player, same stat: coefficient 0.8.
    let legs = [leg("a", "tatum", "points", 0.6), leg("b", "tatum", "points", 0.6)];
    let r = simulate(&legs, 200, &options(1)).unwrap();
    assert!(r.joint_prob <= 0.6 + 0.01, "joint {}", r.joint_prob);
    assert!(r.joint_prob > 0.42, "joint {}", r.joint_prob);
    for d in &r.legs {
        assert!((d.base_hit_prob - 0.6).abs() < 1e-6);
        assert!((d.simulated_hit_rate - 0.6).abs() < 0.015);
    }
}

#[test]
fn joint_never_exceeds_weakest_leg() {
    let legs = [
        leg("a", "tatum", "points", 0.7),
        leg("b", "tatum", "rebounds", 0.45),
        leg("c", "brown", "points", 0.8),
    ];
    let r = simulate(&legs, 600, &options(2)).unwrap();
    assert!(r.joint_prob <= 0.45 + 0.01);
    assert!(r.joint_prob > 0.7 * 0.45 * 0.8);
}

#[test]
fn same_seed_is_deterministic_across_thread_counts() {
    let legs = [
        leg("a", "tatum", "points", 0.55),
        leg("b", "brown", "assists", 0.62),
        leg("c", "white", "threes", 0.48),
    ];
    let single = SimulationOptions {
        threads: Some(1),
        ..options(77)
    };
    let many = SimulationOptions {
        threads: Some(4),
        ..options(77)
    };
    let a = simulate(&legs, 450, &single).unwrap();
    let b = simulate(&legs, 450, &many).unwrap();
    let c = simulate(&legs, 450, &options(77)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);

    let other = simulate(&legs, 450, &options(78)).unwrap();
    assert_ne!(a.joint_prob, other.joint_prob);
}

#[test]
fn single_leg_matches_its_marginal() {
    let legs = [leg("only", "tatum", "points", 0.55)];
    let r = simulate(&legs, -120, &options(3)).unwrap();
    assert!((r.joint_prob - 0.55).abs() < 0.01, "joint {}", r.joint_prob);

    let decimal = american_to_decimal(-120.0).unwrap();
    let expected_ev = (r.joint_prob * decimal - 1.0) * 100.0;
    assert!((r.ev_pct - expected_ev).abs() < 1e-9);
    assert_eq!(r.kelly_fraction, kelly_fraction(r.joint_prob, decimal, 0.5));
}

#[test]
fn impossible_leg_floors_joint_probability() {
    let legs = [leg("never", "tatum", "points", 0.0), leg("b", "brown", "points", 0.9)];
    let r = simulate(&legs, 500, &options(4)).unwrap();
    assert_eq!(r.joint_prob, 1e-6);
    assert!(r.fair_odds > 0);
    assert!(r.ev_pct.is_finite());
    assert_eq!(r.kelly_fraction, 0.0);
    assert_eq!(r.legs[0].simulated_hit_rate, 0.0);
}

#[test]
fn empty_and_invalid_inputs_are_errors() {
    assert_eq!(simulate(&[], 150, &options(5)), Err(EdgeError::EmptyLegSet));
    let legs = [leg("a", "tatum", "points", 0.5)];
    assert!(matches!(simulate(&legs, 0, &options(5)), Err(EdgeError::InvalidOdds(_))));
    assert!(SimulationLeg::from_probability("bad", CorrelationKey::new("x"), 1.5).is_err());
}

fn points_leg(id: &str, mean: f64, stdev: f64) -> SimulationLeg {
    let distribution = LegDistribution {
        projected_mean: mean,
        projected_stdev: stdev,
        line: 22.5,
        direction: Direction::Over,
    };
    SimulationLeg::new(id, CorrelationKey::new("tatum").with_quantity("points"), distribution)
}

#[test]
fn malformed_distributions_are_rejected() {
    let good = leg("a", "brown", "points", 0.5);
    for (bad, field) in [
        (points_leg("nan-mean", f64::NAN, 6.0), "projectedMean"),
        (points_leg("neg-stdev", 24.0, -6.0), "projectedStdev"),
        (points_leg("inf-stdev", 24.0, f64::INFINITY), "projectedStdev"),
    ] {
        let id = bad.id.clone();
        assert_eq!(
            simulate(&[good.clone(), bad], 300, &options(8)),
            Err(EdgeError::InvalidLeg { id, field })
        );
    }

    // Certain and impossible marginals put the line at infinity and still run.
    let edges = [leg("sure", "p1", "points", 1.0), leg("never", "p2", "points", 0.0)];
    assert!(simulate(&edges, 300, &options(8)).is_ok());
}

#[test]
fn request_rejects_negative_stdev() {
    let raw = r#"{
        "legs": [{"id": "x", "correlationKey": "tatum", "projectedMean": 24.0,
                  "projectedStdev": -1.0, "line": 22.5, "direction": "over"}],
        "offeredOdds": 120
    }"#;
    let request: SimulationRequest = serde_json::from_str(raw).unwrap();
    assert_eq!(
        simulate_request(request, &options(2)),
        Err(EdgeError::InvalidLeg {
            id: "x".to_string(),
            field: "projectedStdev",
        })
    );
}

#[test]
fn request_accepts_bare_string_correlation_key() {
    let raw = r#"{
        "legs": [
            {"id": "a", "correlationKey": "tatum", "marginalHitProbability": 0.55},
            {"id": "b", "correlationKey": {"entity": "tatum", "quantity": "rebounds"},
             "marginalHitProbability": 0.5}
        ],
        "offeredOdds": 260,
        "seed": 4
    }"#;
    let request: SimulationRequest = serde_json::from_str(raw).unwrap();
    assert_eq!(request.legs[0].correlation_key, CorrelationKey::new("tatum"));
    let r = simulate_request(request, &options(0)).unwrap();
    assert_eq!(r.legs.len(), 2);
}

#[test]
fn request_iterations_are_capped() {
    let raw = r#"{
        "legs": [{"id": "a", "correlationKey": "tatum", "marginalHitProbability": 1.0}],
        "offeredOdds": -110,
        "seed": 1,
        "iterations": 4000000000
    }"#;
    let request: SimulationRequest = serde_json::from_str(raw).unwrap();
    let wide = SimulationOptions {
        batch_size: 100_000,
        ..options(0)
    };
    let r = simulate_request(request, &wide).unwrap();
    assert_eq!(r.iterations, MAX_ITERATIONS);
    assert_eq!(r.joint_prob, 1.0);
}

#[test]
fn strict_policy_rejects_impossible_correlations() {
    let legs = [
        leg("a", "p1", "points", 0.5),
        leg("b", "p2", "points", 0.5),
        leg("c", "p3", "points", 0.5),
    ];
    // Three same-team players pairwise at -0.9 is not a valid correlation matrix.
    let model = CorrelationModel {
        same_team: -0.9,
        ..Default::default()
    };
    let strict = SimulationOptions {
        correlation: model,
        pivot_policy: PivotPolicy::Strict,
        ..options(6)
    };
    assert!(matches!(
        simulate(&legs, 500, &strict),
        Err(EdgeError::NonPositiveSemiDefinite { index: 2, .. })
    ));

    let clamped = SimulationOptions {
        pivot_policy: PivotPolicy::Clamp,
        ..strict
    };
    let r = simulate(&legs, 500, &clamped).unwrap();
    assert!(r.joint_prob >= 1e-6 && r.joint_prob <= 1.0);
}

#[test]
fn fixture_request_prices_a_parlay() {
    let request: SimulationRequest = serde_json::from_str(&read_fixture("sgp_request.json")).unwrap();
    let r = simulate_request(request.clone(), &SimulationOptions::with_seed(0)).unwrap();
    assert_eq!(r.seed, 20_250_110);
    assert_eq!(r.iterations, 20_000);
    assert_eq!(r.legs.len(), 4);
    assert_eq!(r.legs[2].id, "brown-pts-prob");
    assert!((r.legs[2].base_hit_prob - 0.55).abs() < 1e-6);

    let weakest = r
        .legs
        .iter()
        .map(|l| l.simulated_hit_rate)
        .fold(f64::INFINITY, f64::min);
    assert!(r.joint_prob <= weakest);

    let again = simulate_request(request, &SimulationOptions::with_seed(12345)).unwrap();
    assert_eq!(r, again);

    let json = serde_json::to_value(&r).unwrap();
    for key in ["jointProb", "fairOdds", "evPct", "kellyFraction", "legs", "iterations", "seed"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert!(json["legs"][0].get("baseHitProb").is_some());
}
