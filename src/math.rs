//! Numeric primitives shared by the edge evaluator, rating engine and simulator.
//!
//! Everything here is total: out-of-domain inputs come back as
//! [`EdgeError::DomainError`] instead of leaking NaN/Infinity downstream.

use crate::error::{EdgeError, Result};

pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Log-odds of `p`. Callers clamp first; exact 0/1 are rejected.
pub fn logit(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(EdgeError::DomainError(p));
    }
    Ok((p / (1.0 - p)).ln())
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Abramowitz & Stegun 7.1.26 (max abs error ~1.5e-7).
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let ax = x.abs();
    let t = 1.0 / (1.0 + P * ax);
    let y = 1.0 - (((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-ax * ax).exp());
    sign * y
}

pub fn normal_cdf(z: f64) -> f64 {
    if z == f64::INFINITY {
        return 1.0;
    }
    if z == f64::NEG_INFINITY {
        return 0.0;
    }
    clamp(0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2)), 0.0, 1.0)
}

/// Standard-normal quantile (Acklam's rational approximation).
///
/// Exact bounds map to `-inf` / `+inf`; anything outside `[0, 1]` is a domain error.
pub fn inverse_normal(p: f64) -> Result<f64> {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return Err(EdgeError::DomainError(p));
    }
    if p == 0.0 {
        return Ok(f64::NEG_INFINITY);
    }
    if p == 1.0 {
        return Ok(f64::INFINITY);
    }

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        return Ok(tail(q));
    }
    if p > P_HIGH {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        return Ok(-tail(q));
    }

    let q = p - 0.5;
    let r = q * q;
    Ok(
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0),
    )
}

/// Negative entries count as zero; an all-zero vector becomes uniform.
pub fn normalize_probability_weights(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let cleaned: Vec<f64> = values.iter().map(|v| v.max(0.0)).collect();
    let total: f64 = cleaned.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        let uniform = 1.0 / cleaned.len() as f64;
        return vec![uniform; cleaned.len()];
    }
    cleaned.into_iter().map(|v| v / total).collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation with the variance floored at 0.01.
pub fn sample_stdev(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    var.max(0.01).sqrt()
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (v * factor).round() / factor
}
