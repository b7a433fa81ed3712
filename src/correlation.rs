//! Pairwise leg correlations and their Cholesky factor.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EdgeError, Result};
use crate::math::clamp;

/// Smallest pivot accepted when factoring a near-singular matrix.
pub const PIVOT_EPSILON: f64 = 1e-8;

/// What a leg is measured on: who, which team, and which quantity.
///
/// Two keys with no quantity are considered to measure the same thing. On the
/// wire a bare string is accepted as a key with only an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawCorrelationKey")]
pub struct CorrelationKey {
    pub entity: String,
    pub team: Option<String>,
    pub quantity: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCorrelationKey {
    Entity(String),
    Full {
        entity: String,
        #[serde(default)]
        team: Option<String>,
        #[serde(default)]
        quantity: Option<String>,
    },
}

impl From<RawCorrelationKey> for CorrelationKey {
    fn from(raw: RawCorrelationKey) -> Self {
        match raw {
            RawCorrelationKey::Entity(entity) => CorrelationKey::new(entity),
            RawCorrelationKey::Full {
                entity,
                team,
                quantity,
            } => CorrelationKey {
                entity,
                team,
                quantity,
            },
        }
    }
}

impl CorrelationKey {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            team: None,
            quantity: None,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }
}

/// Fixed coefficients for each relationship between two legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrelationModel {
    pub same_entity_same_quantity: f64,
    pub same_entity: f64,
    pub same_team: f64,
    pub unrelated: f64,
}

impl Default for CorrelationModel {
    fn default() -> Self {
        Self {
            same_entity_same_quantity: 0.8,
            same_entity: 0.4,
            same_team: 0.2,
            unrelated: 0.05,
        }
    }
}

impl CorrelationModel {
    pub fn coefficient(&self, a: &CorrelationKey, b: &CorrelationKey) -> f64 {
        let rho = if a.entity == b.entity {
            if a.quantity == b.quantity {
                self.same_entity_same_quantity
            } else {
                self.same_entity
            }
        } else if a.team.is_some() && a.team == b.team {
            self.same_team
        } else {
            self.unrelated
        };
        clamp(rho, -0.99, 0.99)
    }
}

/// How to treat a pivot that is not strictly positive during factoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotPolicy {
    /// Replace with [`PIVOT_EPSILON`] and keep going.
    #[default]
    Clamp,
    /// Fail with [`EdgeError::NonPositiveSemiDefinite`].
    Strict,
}

/// Symmetric matrix with unit diagonal.
pub fn correlation_matrix(keys: &[&CorrelationKey], model: &CorrelationModel) -> Vec<Vec<f64>> {
    let n = keys.len();
    let mut m = vec![vec![0.0; n]; n];
    for i in 0..n {
        m[i][i] = 1.0;
        for j in (i + 1)..n {
            let rho = model.coefficient(keys[i], keys[j]);
            m[i][j] = rho;
            m[j][i] = rho;
        }
    }
    m
}

/// Lower-triangular `L` with `L * L^T == matrix`.
pub fn cholesky(matrix: &[Vec<f64>], policy: PivotPolicy) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let pivot = matrix[i][i] - sum;
                let pivot = if pivot <= PIVOT_EPSILON {
                    match policy {
                        PivotPolicy::Strict => {
                            return Err(EdgeError::NonPositiveSemiDefinite { index: i, pivot });
                        }
                        PivotPolicy::Clamp => {
                            warn!(index = i, pivot, "clamping non-positive cholesky pivot");
                            PIVOT_EPSILON
                        }
                    }
                } else {
                    pivot
                };
                l[i][j] = pivot.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Ok(l)
}
