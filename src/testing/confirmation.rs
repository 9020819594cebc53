//! Confirmation stage: within-unit FWER correction
//!
//! Every method is expressed as a vector of rank multipliers. The smallest
//! p-value of a unit is multiplied by the first entry, the second smallest by
//! the second entry, and so on; the products are capped at 1 and made
//! non-decreasing across rank.
//!
//! - `none`: all multipliers are 1
//! - `holm`: `[k, k-1, ..., 1]`
//! - `dtu`: Holm-Shaffer for units whose hypotheses are logically related
//!   after screening, `[d, d, k-2, k-3, ..., 1]` with `d = max(k-2, 1)`
//! - `user`: caller-supplied multipliers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StageRError};

/// Within-unit correction method for the confirmation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMethod {
    /// No within-unit correction
    None,
    /// Holm step-down
    Holm,
    /// Size-adapted Holm-Shaffer for a variable number of sub-units per unit
    Dtu,
    /// Ordered multipliers supplied by the caller, most significant rank first
    User(Vec<f64>),
}

impl Default for ConfirmationMethod {
    fn default() -> Self {
        ConfirmationMethod::Holm
    }
}

impl ConfirmationMethod {
    /// Build a method from its name; `adjustment` is required for `user`
    pub fn from_name(name: &str, adjustment: Option<Vec<f64>>) -> Result<Self> {
        let method = match name.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "holm" => Self::Holm,
            "dtu" => Self::Dtu,
            "user" => Self::User(adjustment.ok_or_else(|| StageRError::InvalidAdjustment {
                reason: "method 'user' requires an adjustment vector".to_string(),
            })?),
            other => {
                return Err(StageRError::InvalidInput {
                    reason: format!(
                        "Unknown confirmation method '{}'. Use 'none', 'holm', 'dtu' or 'user'.",
                        other
                    ),
                })
            }
        };
        method.validate()?;
        Ok(method)
    }

    /// Method tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Holm => "holm",
            Self::Dtu => "dtu",
            Self::User(_) => "user",
        }
    }

    /// Check a user-supplied adjustment vector
    ///
    /// Multipliers must be finite and at least 1, otherwise an adjusted
    /// p-value could fall below its raw p-value.
    pub fn validate(&self) -> Result<()> {
        if let Self::User(adjustment) = self {
            if adjustment.is_empty() {
                return Err(StageRError::InvalidAdjustment {
                    reason: "adjustment vector is empty".to_string(),
                });
            }
            if let Some((rank, &m)) = adjustment
                .iter()
                .enumerate()
                .find(|(_, m)| !m.is_finite() || **m < 1.0)
            {
                return Err(StageRError::InvalidAdjustment {
                    reason: format!(
                        "multiplier {} at rank {} must be a finite value >= 1",
                        m,
                        rank + 1
                    ),
                });
            }
        }
        Ok(())
    }

    /// Check that a user-supplied vector matches the number of hypotheses per unit
    pub fn check_width(&self, n_hypotheses: usize) -> Result<()> {
        if let Self::User(adjustment) = self {
            if adjustment.len() != n_hypotheses {
                return Err(StageRError::InvalidAdjustment {
                    reason: format!(
                        "adjustment vector has length {}, expected {} (one per confirmation hypothesis)",
                        adjustment.len(),
                        n_hypotheses
                    ),
                });
            }
        }
        Ok(())
    }

    /// Whether adjusted p-values are rescaled to the screening-stage level
    ///
    /// `none` compares confirmation p-values against the overall level directly.
    pub fn rescales_to_screening_level(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Rank multipliers for a unit with `k` tested hypotheses
    ///
    /// Returns `None` when the method cannot test a unit of this size
    /// (`dtu` with a single hypothesis).
    pub fn multipliers(&self, k: usize) -> Option<Vec<f64>> {
        match self {
            Self::None => Some(vec![1.0; k]),
            Self::Holm => Some((1..=k).rev().map(|m| m as f64).collect()),
            Self::Dtu => {
                if k < 2 {
                    return None;
                }
                let top = (k - 2).max(1) as f64;
                let mut m = vec![top, top];
                m.extend((1..=k - 2).rev().map(|r| r as f64));
                Some(m)
            }
            // Rows with untested hypotheses use the leading ranks
            Self::User(adjustment) => Some(adjustment.iter().take(k).copied().collect()),
        }
    }
}

impl fmt::Display for ConfirmationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfirmationMethod {
    type Err = StageRError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s, None)
    }
}

/// Apply ordered rank multipliers to one unit's p-values
///
/// Returns adjusted values in input order. Equal p-values receive equal
/// adjusted values regardless of how the tie is broken.
pub fn ordered_adjust(pvalues: &[f64], multipliers: &[f64]) -> Vec<f64> {
    let k = pvalues.len();
    debug_assert_eq!(k, multipliers.len());

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let mut sorted_adj = Vec::with_capacity(k);
    let mut running = 0.0f64;
    for (rank, &i) in order.iter().enumerate() {
        running = running.max((pvalues[i] * multipliers[rank]).min(1.0));
        sorted_adj.push(running);
    }

    // Tie groups take the value reached at their last rank
    let mut end = k;
    while end > 0 {
        let tied = pvalues[order[end - 1]];
        let mut start = end - 1;
        while start > 0 && pvalues[order[start - 1]] == tied {
            start -= 1;
        }
        let value = sorted_adj[end - 1];
        for adj in &mut sorted_adj[start..end] {
            *adj = value;
        }
        end = start;
    }

    let mut adjusted = vec![0.0; k];
    for (rank, &i) in order.iter().enumerate() {
        adjusted[i] = sorted_adj[rank];
    }
    adjusted
}

/// Screening counts shared by all units in one adjustment pass
#[derive(Debug, Clone, Copy)]
pub struct StageLevels {
    /// Total number of units G
    pub n_units: usize,
    /// Units passing screening R
    pub n_passed: usize,
}

impl StageLevels {
    /// Rescaling factor alpha / alpha_I, computed as G / R
    pub fn scale(&self) -> f64 {
        if self.n_passed == 0 {
            return 1.0;
        }
        self.n_units as f64 / self.n_passed as f64
    }
}

/// Stage-wise adjusted confirmation p-values of one unit that passed screening
///
/// NaN inputs are untested and yield `None`, as does every hypothesis when the
/// method cannot test a unit of this size. Reported values are scaled so that
/// `padj <= alpha` is the rejection rule, and never fall below the unit's
/// adjusted screening p-value.
pub fn adjust_unit(
    method: &ConfirmationMethod,
    pvalues: &[f64],
    padj_screen: f64,
    levels: StageLevels,
) -> Vec<Option<f64>> {
    let tested: Vec<usize> = (0..pvalues.len())
        .filter(|&i| !pvalues[i].is_nan())
        .collect();
    let mut out = vec![None; pvalues.len()];

    let multipliers = match method.multipliers(tested.len()) {
        Some(m) if !tested.is_empty() => m,
        _ => return out,
    };

    let raw: Vec<f64> = tested.iter().map(|&i| pvalues[i]).collect();
    let fwer = ordered_adjust(&raw, &multipliers);

    let scale = if method.rescales_to_screening_level() {
        levels.scale()
    } else {
        1.0
    };

    for (&i, adj) in tested.iter().zip(fwer) {
        out[i] = Some((adj * scale).max(pvalues[i]).max(padj_screen).min(1.0));
    }
    out
}
