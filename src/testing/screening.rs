//! Screening stage: FDR control across units

use serde::{Deserialize, Serialize};

use super::fdr::benjamini_hochberg;
use crate::data::StageWiseProblem;

/// Outcome of the screening stage at one significance level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    /// Adjusted screening p-values, one per unit
    pub padj_screen: Vec<f64>,
    /// Whether each unit passes to the confirmation stage
    pub passed: Vec<bool>,
    /// Significance level the confirmation stage runs at: alpha * R / G
    pub alpha_adjusted: f64,
}

impl ScreeningOutcome {
    /// Number of units passing screening
    pub fn n_passed(&self) -> usize {
        self.passed.iter().filter(|&&p| p).count()
    }
}

/// Adjust screening p-values (unless already adjusted) and select units at `alpha`
pub fn screen_units(problem: &StageWiseProblem, alpha: f64) -> ScreeningOutcome {
    let padj_screen = if problem.screen_adjusted() {
        log::debug!("Screening p-values supplied as adjusted; skipping BH correction");
        problem.p_screen().to_vec()
    } else {
        benjamini_hochberg(problem.p_screen())
    };

    let passed: Vec<bool> = padj_screen.iter().map(|&q| q <= alpha).collect();
    let n_passed = passed.iter().filter(|&&p| p).count();
    let alpha_adjusted = alpha * (n_passed as f64 / padj_screen.len() as f64);

    log::info!(
        "Screening stage: {} of {} units significant at alpha = {}",
        n_passed,
        padj_screen.len(),
        alpha
    );
    if n_passed == 0 {
        log::warn!("No units passed the screening stage; confirmation stage is skipped");
    }

    ScreeningOutcome {
        padj_screen,
        passed,
        alpha_adjusted,
    }
}
