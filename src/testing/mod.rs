//! Stage-wise multiple testing correction

mod confirmation;
mod fdr;
mod screening;
mod stagewise;

pub use confirmation::{adjust_unit, ordered_adjust, ConfirmationMethod, StageLevels};
pub use fdr::benjamini_hochberg;
pub use screening::{screen_units, ScreeningOutcome};
pub use stagewise::{adjust, stage_wise_adjustment};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StageRError};

/// Parameters of one stage-wise adjustment pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageWiseParams {
    /// Target overall false discovery rate
    pub alpha: f64,
    /// Within-unit correction for the confirmation stage
    pub method: ConfirmationMethod,
}

impl Default for StageWiseParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            method: ConfirmationMethod::Holm,
        }
    }
}

impl StageWiseParams {
    /// Create parameters for a method and level
    pub fn new(method: ConfirmationMethod, alpha: f64) -> Self {
        Self { alpha, method }
    }

    /// Check the level and any user-supplied adjustment vector
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(StageRError::InvalidAlpha { alpha: self.alpha });
        }
        self.method.validate()
    }
}
