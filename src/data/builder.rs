//! Builder pattern for StageWiseProblem
//!
//! Provides a fluent API for assembling either problem variant.

use ndarray::Array2;
use std::collections::HashMap;

use super::StageWiseProblem;
use crate::error::{Result, StageRError};

enum ConfirmationInput {
    Fixed {
        row_ids: Vec<String>,
        p_confirmation: Array2<f64>,
        hypothesis_names: Vec<String>,
    },
    Grouped {
        sub_unit_ids: Vec<String>,
        p_confirmation: Vec<f64>,
        sub_unit_to_unit: HashMap<String, String>,
    },
}

/// Builder for StageWiseProblem
///
/// # Example
///
/// ```ignore
/// let problem = StageWiseProblemBuilder::new()
///     .screening(gene_ids, p_screen)
///     .sub_units(tx_ids, p_tx, tx2gene)
///     .allow_missing(true)
///     .build()?;
/// ```
#[derive(Default)]
pub struct StageWiseProblemBuilder {
    unit_ids: Option<Vec<String>>,
    p_screen: Option<Vec<f64>>,
    confirmation: Option<ConfirmationInput>,
    screen_adjusted: bool,
    allow_missing: bool,
}

impl StageWiseProblemBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the screening p-values, one per unit (required)
    pub fn screening(mut self, unit_ids: Vec<String>, p_screen: Vec<f64>) -> Self {
        self.unit_ids = Some(unit_ids);
        self.p_screen = Some(p_screen);
        self
    }

    /// Set a fixed-width confirmation matrix (units x hypotheses)
    ///
    /// Replaces any previously set confirmation input.
    pub fn confirmation(
        mut self,
        row_ids: Vec<String>,
        p_confirmation: Array2<f64>,
        hypothesis_names: Vec<String>,
    ) -> Self {
        self.confirmation = Some(ConfirmationInput::Fixed {
            row_ids,
            p_confirmation,
            hypothesis_names,
        });
        self
    }

    /// Set sub-unit confirmation p-values with their sub-unit to unit map
    ///
    /// Replaces any previously set confirmation input.
    pub fn sub_units(
        mut self,
        sub_unit_ids: Vec<String>,
        p_confirmation: Vec<f64>,
        sub_unit_to_unit: HashMap<String, String>,
    ) -> Self {
        self.confirmation = Some(ConfirmationInput::Grouped {
            sub_unit_ids,
            p_confirmation,
            sub_unit_to_unit,
        });
        self
    }

    /// Mark the screening p-values as already FDR-adjusted
    pub fn screen_adjusted(mut self, adjusted: bool) -> Self {
        self.screen_adjusted = adjusted;
        self
    }

    /// Accept NaN confirmation p-values as untested hypotheses
    pub fn allow_missing(mut self, allow: bool) -> Self {
        self.allow_missing = allow;
        self
    }

    /// Build the StageWiseProblem
    ///
    /// Returns an error if required fields are missing or validation fails
    pub fn build(self) -> Result<StageWiseProblem> {
        let unit_ids = self.unit_ids.ok_or_else(|| StageRError::InvalidInput {
            reason: "screening p-values are required".to_string(),
        })?;
        let p_screen = self.p_screen.unwrap_or_default();

        let confirmation = self.confirmation.ok_or_else(|| StageRError::InvalidInput {
            reason: "confirmation p-values are required".to_string(),
        })?;

        match confirmation {
            ConfirmationInput::Fixed {
                row_ids,
                p_confirmation,
                hypothesis_names,
            } => StageWiseProblem::build_fixed(
                unit_ids,
                p_screen,
                row_ids,
                p_confirmation,
                hypothesis_names,
                self.screen_adjusted,
                self.allow_missing,
            ),
            ConfirmationInput::Grouped {
                sub_unit_ids,
                p_confirmation,
                sub_unit_to_unit,
            } => StageWiseProblem::build_grouped(
                unit_ids,
                p_screen,
                sub_unit_ids,
                p_confirmation,
                sub_unit_to_unit,
                self.screen_adjusted,
                self.allow_missing,
            ),
        }
    }
}
