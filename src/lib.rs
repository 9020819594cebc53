//! rust_stager: stage-wise multiple testing correction in Rust
//!
//! Genes (units) are first screened with an omnibus test whose p-values are
//! BH-adjusted across all genes. Only genes passing the screening stage are
//! carried into the confirmation stage, where their individual hypotheses
//! (contrasts, transcripts) are corrected for the family-wise error rate at
//! the screening-adjusted level. The combined procedure controls the overall
//! false discovery rate (OFDR).
//!
//! # Example
//!
//! ```ignore
//! use rust_stager::prelude::*;
//!
//! let problem = StageWiseProblem::with_sub_units(
//!     gene_ids, p_screen, tx_ids, p_tx, tx2gene, false,
//! )?;
//! let results = stage_wise_adjustment(
//!     &problem,
//!     &StageWiseParams::new(ConfirmationMethod::Dtu, 0.05),
//! )?;
//!
//! let genes = results.significant_units();
//! let transcripts = results.significant_sub_units()?;
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod io;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{HypothesisLayout, StageWiseProblem, StageWiseProblemBuilder};
    pub use crate::error::{Result, StageRError};
    pub use crate::io::{
        read_confirmation, read_screening, read_sub_unit_map, write_adjusted_pvalues,
        write_significance, AdjustedPValueTable, HypothesisResult, SignificanceTable,
        StageWiseResults, StageWiseSummary,
    };
    pub use crate::testing::{
        adjust, benjamini_hochberg, stage_wise_adjustment, ConfirmationMethod, StageWiseParams,
    };
}
