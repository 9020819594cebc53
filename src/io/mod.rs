//! Result containers and delimited-file input/output

mod csv;
mod results;

pub use self::csv::{
    read_confirmation, read_screening, read_sub_unit_map, write_adjusted_pvalues,
    write_significance, PValueColumn, PValueMatrix,
};
pub use results::{
    AdjustedPValueTable, AdjustedRow, HypothesisResult, SignificanceTable, StageWiseResults,
    StageWiseSummary, SCREEN_COLUMN,
};
