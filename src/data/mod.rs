//! Input model for stage-wise testing

pub mod builder;
mod problem;

pub use builder::StageWiseProblemBuilder;
pub use problem::{HypothesisLayout, StageWiseProblem};
