//! StageWiseProblem - validated input for one stage-wise testing run

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView2};

use super::StageWiseProblemBuilder;
use crate::error::{Result, StageRError};

/// How confirmation hypotheses are attached to units
#[derive(Debug, Clone)]
pub enum HypothesisLayout {
    /// Every unit carries the same set of hypotheses (e.g. one per contrast).
    /// `p_confirmation` is units x hypotheses, rows aligned with the screening vector.
    Fixed {
        hypothesis_names: Vec<String>,
        p_confirmation: Array2<f64>,
    },
    /// Units carry a variable number of sub-units (e.g. transcripts per gene).
    Grouped {
        sub_unit_ids: Vec<String>,
        p_confirmation: Vec<f64>,
        /// Index into the unit vector for every sub-unit
        unit_index: Vec<usize>,
        /// Sub-unit indices belonging to each unit, in input order
        members: Vec<Vec<usize>>,
    },
}

/// Validated, immutable stage-wise testing problem
///
/// Holds one screening p-value per unit and the confirmation p-values of the
/// hypotheses belonging to each unit. Construction fails on any structural
/// inconsistency; nothing is silently dropped.
#[derive(Debug, Clone)]
pub struct StageWiseProblem {
    unit_ids: Vec<String>,
    p_screen: Vec<f64>,
    layout: HypothesisLayout,
    screen_adjusted: bool,
    allow_missing: bool,
}

impl StageWiseProblem {
    /// Create a fixed-hypothesis problem
    ///
    /// `confirmation_ids` name the rows of `p_confirmation`. Rows are matched to
    /// screening units by identifier, so the two inputs need not share an order.
    pub fn new(
        unit_ids: Vec<String>,
        p_screen: Vec<f64>,
        confirmation_ids: Vec<String>,
        p_confirmation: Array2<f64>,
        hypothesis_names: Vec<String>,
        screen_adjusted: bool,
    ) -> Result<Self> {
        StageWiseProblemBuilder::new()
            .screening(unit_ids, p_screen)
            .confirmation(confirmation_ids, p_confirmation, hypothesis_names)
            .screen_adjusted(screen_adjusted)
            .build()
    }

    /// Create a variable-hypothesis problem from sub-unit p-values and a
    /// sub-unit to unit map (e.g. transcript to gene)
    pub fn with_sub_units(
        unit_ids: Vec<String>,
        p_screen: Vec<f64>,
        sub_unit_ids: Vec<String>,
        p_confirmation: Vec<f64>,
        sub_unit_to_unit: HashMap<String, String>,
        screen_adjusted: bool,
    ) -> Result<Self> {
        StageWiseProblemBuilder::new()
            .screening(unit_ids, p_screen)
            .sub_units(sub_unit_ids, p_confirmation, sub_unit_to_unit)
            .screen_adjusted(screen_adjusted)
            .build()
    }

    /// Create a builder for more control over construction
    pub fn builder() -> StageWiseProblemBuilder {
        StageWiseProblemBuilder::new()
    }

    /// Assemble the fixed variant from already-parsed inputs
    pub(crate) fn build_fixed(
        unit_ids: Vec<String>,
        p_screen: Vec<f64>,
        confirmation_ids: Vec<String>,
        p_confirmation: Array2<f64>,
        hypothesis_names: Vec<String>,
        screen_adjusted: bool,
        allow_missing: bool,
    ) -> Result<Self> {
        let unit_lookup = validate_screening(&unit_ids, &p_screen)?;
        let (n_rows, n_hyp) = p_confirmation.dim();

        if n_rows != unit_ids.len() {
            return Err(StageRError::DimensionMismatch {
                expected: format!("{} confirmation rows (one per screened unit)", unit_ids.len()),
                got: format!("{} confirmation rows", n_rows),
            });
        }
        if confirmation_ids.len() != n_rows {
            return Err(StageRError::DimensionMismatch {
                expected: format!("{} confirmation row IDs", n_rows),
                got: format!("{} confirmation row IDs", confirmation_ids.len()),
            });
        }
        if hypothesis_names.len() != n_hyp {
            return Err(StageRError::DimensionMismatch {
                expected: format!("{} hypothesis names", n_hyp),
                got: format!("{} hypothesis names", hypothesis_names.len()),
            });
        }
        if n_hyp == 0 {
            return Err(StageRError::EmptyData {
                reason: "Confirmation matrix has no hypothesis columns".to_string(),
            });
        }
        check_unique(&hypothesis_names, "hypothesis")?;

        // Align confirmation rows to screening order by identifier
        let mut seen = vec![false; n_rows];
        let mut row_order = vec![0usize; n_rows];
        for (row, id) in confirmation_ids.iter().enumerate() {
            let unit = *unit_lookup
                .get(id.as_str())
                .ok_or_else(|| StageRError::MissingUnit { unit_id: id.clone() })?;
            if seen[unit] {
                return Err(StageRError::InvalidInput {
                    reason: format!("Duplicate confirmation row ID '{}'", id),
                });
            }
            seen[unit] = true;
            row_order[unit] = row;
        }

        let aligned = if row_order.iter().enumerate().all(|(i, &r)| i == r) {
            p_confirmation
        } else {
            log::debug!("Reordering confirmation rows to match screening order");
            p_confirmation.select(ndarray::Axis(0), &row_order)
        };

        for ((i, j), &p) in aligned.indexed_iter() {
            let id = || format!("{}:{}", unit_ids[i], hypothesis_names[j]);
            validate_confirmation(p, allow_missing, id)?;
        }

        Ok(Self {
            unit_ids,
            p_screen,
            layout: HypothesisLayout::Fixed {
                hypothesis_names,
                p_confirmation: aligned,
            },
            screen_adjusted,
            allow_missing,
        })
    }

    /// Assemble the grouped variant from already-parsed inputs
    pub(crate) fn build_grouped(
        unit_ids: Vec<String>,
        p_screen: Vec<f64>,
        sub_unit_ids: Vec<String>,
        p_confirmation: Vec<f64>,
        sub_unit_to_unit: HashMap<String, String>,
        screen_adjusted: bool,
        allow_missing: bool,
    ) -> Result<Self> {
        let unit_lookup = validate_screening(&unit_ids, &p_screen)?;

        if sub_unit_ids.len() != p_confirmation.len() {
            return Err(StageRError::DimensionMismatch {
                expected: format!("{} sub-unit p-values", sub_unit_ids.len()),
                got: format!("{} sub-unit p-values", p_confirmation.len()),
            });
        }
        check_unique(&sub_unit_ids, "sub-unit")?;

        let mut unit_index = Vec::with_capacity(sub_unit_ids.len());
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); unit_ids.len()];
        for (s, sub_id) in sub_unit_ids.iter().enumerate() {
            let unit_id = sub_unit_to_unit.get(sub_id).ok_or_else(|| {
                StageRError::DimensionMismatch {
                    expected: format!("a unit mapping for sub-unit '{}'", sub_id),
                    got: "no mapping".to_string(),
                }
            })?;
            let unit = *unit_lookup
                .get(unit_id.as_str())
                .ok_or_else(|| StageRError::MissingUnit {
                    unit_id: unit_id.clone(),
                })?;
            validate_confirmation(p_confirmation[s], allow_missing, || sub_id.clone())?;
            unit_index.push(unit);
            members[unit].push(s);
        }

        let empty: Vec<&str> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_empty())
            .map(|(i, _)| unit_ids[i].as_str())
            .collect();
        if !empty.is_empty() {
            return Err(StageRError::DimensionMismatch {
                expected: format!("{} units with at least one sub-unit", unit_ids.len()),
                got: format!(
                    "{} units without sub-units (e.g. {:?})",
                    empty.len(),
                    &empty[..empty.len().min(5)]
                ),
            });
        }

        Ok(Self {
            unit_ids,
            p_screen,
            layout: HypothesisLayout::Grouped {
                sub_unit_ids,
                p_confirmation,
                unit_index,
                members,
            },
            screen_adjusted,
            allow_missing,
        })
    }

    /// Number of units
    pub fn n_units(&self) -> usize {
        self.unit_ids.len()
    }

    /// Total number of confirmation hypotheses across all units
    pub fn n_hypotheses(&self) -> usize {
        match &self.layout {
            HypothesisLayout::Fixed { p_confirmation, .. } => p_confirmation.len(),
            HypothesisLayout::Grouped { sub_unit_ids, .. } => sub_unit_ids.len(),
        }
    }

    /// Unit identifiers, in screening order
    pub fn unit_ids(&self) -> &[String] {
        &self.unit_ids
    }

    /// Screening p-values, in screening order
    pub fn p_screen(&self) -> &[f64] {
        &self.p_screen
    }

    /// Whether the screening p-values were supplied already FDR-adjusted
    pub fn screen_adjusted(&self) -> bool {
        self.screen_adjusted
    }

    /// Whether NaN confirmation p-values were accepted as untested
    pub fn allow_missing(&self) -> bool {
        self.allow_missing
    }

    pub fn layout(&self) -> &HypothesisLayout {
        &self.layout
    }

    /// True for the variable-hypothesis (sub-unit) variant
    pub fn has_sub_units(&self) -> bool {
        matches!(self.layout, HypothesisLayout::Grouped { .. })
    }

    /// Hypothesis column names of the fixed variant
    pub fn hypothesis_names(&self) -> Option<&[String]> {
        match &self.layout {
            HypothesisLayout::Fixed { hypothesis_names, .. } => Some(hypothesis_names),
            HypothesisLayout::Grouped { .. } => None,
        }
    }

    /// Confirmation matrix of the fixed variant
    pub fn confirmation_matrix(&self) -> Option<ArrayView2<'_, f64>> {
        match &self.layout {
            HypothesisLayout::Fixed { p_confirmation, .. } => Some(p_confirmation.view()),
            HypothesisLayout::Grouped { .. } => None,
        }
    }

    /// Raw confirmation p-values of one unit, in hypothesis order
    pub fn unit_pvalues(&self, unit: usize) -> Vec<f64> {
        match &self.layout {
            HypothesisLayout::Fixed { p_confirmation, .. } => p_confirmation.row(unit).to_vec(),
            HypothesisLayout::Grouped {
                p_confirmation,
                members,
                ..
            } => members[unit].iter().map(|&s| p_confirmation[s]).collect(),
        }
    }

    /// Number of hypotheses attached to one unit
    pub fn unit_size(&self, unit: usize) -> usize {
        match &self.layout {
            HypothesisLayout::Fixed { p_confirmation, .. } => p_confirmation.ncols(),
            HypothesisLayout::Grouped { members, .. } => members[unit].len(),
        }
    }
}

/// Check screening inputs and build an identifier lookup
fn validate_screening<'a>(
    unit_ids: &'a [String],
    p_screen: &[f64],
) -> Result<HashMap<&'a str, usize>> {
    if unit_ids.len() != p_screen.len() {
        return Err(StageRError::DimensionMismatch {
            expected: format!("{} screening p-values", unit_ids.len()),
            got: format!("{} screening p-values", p_screen.len()),
        });
    }
    if unit_ids.is_empty() {
        return Err(StageRError::EmptyData {
            reason: "No units in screening vector".to_string(),
        });
    }
    for (id, &p) in unit_ids.iter().zip(p_screen) {
        if !(0.0..=1.0).contains(&p) {
            return Err(StageRError::InvalidPValue {
                id: id.clone(),
                value: p,
            });
        }
    }
    check_unique(unit_ids, "unit")?;

    Ok(unit_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect())
}

fn validate_confirmation<F>(p: f64, allow_missing: bool, id: F) -> Result<()>
where
    F: FnOnce() -> String,
{
    if p.is_nan() && allow_missing {
        return Ok(());
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(StageRError::InvalidPValue { id: id(), value: p });
    }
    Ok(())
}

fn check_unique(ids: &[String], what: &str) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(StageRError::InvalidInput {
                reason: format!("Duplicate {} ID '{}'", what, id),
            });
        }
    }
    Ok(())
}
