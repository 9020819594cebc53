//! Stage-wise results and read-only queries over them

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StageRError};
use crate::testing::{ConfirmationMethod, ScreeningOutcome, StageWiseParams};

/// Column name of the screening hypothesis in result tables
pub const SCREEN_COLUMN: &str = "padjScreen";

/// Outcome for one confirmation hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisResult {
    /// Hypothesis name (fixed variant) or sub-unit identifier
    pub hypothesis_id: String,
    /// Index of the owning unit
    pub unit_index: usize,
    /// Raw confirmation p-value; `None` when untested
    pub pvalue: Option<f64>,
    /// Stage-wise adjusted p-value; `None` when not tested in the confirmation stage
    pub padj: Option<f64>,
    /// `padj <= alpha`; `None` when not tested
    pub significant: Option<bool>,
}

/// Results of one stage-wise adjustment pass
///
/// Valid only at the significance level it was computed for. A new pass at
/// another level or with another method produces a new object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWiseResults {
    unit_ids: Vec<String>,
    pvalues_screen: Vec<f64>,
    padj_screen: Vec<f64>,
    screen_passed: Vec<bool>,
    alpha_adjusted: f64,
    hypotheses: Vec<HypothesisResult>,
    /// Column names of the fixed variant; `None` for sub-unit results
    hypothesis_names: Option<Vec<String>>,
    params: StageWiseParams,
}

/// One row of the adjusted p-value table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedRow {
    pub unit_id: String,
    /// Present for sub-unit results
    pub sub_unit_id: Option<String>,
    /// Adjusted screening p-value of the unit
    pub padj_screen: f64,
    /// Stage-wise adjusted confirmation p-values; one entry per hypothesis
    /// column, or a single entry for a sub-unit row
    pub padj: Vec<Option<f64>>,
}

/// Adjusted p-values in tabular form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedPValueTable {
    /// Names of the p-value columns, screening first
    pub columns: Vec<String>,
    pub rows: Vec<AdjustedRow>,
}

/// Binary significance matrix (1 = significant, 0 = not)
///
/// Rows are units for the fixed variant and sub-units otherwise. The first
/// column is the screening hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceTable {
    pub unit_ids: Vec<String>,
    pub sub_unit_ids: Option<Vec<String>>,
    pub columns: Vec<String>,
    pub matrix: Array2<u8>,
}

impl StageWiseResults {
    pub(crate) fn new(
        unit_ids: Vec<String>,
        pvalues_screen: Vec<f64>,
        screening: ScreeningOutcome,
        hypotheses: Vec<HypothesisResult>,
        hypothesis_names: Option<Vec<String>>,
        params: StageWiseParams,
    ) -> Self {
        Self {
            unit_ids,
            pvalues_screen,
            padj_screen: screening.padj_screen,
            screen_passed: screening.passed,
            alpha_adjusted: screening.alpha_adjusted,
            hypotheses,
            hypothesis_names,
            params,
        }
    }

    /// Significance level the results were computed at
    pub fn alpha(&self) -> f64 {
        self.params.alpha
    }

    /// Screening-stage adjusted level alpha * R / G
    pub fn alpha_adjusted(&self) -> f64 {
        self.alpha_adjusted
    }

    pub fn method(&self) -> &ConfirmationMethod {
        &self.params.method
    }

    pub fn unit_ids(&self) -> &[String] {
        &self.unit_ids
    }

    /// Raw screening p-values as supplied
    pub fn pvalues_screen(&self) -> &[f64] {
        &self.pvalues_screen
    }

    pub fn padj_screen(&self) -> &[f64] {
        &self.padj_screen
    }

    pub fn screen_passed(&self) -> &[bool] {
        &self.screen_passed
    }

    /// Number of units passing the screening stage
    pub fn n_screen_passed(&self) -> usize {
        self.screen_passed.iter().filter(|&&p| p).count()
    }

    /// Per-hypothesis outcomes, in the problem's hypothesis order
    pub fn hypotheses(&self) -> &[HypothesisResult] {
        &self.hypotheses
    }

    /// True for sub-unit (variable-hypothesis) results
    pub fn has_sub_units(&self) -> bool {
        self.hypothesis_names.is_none()
    }

    fn n_columns(&self) -> usize {
        self.hypothesis_names.as_ref().map_or(1, |names| names.len())
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = vec![SCREEN_COLUMN.to_string()];
        match &self.hypothesis_names {
            Some(names) => columns.extend(names.iter().cloned()),
            None => columns.push("padj".to_string()),
        }
        columns
    }

    /// Row indices into `hypotheses` grouped the way tables present them:
    /// one row per unit (fixed) or one per sub-unit
    fn table_rows(&self) -> Vec<(usize, std::ops::Range<usize>)> {
        let width = self.n_columns();
        if self.has_sub_units() {
            self.hypotheses
                .iter()
                .enumerate()
                .map(|(i, h)| (h.unit_index, i..i + 1))
                .collect()
        } else {
            (0..self.unit_ids.len())
                .map(|u| (u, u * width..(u + 1) * width))
                .collect()
        }
    }

    /// Adjusted p-value table
    ///
    /// With `only_significant_units`, rows of units that failed screening are
    /// dropped. With `order`, rows are sorted by ascending adjusted screening
    /// p-value; ties keep the original row order.
    pub fn adjusted_pvalues(&self, only_significant_units: bool, order: bool) -> AdjustedPValueTable {
        let mut rows: Vec<AdjustedRow> = self
            .table_rows()
            .into_iter()
            .filter(|(u, _)| !only_significant_units || self.screen_passed[*u])
            .map(|(u, range)| {
                let sub_unit_id = if self.has_sub_units() {
                    Some(self.hypotheses[range.start].hypothesis_id.clone())
                } else {
                    None
                };
                AdjustedRow {
                    unit_id: self.unit_ids[u].clone(),
                    sub_unit_id,
                    padj_screen: self.padj_screen[u],
                    padj: self.hypotheses[range].iter().map(|h| h.padj).collect(),
                }
            })
            .collect();

        if order {
            // Stable: ties keep their original row order
            rows.sort_by(|a, b| a.padj_screen.total_cmp(&b.padj_screen));
        }

        AdjustedPValueTable {
            columns: self.columns(),
            rows,
        }
    }

    /// Binary significance matrix, screening hypothesis first
    pub fn significance(&self) -> SignificanceTable {
        let rows = self.table_rows();
        let width = self.n_columns();
        let mut matrix = Array2::zeros((rows.len(), width + 1));

        for (r, (u, range)) in rows.iter().enumerate() {
            matrix[[r, 0]] = self.screen_passed[*u] as u8;
            for (j, h) in self.hypotheses[range.clone()].iter().enumerate() {
                matrix[[r, j + 1]] = (h.significant == Some(true)) as u8;
            }
        }

        let unit_ids = rows.iter().map(|(u, _)| self.unit_ids[*u].clone()).collect();
        let sub_unit_ids = if self.has_sub_units() {
            Some(self.hypotheses.iter().map(|h| h.hypothesis_id.clone()).collect())
        } else {
            None
        };

        SignificanceTable {
            unit_ids,
            sub_unit_ids,
            columns: self.columns(),
            matrix,
        }
    }

    /// Units passing the screening stage
    pub fn significant_units(&self) -> Vec<&str> {
        self.unit_ids
            .iter()
            .zip(self.screen_passed.iter())
            .filter(|(_, &passed)| passed)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Sub-units significant in the confirmation stage
    ///
    /// Only defined for sub-unit results.
    pub fn significant_sub_units(&self) -> Result<Vec<&str>> {
        if !self.has_sub_units() {
            return Err(StageRError::InvalidInput {
                reason: "significant sub-units are only defined for results built from a sub-unit map"
                    .to_string(),
            });
        }
        Ok(self
            .hypotheses
            .iter()
            .filter(|h| h.significant == Some(true))
            .map(|h| h.hypothesis_id.as_str())
            .collect())
    }

    /// Summary statistics
    pub fn summary(&self) -> StageWiseSummary {
        StageWiseSummary {
            method: self.params.method.name().to_string(),
            alpha: self.params.alpha,
            alpha_adjusted: self.alpha_adjusted,
            total_units: self.unit_ids.len(),
            units_passed: self.n_screen_passed(),
            total_hypotheses: self.hypotheses.len(),
            hypotheses_tested: self.hypotheses.iter().filter(|h| h.padj.is_some()).count(),
            hypotheses_significant: self
                .hypotheses
                .iter()
                .filter(|h| h.significant == Some(true))
                .count(),
        }
    }
}

/// Summary of stage-wise results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWiseSummary {
    pub method: String,
    pub alpha: f64,
    pub alpha_adjusted: f64,
    pub total_units: usize,
    pub units_passed: usize,
    pub total_hypotheses: usize,
    pub hypotheses_tested: usize,
    pub hypotheses_significant: usize,
}

impl std::fmt::Display for StageWiseSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Stage-wise Testing Summary")?;
        writeln!(f, "==========================")?;
        writeln!(f, "Confirmation method: {}", self.method)?;
        writeln!(f, "Target OFDR: {}", self.alpha)?;
        writeln!(
            f,
            "Units passing screening: {} of {}",
            self.units_passed, self.total_units
        )?;
        writeln!(f, "Screening-adjusted level: {:.6}", self.alpha_adjusted)?;
        writeln!(
            f,
            "Hypotheses tested in confirmation: {} of {}",
            self.hypotheses_tested, self.total_hypotheses
        )?;
        writeln!(f, "Hypotheses significant: {}", self.hypotheses_significant)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StageWiseProblem;
    use crate::testing::adjust;
    use ndarray::array;
    use std::collections::HashMap;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn contrast_results(alpha: f64) -> StageWiseResults {
        let problem = StageWiseProblem::new(
            ids(&["A", "B", "C", "D"]),
            vec![0.03, 0.001, 0.6, 0.002],
            ids(&["A", "B", "C", "D"]),
            array![
                [0.01, 0.3],
                [0.0001, 0.002],
                [0.001, 0.001],
                [0.5, 0.0004]
            ],
            ids(&["c1", "c2"]),
            false,
        )
        .unwrap();
        adjust(&problem, ConfirmationMethod::Holm, alpha).unwrap()
    }

    fn tx_results() -> StageWiseResults {
        let map: HashMap<String, String> = [("t1", "g1"), ("t2", "g1"), ("t3", "g2"), ("t4", "g2")]
            .iter()
            .map(|(t, g)| (t.to_string(), g.to_string()))
            .collect();
        let problem = StageWiseProblem::with_sub_units(
            ids(&["g1", "g2"]),
            vec![0.5, 0.0001],
            ids(&["t1", "t2", "t3", "t4"]),
            vec![0.001, 0.002, 0.01, 0.8],
            map,
            false,
        )
        .unwrap();
        adjust(&problem, ConfirmationMethod::Dtu, 0.05).unwrap()
    }

    #[test]
    fn test_adjusted_table_full() {
        let res = contrast_results(0.05);
        let table = res.adjusted_pvalues(false, false);

        assert_eq!(table.columns, vec!["padjScreen", "c1", "c2"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(res.pvalues_screen(), &[0.03, 0.001, 0.6, 0.002]);
        // C fails screening (BH padj 0.6)
        assert_eq!(table.rows[2].unit_id, "C");
        assert_eq!(table.rows[2].padj, vec![None, None]);
        assert!((table.rows[2].padj_screen - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_adjusted_table_filtered_and_ordered() {
        let res = contrast_results(0.05);
        let table = res.adjusted_pvalues(true, true);

        let order: Vec<&str> = table.rows.iter().map(|r| r.unit_id.as_str()).collect();
        // BH: B = 0.004, D = 0.004, A = 0.04; the B/D tie keeps unit order
        assert_eq!(order, vec!["B", "D", "A"]);
        for w in table.rows.windows(2) {
            assert!(w[0].padj_screen <= w[1].padj_screen);
        }
    }

    #[test]
    fn test_ordered_sub_unit_ties_keep_row_order() {
        let map: HashMap<String, String> =
            [("t1", "g1"), ("t2", "g2"), ("t3", "g1"), ("t4", "g2"), ("t5", "g3")]
                .iter()
                .map(|(t, g)| (t.to_string(), g.to_string()))
                .collect();
        let problem = StageWiseProblem::with_sub_units(
            ids(&["g1", "g2", "g3"]),
            vec![0.001, 0.001, 0.0001],
            ids(&["t1", "t2", "t3", "t4", "t5"]),
            vec![0.01, 0.02, 0.03, 0.04, 0.05],
            map,
            false,
        )
        .unwrap();
        let res = adjust(&problem, ConfirmationMethod::Holm, 0.05).unwrap();

        // g1 and g2 tie at BH 0.001; g3 (0.0003) comes first
        let table = res.adjusted_pvalues(false, true);
        let order: Vec<&str> = table
            .rows
            .iter()
            .map(|r| r.sub_unit_id.as_deref().unwrap())
            .collect();
        assert_eq!(order, vec!["t5", "t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_significance_matrix() {
        let res = contrast_results(0.05);
        let sig = res.significance();

        assert_eq!(sig.matrix.dim(), (4, 3));
        assert!(sig.sub_unit_ids.is_none());
        // Masked unit C: nothing significant
        assert_eq!(sig.matrix.row(2).to_vec(), vec![0, 0, 0]);
        // Screening column mirrors screen_passed
        for (u, &passed) in res.screen_passed().iter().enumerate() {
            assert_eq!(sig.matrix[[u, 0]], passed as u8);
        }
    }

    #[test]
    fn test_significant_units() {
        let res = contrast_results(0.05);
        assert_eq!(res.significant_units(), vec!["A", "B", "D"]);
        assert!(res.significant_sub_units().is_err());
    }

    #[test]
    fn test_sub_unit_queries() {
        let res = tx_results();

        assert_eq!(res.significant_units(), vec!["g2"]);
        // g2 has two transcripts under dtu: multipliers [1, 1], alpha_I = 0.025
        assert_eq!(res.significant_sub_units().unwrap(), vec!["t3"]);

        let table = res.adjusted_pvalues(true, false);
        assert_eq!(table.columns, vec!["padjScreen", "padj"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].sub_unit_id.as_deref(), Some("t3"));

        let sig = res.significance();
        assert_eq!(sig.matrix.dim(), (4, 2));
        assert_eq!(sig.unit_ids, vec!["g1", "g1", "g2", "g2"]);
        assert_eq!(sig.matrix.row(2).to_vec(), vec![1, 1]);
        assert_eq!(sig.matrix.row(0).to_vec(), vec![0, 0]);
    }

    #[test]
    fn test_summary() {
        let summary = contrast_results(0.05).summary();

        assert_eq!(summary.total_units, 4);
        assert_eq!(summary.units_passed, 3);
        assert_eq!(summary.total_hypotheses, 8);
        assert_eq!(summary.hypotheses_tested, 6);
        assert!(format!("{}", summary).contains("Units passing screening: 3 of 4"));
    }

    #[test]
    fn test_results_serialize() {
        let res = tx_results();
        let json = serde_json::to_string(&res.adjusted_pvalues(false, true)).unwrap();
        assert!(json.contains("\"sub_unit_id\":\"t1\""));
        assert!(json.contains("null"));
    }
}
