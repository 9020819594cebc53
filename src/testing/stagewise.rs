//! Stage-wise adjustment: screening, per-unit confirmation, aggregation

use rayon::prelude::*;

use super::confirmation::{adjust_unit, ConfirmationMethod, StageLevels};
use super::screening::screen_units;
use super::StageWiseParams;
use crate::data::{HypothesisLayout, StageWiseProblem};
use crate::error::{Result, StageRError};
use crate::io::{HypothesisResult, StageWiseResults};

/// Run the two-stage procedure on `problem`
///
/// Screening q-values are computed jointly over all units before any unit is
/// confirmed; units are then confirmed independently and in parallel. Every
/// call recomputes from the raw inputs and returns a new result object.
pub fn stage_wise_adjustment(
    problem: &StageWiseProblem,
    params: &StageWiseParams,
) -> Result<StageWiseResults> {
    params.validate()?;
    check_method_fits(problem, &params.method)?;

    let screening = screen_units(problem, params.alpha);
    let levels = StageLevels {
        n_units: problem.n_units(),
        n_passed: screening.n_passed(),
    };
    log::info!(
        "Confirmation stage: method = {}, screening-adjusted level = {:.6}",
        params.method,
        screening.alpha_adjusted
    );
    if params.method == ConfirmationMethod::None {
        log::warn!(
            "Method 'none' applies no within-unit correction; \
             this is only valid when at most one null hypothesis per unit can remain true after screening"
        );
    }

    let method = &params.method;
    let per_unit: Vec<Vec<Option<f64>>> = (0..problem.n_units())
        .into_par_iter()
        .map(|u| {
            if screening.passed[u] {
                adjust_unit(method, &problem.unit_pvalues(u), screening.padj_screen[u], levels)
            } else {
                vec![None; problem.unit_size(u)]
            }
        })
        .collect();

    if *method == ConfirmationMethod::Dtu {
        let single = (0..problem.n_units())
            .filter(|&u| screening.passed[u] && tested_count(problem, u) == 1)
            .count();
        if single > 0 {
            log::warn!(
                "{} screened units have a single tested hypothesis and receive no confirmation p-value under 'dtu'",
                single
            );
        }
    }

    let hypotheses = aggregate(problem, &per_unit, params.alpha);
    let n_significant = hypotheses
        .iter()
        .filter(|h| h.significant == Some(true))
        .count();
    log::info!(
        "{} of {} confirmation hypotheses significant at alpha = {}",
        n_significant,
        hypotheses.len(),
        params.alpha
    );

    Ok(StageWiseResults::new(
        problem.unit_ids().to_vec(),
        problem.p_screen().to_vec(),
        screening,
        hypotheses,
        problem.hypothesis_names().map(|names| names.to_vec()),
        params.clone(),
    ))
}

/// Run the procedure with a method and level given directly
pub fn adjust(
    problem: &StageWiseProblem,
    method: ConfirmationMethod,
    alpha: f64,
) -> Result<StageWiseResults> {
    stage_wise_adjustment(problem, &StageWiseParams { alpha, method })
}

/// A user vector must supply one multiplier per hypothesis of every unit
fn check_method_fits(problem: &StageWiseProblem, method: &ConfirmationMethod) -> Result<()> {
    match problem.layout() {
        HypothesisLayout::Fixed {
            hypothesis_names, ..
        } => method.check_width(hypothesis_names.len()),
        HypothesisLayout::Grouped { .. } => {
            if let ConfirmationMethod::User(adjustment) = method {
                if let Some(u) = (0..problem.n_units()).find(|&u| problem.unit_size(u) != adjustment.len()) {
                    return Err(StageRError::InvalidAdjustment {
                        reason: format!(
                            "adjustment vector has length {}, but unit '{}' has {} sub-units",
                            adjustment.len(),
                            problem.unit_ids()[u],
                            problem.unit_size(u)
                        ),
                    });
                }
            }
            Ok(())
        }
    }
}

fn tested_count(problem: &StageWiseProblem, unit: usize) -> usize {
    problem
        .unit_pvalues(unit)
        .iter()
        .filter(|p| !p.is_nan())
        .count()
}

/// Lay per-unit outputs back onto the problem's hypothesis order
fn aggregate(
    problem: &StageWiseProblem,
    per_unit: &[Vec<Option<f64>>],
    alpha: f64,
) -> Vec<HypothesisResult> {
    let result = |id: &str, unit: usize, p: f64, padj: Option<f64>| HypothesisResult {
        hypothesis_id: id.to_string(),
        unit_index: unit,
        pvalue: if p.is_nan() { None } else { Some(p) },
        padj,
        significant: padj.map(|q| q <= alpha),
    };

    match problem.layout() {
        HypothesisLayout::Fixed {
            hypothesis_names,
            p_confirmation,
        } => p_confirmation
            .indexed_iter()
            .map(|((u, j), &p)| result(&hypothesis_names[j], u, p, per_unit[u][j]))
            .collect(),
        HypothesisLayout::Grouped {
            sub_unit_ids,
            p_confirmation,
            unit_index,
            members,
        } => {
            let mut position = vec![0usize; sub_unit_ids.len()];
            for m in members {
                for (pos, &s) in m.iter().enumerate() {
                    position[s] = pos;
                }
            }
            sub_unit_ids
                .iter()
                .enumerate()
                .map(|(s, id)| {
                    let u = unit_index[s];
                    result(id, u, p_confirmation[s], per_unit[u][position[s]])
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::HashMap;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn contrast_problem() -> StageWiseProblem {
        StageWiseProblem::new(
            ids(&["A", "B", "C"]),
            vec![0.001, 0.2, 0.5],
            ids(&["A", "B", "C"]),
            array![[0.01, 0.02, 0.03], [0.001, 0.5, 0.9], [0.002, 0.003, 0.004]],
            ids(&["c1", "c2", "c3"]),
            false,
        )
        .unwrap()
    }

    fn tx_problem() -> StageWiseProblem {
        let map: HashMap<String, String> = [
            ("t1", "g1"),
            ("t2", "g1"),
            ("t3", "g2"),
            ("t4", "g2"),
            ("t5", "g2"),
            ("t6", "g3"),
        ]
        .iter()
        .map(|(t, g)| (t.to_string(), g.to_string()))
        .collect();

        StageWiseProblem::with_sub_units(
            ids(&["g1", "g2", "g3"]),
            vec![0.001, 0.002, 0.003],
            ids(&["t1", "t3", "t2", "t4", "t5", "t6"]),
            vec![0.01, 0.001, 0.04, 0.02, 0.6, 0.0001],
            map,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_unscreened_units_fully_masked() {
        let res = adjust(&contrast_problem(), ConfirmationMethod::Holm, 0.05).unwrap();

        assert_eq!(res.screen_passed(), &[true, false, false]);
        for h in res.hypotheses() {
            if h.unit_index == 0 {
                assert!(h.padj.is_some());
            } else {
                assert!(h.padj.is_none());
                assert!(h.significant.is_none());
            }
        }
        // Screening padj is still reported for masked units
        assert!((res.padj_screen()[1] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_holm_scaled_to_screening_level() {
        let res = adjust(&contrast_problem(), ConfirmationMethod::Holm, 0.05).unwrap();

        // One of three units passes: alpha_I = 0.05 / 3, scale factor 3
        assert!((res.alpha_adjusted() - 0.05 / 3.0).abs() < 1e-12);
        let padj: Vec<f64> = res.hypotheses()[..3].iter().map(|h| h.padj.unwrap()).collect();
        let expected = [0.09, 0.12, 0.12];
        for (a, e) in padj.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12);
        }
        assert!(res.hypotheses()[..3].iter().all(|h| h.significant == Some(false)));
    }

    #[test]
    fn test_all_units_pass_keeps_raw_bound() {
        let problem = StageWiseProblem::new(
            ids(&["A", "B", "C"]),
            vec![0.001, 0.002, 0.003],
            ids(&["A", "B", "C"]),
            array![[0.76], [0.76], [0.76]],
            ids(&["c1"]),
            false,
        )
        .unwrap();

        for method in [ConfirmationMethod::None, ConfirmationMethod::Holm] {
            let res = adjust(&problem, method, 0.05).unwrap();
            assert_eq!(res.alpha_adjusted(), 0.05);
            for h in res.hypotheses() {
                assert!(h.padj.unwrap() >= h.pvalue.unwrap());
                assert_eq!(h.padj, Some(0.76));
            }
        }
    }

    #[test]
    fn test_none_compares_raw_pvalues_to_alpha() {
        let res = adjust(&contrast_problem(), ConfirmationMethod::None, 0.05).unwrap();

        // No rescaling: A's raw [0.01, 0.02, 0.03] are reported as-is
        let padj: Vec<f64> = res.hypotheses()[..3].iter().map(|h| h.padj.unwrap()).collect();
        for (a, e) in padj.iter().zip([0.01, 0.02, 0.03].iter()) {
            assert!((a - e).abs() < 1e-12);
        }
        assert!(res.hypotheses()[..3].iter().all(|h| h.significant == Some(true)));
        assert!(res.hypotheses()[3..].iter().all(|h| h.significant.is_none()));
    }

    #[test]
    fn test_user_adjustment_end_to_end() {
        let res = adjust(
            &contrast_problem(),
            ConfirmationMethod::User(vec![1.0, 1.0, 1.0]),
            0.05,
        )
        .unwrap();

        // Unit multipliers, then scale G / R = 3: padj <= alpha iff p <= alpha_I
        let expected = [0.03, 0.06, 0.09];
        for (h, e) in res.hypotheses()[..3].iter().zip(expected.iter()) {
            assert!((h.padj.unwrap() - e).abs() < 1e-12);
            assert_eq!(
                h.significant,
                Some(h.pvalue.unwrap() <= res.alpha_adjusted())
            );
        }
        assert_eq!(res.hypotheses()[0].significant, Some(true));
        assert_eq!(res.hypotheses()[1].significant, Some(false));
    }

    #[test]
    fn test_user_adjustment_length_checked() {
        let result = adjust(
            &contrast_problem(),
            ConfirmationMethod::User(vec![2.0, 1.0]),
            0.05,
        );
        assert!(matches!(result, Err(StageRError::InvalidAdjustment { .. })));
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            let result = adjust(&contrast_problem(), ConfirmationMethod::Holm, alpha);
            assert!(matches!(result, Err(StageRError::InvalidAlpha { .. })));
        }
    }

    #[test]
    fn test_rerun_is_identical() {
        let problem = contrast_problem();
        let a = adjust(&problem, ConfirmationMethod::Holm, 0.05).unwrap();
        let b = adjust(&problem, ConfirmationMethod::Holm, 0.05).unwrap();
        assert_eq!(a.hypotheses(), b.hypotheses());
        assert_eq!(a.padj_screen(), b.padj_screen());
    }

    #[test]
    fn test_different_alpha_recomputes() {
        let problem = contrast_problem();
        let strict = adjust(&problem, ConfirmationMethod::Holm, 0.05).unwrap();
        let loose = adjust(&problem, ConfirmationMethod::Holm, 0.4).unwrap();

        assert_eq!(strict.n_screen_passed(), 1);
        assert_eq!(loose.n_screen_passed(), 2);
        assert!(loose.hypotheses()[3].padj.is_some());
        assert!(strict.hypotheses()[3].padj.is_none());
        assert!((loose.alpha_adjusted() - 0.4 * 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_dtu_on_sub_units() {
        let res = adjust(&tx_problem(), ConfirmationMethod::Dtu, 0.05).unwrap();
        let by_id: HashMap<&str, &HypothesisResult> = res
            .hypotheses()
            .iter()
            .map(|h| (h.hypothesis_id.as_str(), h))
            .collect();

        // All genes pass, so alpha_I = alpha and no rescaling
        assert_eq!(res.n_screen_passed(), 3);
        // g1: k = 2, multipliers [1, 1]
        assert!((by_id["t1"].padj.unwrap() - 0.01).abs() < 1e-12);
        assert!((by_id["t2"].padj.unwrap() - 0.04).abs() < 1e-12);
        assert_eq!(by_id["t2"].significant, Some(true));
        // g2: k = 3, multipliers [1, 1, 1]; t3 is raised to the gene's screening padj
        assert!((by_id["t3"].padj.unwrap() - 0.003).abs() < 1e-12);
        assert!((by_id["t4"].padj.unwrap() - 0.02).abs() < 1e-12);
        assert!((by_id["t5"].padj.unwrap() - 0.6).abs() < 1e-12);
        // g3: single transcript
        assert!(by_id["t6"].padj.is_none());
        assert!(by_id["t6"].significant.is_none());
    }

    #[test]
    fn test_sub_unit_order_preserved() {
        let res = adjust(&tx_problem(), ConfirmationMethod::Holm, 0.05).unwrap();
        let order: Vec<&str> = res
            .hypotheses()
            .iter()
            .map(|h| h.hypothesis_id.as_str())
            .collect();
        assert_eq!(order, vec!["t1", "t3", "t2", "t4", "t5", "t6"]);
    }

    #[test]
    fn test_user_on_sub_units_requires_equal_sizes() {
        let result = adjust(&tx_problem(), ConfirmationMethod::User(vec![2.0, 1.0]), 0.05);
        assert!(matches!(result, Err(StageRError::InvalidAdjustment { .. })));
    }
}
