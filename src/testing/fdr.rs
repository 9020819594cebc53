//! P-value adjustment for the screening stage
//!
//! Benjamini-Hochberg step-up FDR correction over all units jointly.

use std::cmp::Ordering;

/// Apply Benjamini-Hochberg FDR correction to p-values
///
/// Returns adjusted p-values (q-values) in input order. NaN inputs stay NaN
/// and do not count towards the number of tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    // Ascending order with NaN last; stable so ties keep input order
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| match (pvalues[a].is_nan(), pvalues[b].is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => pvalues[a].total_cmp(&pvalues[b]),
    });

    let m = pvalues.iter().filter(|p| !p.is_nan()).count();
    let mut padj = vec![f64::NAN; n];
    if m == 0 {
        return padj;
    }

    // Step-up: running minimum from the largest p-value down
    let mut cummin = f64::INFINITY;
    for (rank, &i) in indices[..m].iter().enumerate().rev() {
        let adj = (pvalues[i] * m as f64 / (rank + 1) as f64).min(1.0);
        cummin = cummin.min(adj);
        padj[i] = cummin;
    }

    padj
}
