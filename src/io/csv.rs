//! Delimited-file reading and writing for p-value tables

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use super::results::{AdjustedPValueTable, SignificanceTable};
use crate::error::{Result, StageRError};

/// Identifier column plus one p-value per row
#[derive(Debug, Clone)]
pub struct PValueColumn {
    pub ids: Vec<String>,
    pub pvalues: Vec<f64>,
}

/// Identifier column plus a matrix of p-values with named columns
#[derive(Debug, Clone)]
pub struct PValueMatrix {
    pub row_ids: Vec<String>,
    pub column_names: Vec<String>,
    pub pvalues: Array2<f64>,
}

/// Detect tab or comma delimiter from the header line
fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;
    if header.trim().is_empty() {
        return Err(StageRError::EmptyData {
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(if header.contains('\t') { b'\t' } else { b',' })
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let delimiter = detect_delimiter(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

/// Parse a p-value cell; `NA`, `NaN` and empty cells become NaN
fn parse_pvalue(cell: &str, row_id: &str) -> Result<f64> {
    match cell {
        "" | "NA" | "NaN" | "nan" => Ok(f64::NAN),
        _ => cell.parse::<f64>().map_err(|_| StageRError::InvalidInput {
            reason: format!("Invalid p-value '{}' for '{}'", cell, row_id),
        }),
    }
}

/// Read screening p-values: first column IDs, second column p-values
pub fn read_screening<P: AsRef<Path>>(path: P) -> Result<PValueColumn> {
    let mut reader = open_reader(path.as_ref())?;
    let mut ids = Vec::new();
    let mut pvalues = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.len() < 2 {
            return Err(StageRError::InvalidInput {
                reason: format!("Screening row has {} columns, expected 2", record.len()),
            });
        }
        let id = record[0].to_string();
        pvalues.push(parse_pvalue(&record[1], &id)?);
        ids.push(id);
    }

    if ids.is_empty() {
        return Err(StageRError::EmptyData {
            reason: "No units found in screening file".to_string(),
        });
    }
    Ok(PValueColumn { ids, pvalues })
}

/// Read confirmation p-values: first column IDs, one column per hypothesis
pub fn read_confirmation<P: AsRef<Path>>(path: P) -> Result<PValueMatrix> {
    let mut reader = open_reader(path.as_ref())?;
    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(StageRError::InvalidInput {
            reason: "Confirmation file needs an ID column and at least one p-value column"
                .to_string(),
        });
    }
    let column_names: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
    let n_cols = column_names.len();

    let mut row_ids = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id = record[0].to_string();
        for cell in record.iter().skip(1) {
            values.push(parse_pvalue(cell, &id)?);
        }
        row_ids.push(id);
    }

    if row_ids.is_empty() {
        return Err(StageRError::EmptyData {
            reason: "No rows found in confirmation file".to_string(),
        });
    }

    let pvalues = Array2::from_shape_vec((row_ids.len(), n_cols), values).map_err(|e| {
        StageRError::DimensionMismatch {
            expected: format!("{} x {} confirmation matrix", row_ids.len(), n_cols),
            got: e.to_string(),
        }
    })?;

    Ok(PValueMatrix {
        row_ids,
        column_names,
        pvalues,
    })
}

/// Read a sub-unit to unit map: first column sub-unit IDs, second column unit IDs
pub fn read_sub_unit_map<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let mut reader = open_reader(path.as_ref())?;
    let mut map = HashMap::new();

    for record in reader.records() {
        let record = record?;
        if record.len() < 2 {
            return Err(StageRError::InvalidInput {
                reason: format!("Map row has {} columns, expected 2", record.len()),
            });
        }
        let sub_unit = record[0].to_string();
        let unit = record[1].to_string();
        if let Some(previous) = map.get(&sub_unit) {
            if previous != &unit {
                return Err(StageRError::InvalidInput {
                    reason: format!(
                        "Sub-unit '{}' maps to both '{}' and '{}'",
                        sub_unit, previous, unit
                    ),
                });
            }
            continue;
        }
        map.insert(sub_unit, unit);
    }

    Ok(map)
}

fn format_padj(p: Option<f64>) -> String {
    match p {
        Some(p) => format!("{:.6e}", p),
        None => "NA".to_string(),
    }
}

/// Write an adjusted p-value table as TSV; untested entries are written as `NA`
pub fn write_adjusted_pvalues<P: AsRef<Path>>(path: P, table: &AdjustedPValueTable) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let has_sub_units = table.rows.iter().any(|r| r.sub_unit_id.is_some());
    let mut header = vec!["unit_id".to_string()];
    if has_sub_units {
        header.push("sub_unit_id".to_string());
    }
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![row.unit_id.clone()];
        if has_sub_units {
            record.push(row.sub_unit_id.clone().unwrap_or_default());
        }
        record.push(format_padj(Some(row.padj_screen)));
        record.extend(row.padj.iter().map(|&p| format_padj(p)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a binary significance table as TSV
pub fn write_significance<P: AsRef<Path>>(path: P, table: &SignificanceTable) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let mut header = vec!["unit_id".to_string()];
    if table.sub_unit_ids.is_some() {
        header.push("sub_unit_id".to_string());
    }
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header)?;

    for (r, row) in table.matrix.outer_iter().enumerate() {
        let mut record = vec![table.unit_ids[r].clone()];
        if let Some(sub_unit_ids) = &table.sub_unit_ids {
            record.push(sub_unit_ids[r].clone());
        }
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_screening_tab() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\tpScreen").unwrap();
        writeln!(file, "g1\t0.001").unwrap();
        writeln!(file, "g2\t0.2").unwrap();

        let screen = read_screening(file.path()).unwrap();
        assert_eq!(screen.ids, vec!["g1", "g2"]);
        assert_eq!(screen.pvalues, vec![0.001, 0.2]);
    }

    #[test]
    fn test_read_confirmation_csv_with_na() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id,contrast1,contrast2").unwrap();
        writeln!(file, "g1,0.01,NA").unwrap();
        writeln!(file, "g2,0.5,0.04").unwrap();

        let conf = read_confirmation(file.path()).unwrap();
        assert_eq!(conf.column_names, vec!["contrast1", "contrast2"]);
        assert_eq!(conf.pvalues.dim(), (2, 2));
        assert!(conf.pvalues[[0, 1]].is_nan());
        assert_eq!(conf.pvalues[[1, 1]], 0.04);
    }

    #[test]
    fn test_read_confirmation_rejects_bad_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id,contrast1").unwrap();
        writeln!(file, "g1,abc").unwrap();

        assert!(read_confirmation(file.path()).is_err());
    }

    #[test]
    fn test_read_sub_unit_map_conflict() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "tx_id\tgene_id").unwrap();
        writeln!(file, "t1\tg1").unwrap();
        writeln!(file, "t1\tg2").unwrap();

        assert!(matches!(
            read_sub_unit_map(file.path()),
            Err(StageRError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            read_screening(file.path()),
            Err(StageRError::EmptyData { .. })
        ));
    }

    #[test]
    fn test_write_adjusted_pvalues() {
        use crate::io::AdjustedRow;

        let table = AdjustedPValueTable {
            columns: vec!["padjScreen".to_string(), "c1".to_string()],
            rows: vec![
                AdjustedRow {
                    unit_id: "g1".to_string(),
                    sub_unit_id: None,
                    padj_screen: 0.01,
                    padj: vec![Some(0.02)],
                },
                AdjustedRow {
                    unit_id: "g2".to_string(),
                    sub_unit_id: None,
                    padj_screen: 0.5,
                    padj: vec![None],
                },
            ],
        };

        let file = NamedTempFile::new().unwrap();
        write_adjusted_pvalues(file.path(), &table).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines[0], "unit_id\tpadjScreen\tc1");
        assert!(lines[1].starts_with("g1\t1.000000e-2"));
        assert!(lines[2].ends_with("\tNA"));
    }
}
