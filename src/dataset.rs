//! Training dataset loading and cleaning for artifact preparation.
//!
//! Reads the UCI heart CSV, profiles it, fills gaps with column medians and
//! caps outliers with the 1.5·IQR rule before the scaler is fitted.

use crate::types::patient::{FEATURE_COUNT, FEATURE_NAMES};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Numeric table with the 13 feature columns and the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Feature rows in canonical column order; `None` for missing cells
    pub rows: Vec<[Option<f64>; FEATURE_COUNT]>,
    pub targets: Vec<Option<f64>>,
}

/// Summary produced before cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetProfile {
    pub rows: usize,
    /// Missing or non-numeric cells per feature column
    pub missing: [usize; FEATURE_COUNT],
    pub missing_targets: usize,
    pub duplicates: usize,
    pub positives: usize,
    pub negatives: usize,
}

/// Outliers clipped per column.
pub type CapReport = [usize; FEATURE_COUNT];

fn parse_cell(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw == "?" {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Dataset {
    /// Load a CSV with a header row naming every feature column and the target.
    pub fn load_csv<P: AsRef<Path>>(path: P, target: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open dataset {:?}", path))?;

        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut columns = [0usize; FEATURE_COUNT];
        for (slot, name) in columns.iter_mut().zip(FEATURE_NAMES) {
            *slot = position(name)
                .with_context(|| format!("Dataset {:?} has no column '{}'", path, name))?;
        }
        let target_column = position(target)
            .with_context(|| format!("Dataset {:?} has no target column '{}'", path, target))?;

        let mut dataset = Dataset {
            rows: Vec::new(),
            targets: Vec::new(),
        };
        for (line, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Malformed CSV record at data row {}", line + 1))?;
            let mut row = [None; FEATURE_COUNT];
            for (cell, &col) in row.iter_mut().zip(&columns) {
                *cell = record.get(col).and_then(parse_cell);
            }
            dataset.rows.push(row);
            dataset
                .targets
                .push(record.get(target_column).and_then(parse_cell));
        }

        if dataset.is_empty() {
            anyhow::bail!("Dataset {:?} has no rows", path);
        }
        info!(path = %path.display(), rows = dataset.len(), "Dataset loaded");
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn profile(&self) -> DatasetProfile {
        let mut profile = DatasetProfile {
            rows: self.len(),
            ..DatasetProfile::default()
        };

        let mut seen = HashSet::new();
        for (row, target) in self.rows.iter().zip(&self.targets) {
            for (count, cell) in profile.missing.iter_mut().zip(row) {
                if cell.is_none() {
                    *count += 1;
                }
            }
            match target {
                Some(t) if *t != 0.0 => profile.positives += 1,
                Some(_) => profile.negatives += 1,
                None => profile.missing_targets += 1,
            }

            let key: Vec<Option<u64>> = row
                .iter()
                .chain(std::iter::once(target))
                .map(|c| c.map(f64::to_bits))
                .collect();
            if !seen.insert(key) {
                profile.duplicates += 1;
            }
        }
        profile
    }

    /// Fill missing cells with the column median and return dense rows.
    pub fn fill_missing(&self) -> Result<Vec<[f64; FEATURE_COUNT]>> {
        let mut medians = [0.0; FEATURE_COUNT];
        for (i, (median, name)) in medians.iter_mut().zip(FEATURE_NAMES).enumerate() {
            let mut present: Vec<f64> = self.rows.iter().filter_map(|r| r[i]).collect();
            present.sort_by(f64::total_cmp);
            *median = quantile(&present, 0.5)
                .with_context(|| format!("Column '{}' has no numeric values", name))?;
        }

        Ok(self
            .rows
            .iter()
            .map(|row| {
                let mut dense = [0.0; FEATURE_COUNT];
                for (i, value) in dense.iter_mut().enumerate() {
                    *value = row[i].unwrap_or(medians[i]);
                }
                dense
            })
            .collect())
    }
}

/// Linear-interpolated quantile of sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Clip every column to `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]`.
pub fn cap_outliers(rows: &mut [[f64; FEATURE_COUNT]]) -> CapReport {
    let mut report = [0; FEATURE_COUNT];

    for (col, capped) in report.iter_mut().enumerate() {
        let mut values: Vec<f64> = rows.iter().map(|r| r[col]).collect();
        values.sort_by(f64::total_cmp);
        let (Some(q1), Some(q3)) = (quantile(&values, 0.25), quantile(&values, 0.75)) else {
            continue;
        };
        let iqr = q3 - q1;
        let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        for row in rows.iter_mut() {
            if row[col] < lower || row[col] > upper {
                row[col] = row[col].clamp(lower, upper);
                *capped += 1;
            }
        }
        if *capped > 0 {
            info!(column = FEATURE_NAMES[col], outliers = *capped, lower, upper, "Capped outliers");
        }
    }
    report
}

impl DatasetProfile {
    pub fn log(&self) {
        info!(
            rows = self.rows,
            duplicates = self.duplicates,
            positives = self.positives,
            negatives = self.negatives,
            "Dataset profile"
        );
        for (name, &missing) in FEATURE_NAMES.iter().zip(&self.missing) {
            if missing > 0 {
                warn!(column = name, missing, "Missing or non-numeric cells");
            }
        }
        if self.missing_targets > 0 {
            warn!(missing = self.missing_targets, "Rows without a target value");
        }
    }
}
