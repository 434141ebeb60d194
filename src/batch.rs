//! Batch driver.
//!
//! Splits the SQL document on the unit separator, rewrites each unit
//! independently, and rejoins with the same separator. Unit count and
//! order are preserved exactly: a failed unit passes through unchanged
//! with a diagnostic instead of aborting the batch.
//!
//! Units share nothing but the read-only [`IndicatorIndex`]; all per-unit
//! state lives inside the rewriter call.

use std::fmt;

use serde::Serialize;

use crate::config::Settings;
use crate::model::IndicatorIndex;
use crate::rewrite::{Rewriter, UnitReport};

/// Diagnostics for one document run. Advisory only; the rewritten SQL is
/// the product.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    pub fn has_warnings(&self) -> bool {
        self.units.iter().any(|u| !u.warnings.is_empty())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printed = false;
        for unit in &self.units {
            if unit.is_empty() {
                continue;
            }
            if printed {
                writeln!(f)?;
            }
            write!(f, "{}", unit)?;
            printed = true;
        }
        if !printed {
            writeln!(f, "No lookup call sites found.")?;
        }
        Ok(())
    }
}

/// Which rewrite operation the driver applies to every unit.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Rewrite,
    Inline,
}

/// Formula-expanding rewrite of a whole document.
pub fn rewrite_document(
    index: &IndicatorIndex,
    settings: &Settings,
    sql: &str,
) -> (String, BatchReport) {
    run(index, settings, sql, Mode::Rewrite)
}

/// Direct (no-expansion) rewrite of a whole document.
pub fn inline_document(
    index: &IndicatorIndex,
    settings: &Settings,
    sql: &str,
) -> (String, BatchReport) {
    run(index, settings, sql, Mode::Inline)
}

fn run(index: &IndicatorIndex, settings: &Settings, sql: &str, mode: Mode) -> (String, BatchReport) {
    let rewriter = Rewriter::new(index, settings);
    let separator = settings.rewrite.separator.as_str();

    let mut rewritten: Vec<String> = Vec::new();
    let mut report = BatchReport::default();

    for (n, unit) in sql.split(separator).enumerate() {
        let result = match mode {
            Mode::Rewrite => rewriter.rewrite_unit(unit),
            Mode::Inline => rewriter.inline_unit(unit),
        };
        match result {
            Ok((text, mut unit_report)) => {
                unit_report.unit = n;
                rewritten.push(text);
                report.units.push(unit_report);
            }
            Err(err) => {
                rewritten.push(unit.to_string());
                report.units.push(UnitReport {
                    unit: n,
                    warnings: vec![format!("unit left unchanged: {}", err)],
                    ..UnitReport::default()
                });
            }
        }
    }

    (rewritten.join(separator), report)
}
