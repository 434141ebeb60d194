//! Per-unit SQL rewriting.
//!
//! [`Rewriter`] carries the compiled patterns and the formula expander for
//! one run and exposes the two rewrite operations:
//!
//! - [`Rewriter::rewrite_unit`] - the formula-expanding rewrite. Lookup call
//!   sites are discovered, their codes expanded to base indicators, and the
//!   unit-wide pool of missing aggregation blocks is materialized at the
//!   first aliased call site; later call sites are removed because the pool
//!   already covers them. Codes aliased elsewhere in the unit are never
//!   re-emitted.
//! - [`Rewriter::inline_unit`] - the direct rewrite. Each
//!   `indicator_value_on_year`/`indicator_value_on_period` call is replaced
//!   in place by the aggregation subquery, with no expansion and no alias
//!   bookkeeping.
//!
//! Both are best-effort: a structural scan error fails only the unit it
//! occurred in, and an unresolvable call site becomes a warning, never an
//! error.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::expand::{Expander, Expansion};
use crate::model::IndicatorIndex;
use crate::sql::blocks;
use crate::sql::callsite::{year_from_start, CallSiteScanner, LookupCall, ScanError, WindowArg};

/// Errors that fail one query unit's rewrite.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("call-site scan failed: {0}")]
    Scan(#[from] ScanError),
}

/// Result type for unit rewriting.
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Diagnostics for one query unit. Advisory only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitReport {
    /// Zero-based position of the unit in the document.
    pub unit: usize,
    /// Expanded formula per discovered code, in discovery order.
    pub formulas: Vec<Expansion>,
    /// Unit-wide pool of base codes, in first-appearance order.
    pub pooled_base_codes: Vec<String>,
    /// Base codes for which a block was emitted, in pool order.
    pub emitted: Vec<String>,
    /// Pooled base codes skipped because an alias already existed.
    pub already_present: Vec<String>,
    /// Substitution sites that could not be resolved, and other advisories.
    pub warnings: Vec<String>,
}

impl UnitReport {
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty() && self.emitted.is_empty() && self.warnings.is_empty()
    }
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Query unit {} ==", self.unit)?;
        if !self.formulas.is_empty() {
            writeln!(f, "Expanded formulas:")?;
            for exp in &self.formulas {
                writeln!(f, "  {}: {}", exp.code, exp.expression)?;
            }
        }
        if !self.pooled_base_codes.is_empty() {
            writeln!(f, "Base indicators: {}", self.pooled_base_codes.join(", "))?;
        }
        if !self.emitted.is_empty() {
            writeln!(f, "New blocks: {}", self.emitted.join(", "))?;
        }
        if !self.already_present.is_empty() {
            writeln!(f, "Already aliased: {}", self.already_present.join(", "))?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for w in &self.warnings {
                writeln!(f, "  - {}", w)?;
            }
        }
        Ok(())
    }
}

/// One run's rewriting engine over a read-only indicator index.
#[derive(Debug)]
pub struct Rewriter<'a> {
    expander: Expander<'a>,
    scanner: CallSiteScanner,
    settings: &'a Settings,
}

impl<'a> Rewriter<'a> {
    pub fn new(index: &'a IndicatorIndex, settings: &'a Settings) -> Self {
        Self {
            expander: Expander::new(index, &settings.rewrite.reference_prefix),
            scanner: CallSiteScanner::new(&settings.rewrite, &settings.inline),
            settings,
        }
    }

    /// Formula-expanding rewrite of one query unit.
    pub fn rewrite_unit(&self, unit: &str) -> RewriteResult<(String, UnitReport)> {
        let calls = self.scanner.lookup_calls(unit)?;
        let mut report = UnitReport::default();
        if calls.is_empty() {
            return Ok((unit.to_string(), report));
        }

        // Codes aliased *elsewhere* in the unit. The discovered call sites'
        // own aliases are masked out: they are about to be replaced, so they
        // must not suppress their own blocks.
        let aliased = self.aliased_elsewhere(unit, &calls);

        // Expansion: pool base codes in first-appearance order.
        let mut pool: Vec<String> = Vec::new();
        let mut pooled: HashSet<String> = HashSet::new();
        for call in &calls {
            let expansion = self.expander.expand(&call.code);
            for code in &expansion.base_codes {
                if pooled.insert(code.clone()) {
                    pool.push(code.clone());
                }
            }
            report.formulas.push(expansion);
        }
        report.pooled_base_codes = pool.clone();

        let (pending, present): (Vec<String>, Vec<String>) =
            pool.into_iter().partition(|c| !aliased.contains(c));
        report.already_present = present;

        // All blocks are materialized at one anchor call site, using its
        // monitoring object and time window: the first aliased site whose
        // period start yields a year. Aliased sites with an unparseable
        // window are warned and skipped as anchor candidates.
        let mut anchor = None;
        for (i, call) in calls.iter().enumerate() {
            if call.alias_code.is_none() {
                continue;
            }
            match year_from_start(&call.period_start) {
                Some(year) => {
                    anchor = Some((i, year));
                    break;
                }
                None => report.warnings.push(format!(
                    "cannot determine year from period start {} at byte {}; site skipped",
                    call.period_start, call.span.start,
                )),
            }
        }
        let (anchor, year) = match anchor {
            Some(found) => found,
            None => {
                for call in &calls {
                    if call.alias_code.is_none() {
                        report.warnings.push(Self::unresolved(call));
                    }
                }
                return Ok((unit.to_string(), report));
            }
        };

        let object = calls[anchor].object.clone();
        let rendered: Vec<String> = pending
            .iter()
            .map(|code| {
                blocks::aliased_block(
                    &self.settings.schema,
                    &self.settings.rewrite.alias_prefix,
                    &object,
                    code,
                    &year,
                )
            })
            .collect();
        report.emitted = pending;

        // Substitution by span splicing, in text order.
        let mut out = String::with_capacity(unit.len());
        let mut last = 0;
        for (i, call) in calls.iter().enumerate() {
            if call.alias_code.is_none() {
                report.warnings.push(Self::unresolved(call));
                continue;
            }
            out.push_str(&unit[last..call.span.start]);
            if i == anchor && !rendered.is_empty() {
                out.push_str(&rendered.join(",\n"));
                if call.trailing_comma {
                    out.push(',');
                }
            }
            last = call.span.end;
        }
        out.push_str(&unit[last..]);

        Ok((out, report))
    }

    /// Direct (no-expansion) rewrite of one query unit.
    pub fn inline_unit(&self, unit: &str) -> RewriteResult<(String, UnitReport)> {
        let calls = self.scanner.inline_calls(unit)?;
        let mut report = UnitReport::default();

        let mut out = String::with_capacity(unit.len());
        let mut last = 0;
        for call in &calls {
            // A call nested inside an already-replaced call's argument list
            // has a span starting before the splice cursor. Skip it: its
            // text is gone.
            if call.span.start < last {
                report.warnings.push(format!(
                    "lookup call for indicator '{}' at byte {} overlaps an already replaced call; left unresolved",
                    call.code, call.span.start,
                ));
                continue;
            }
            let year = match &call.window {
                WindowArg::Year(year) => Some(crate::sql::args::strip_quotes(year).to_string()),
                WindowArg::Period { start, .. } => year_from_start(start),
            };
            let year = match year {
                Some(year) => year,
                None => {
                    report.warnings.push(format!(
                        "cannot determine year for indicator '{}' at byte {}; call left unresolved",
                        call.code, call.span.start,
                    ));
                    continue;
                }
            };

            out.push_str(&unit[last..call.span.start]);
            out.push_str(&blocks::measure_subquery(
                &self.settings.schema,
                &call.object,
                &call.code,
                &year,
            ));
            last = call.span.end;
            report.emitted.push(call.code.clone());
        }
        out.push_str(&unit[last..]);

        Ok((out, report))
    }

    /// Aliased codes in the unit with the discovered call extents masked
    /// out, so only aliases *elsewhere* count as already materialized.
    fn aliased_elsewhere(&self, unit: &str, calls: &[LookupCall]) -> HashSet<String> {
        let mut masked = unit.to_string();
        for call in calls {
            masked.replace_range(call.span.clone(), &" ".repeat(call.span.len()));
        }
        self.scanner.aliased_codes(&masked)
    }

    fn unresolved(call: &LookupCall) -> String {
        format!(
            "lookup call for indicator '{}' at byte {} has no indicator alias; left unresolved",
            call.code, call.span.start,
        )
    }
}
