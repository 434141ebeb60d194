//! Indicator metadata types and the in-memory index.
//!
//! The [`IndicatorIndex`] is built once per run from an XML metadata
//! document (see [`loader`]) and is read-only afterward. Every other
//! component borrows it.

pub mod graph;
pub mod loader;

pub use loader::{load_indicators, LoadError};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How an indicator's value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorKind {
    /// Value is a formula over other indicators.
    Calculated,
    /// Measured value accumulated within a period (summed).
    Progressive,
    /// Measured value; the most recent measurement wins.
    LastDate,
}

impl IndicatorKind {
    /// Parse the metadata `type` attribute.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CALCULATED" => Some(IndicatorKind::Calculated),
            "PROGRESSIVE" => Some(IndicatorKind::Progressive),
            "LAST_DATE" => Some(IndicatorKind::LastDate),
            _ => None,
        }
    }
}

/// One indicator definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// Unique code, the key in the index.
    pub code: String,
    pub kind: IndicatorKind,
    /// Defining formula; present only when `kind == Calculated`.
    /// References other indicators as `i<code>` tokens.
    pub expression: Option<String>,
}

impl Indicator {
    /// A *base* indicator has no formula: its value comes from stored
    /// measurements. A calculated indicator with a missing expression is
    /// treated as base too.
    pub fn is_base(&self) -> bool {
        self.kind != IndicatorKind::Calculated || self.expression.is_none()
    }
}

/// Read-only mapping from indicator code to its definition.
#[derive(Debug, Clone, Default)]
pub struct IndicatorIndex {
    indicators: HashMap<String, Indicator>,
}

impl IndicatorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, replacing any previous one for the same code.
    pub fn insert(&mut self, indicator: Indicator) {
        self.indicators.insert(indicator.code.clone(), indicator);
    }

    pub fn get(&self, code: &str) -> Option<&Indicator> {
        self.indicators.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.indicators.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// All definitions, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        self.indicators.values()
    }

    /// Codes sorted numerically where possible, lexically otherwise.
    /// Used by diagnostics so listings are stable across runs.
    pub fn sorted_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.indicators.keys().map(String::as_str).collect();
        codes.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });
        codes
    }
}

impl FromIterator<Indicator> for IndicatorIndex {
    fn from_iter<T: IntoIterator<Item = Indicator>>(iter: T) -> Self {
        let mut index = Self::new();
        for ind in iter {
            index.insert(ind);
        }
        index
    }
}
