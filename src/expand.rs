//! Recursive formula expansion.
//!
//! A calculated indicator's formula references other indicators as
//! `i<code>` tokens. The [`Expander`] rewrites such a formula in terms of
//! base (measured) indicators only, substituting every calculated reference
//! with its own parenthesized expansion and collecting the base codes
//! reached along the way.
//!
//! Cycles terminate: a code already being expanded on the current path is
//! left as an inert `i<code>` placeholder and contributes no base codes.
//! Unknown codes are treated the same way.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::model::IndicatorIndex;

/// Compile the formula-reference pattern for a given prefix (default `i`).
/// The first capture group is the referenced code. Word boundaries keep the
/// pattern from matching inside longer identifiers such as `ind10`.
pub fn reference_regex(prefix: &str) -> Regex {
    // The prefix is escaped, so the pattern is always valid.
    Regex::new(&format!(r"\b{}(\d+)\b", regex::escape(prefix))).unwrap()
}

/// Result of expanding one indicator code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expansion {
    /// The code that was expanded.
    pub code: String,
    /// Formula with every calculated reference substituted down to base
    /// placeholders (`i<code>`). For a base or unknown code this is just
    /// the placeholder itself.
    pub expression: String,
    /// Base codes transitively required, deduplicated, in first-appearance
    /// order. Appearance order is what makes downstream block emission
    /// deterministic.
    pub base_codes: Vec<String>,
}

/// Expands calculated-indicator formulas against a read-only index.
#[derive(Debug)]
pub struct Expander<'a> {
    index: &'a IndicatorIndex,
    reference: Regex,
    prefix: String,
}

impl<'a> Expander<'a> {
    pub fn new(index: &'a IndicatorIndex, prefix: &str) -> Self {
        Self {
            index,
            reference: reference_regex(prefix),
            prefix: prefix.to_string(),
        }
    }

    /// The compiled reference pattern, shared with dependency analysis.
    pub fn reference(&self) -> &Regex {
        &self.reference
    }

    /// Expand one code. Every call starts from clean state; accumulators
    /// are never reused across unrelated codes.
    pub fn expand(&self, code: &str) -> Expansion {
        let mut path = HashSet::new();
        let mut base_codes = Vec::new();
        let mut seen = HashSet::new();
        let expression = self.expand_inner(code, &mut path, &mut base_codes, &mut seen);
        Expansion {
            code: code.to_string(),
            expression,
            base_codes,
        }
    }

    fn placeholder(&self, code: &str) -> String {
        format!("{}{}", self.prefix, code)
    }

    fn expand_inner(
        &self,
        code: &str,
        path: &mut HashSet<String>,
        base_codes: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) -> String {
        // Cycle: this code is already being expanded further up the path.
        if path.contains(code) {
            return self.placeholder(code);
        }

        let indicator = match self.index.get(code) {
            Some(ind) => ind,
            // Unknown code: unresolvable leaf, not a base indicator.
            None => return self.placeholder(code),
        };

        let expr = match &indicator.expression {
            Some(expr) if !indicator.is_base() => expr.clone(),
            // Base indicator (or calculated with a missing formula).
            _ => {
                if seen.insert(code.to_string()) {
                    base_codes.push(code.to_string());
                }
                return self.placeholder(code);
            }
        };

        path.insert(code.to_string());

        let mut out = String::with_capacity(expr.len());
        let mut last = 0;
        for cap in self.reference.captures_iter(&expr) {
            let whole = cap.get(0).expect("capture 0 always present");
            let referenced = &cap[1];
            out.push_str(&expr[last..whole.start()]);
            let sub = self.expand_inner(referenced, path, base_codes, seen);
            out.push('(');
            out.push_str(&sub);
            out.push(')');
            last = whole.end();
        }
        out.push_str(&expr[last..]);

        // Path set, not a visited set: siblings may expand this code again.
        path.remove(code);

        out
    }
}
