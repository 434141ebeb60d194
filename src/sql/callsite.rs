//! Discovery of indicator-lookup call sites in SQL text.
//!
//! Two shapes are recognized:
//!
//! - the JSON lookup used by the query rewriter,
//!   `json_build_array('get-indicator-value', <object>, '<code>', <start>, <end>)`,
//!   usually aliased `AS ind<code>`;
//! - the direct lookup functions replaced in place by the inliner,
//!   `monitoring.indicator_value_on_year(<object>, .., '<code>', <year>)` and
//!   `monitoring.indicator_value_on_period(<object>, .., '<code>', '<start>', '<end>')`.
//!
//! Matching is a head regex plus a quote-aware balanced-parenthesis scan;
//! the interior is split with [`split_call_args`]. This is not SQL parsing
//! and is not meant to be.

use std::collections::HashSet;
use std::ops::Range;

use regex::Regex;
use thiserror::Error;

use crate::config::{InlineSettings, RewriteSettings};

use super::args::{split_call_args, strip_quotes, ArgsError};

/// Structural errors found while scanning call sites. Any of these fails
/// the containing query unit's rewrite; sibling units are unaffected.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("call at byte {offset}: {source}")]
    Args {
        offset: usize,
        #[source]
        source: ArgsError,
    },

    #[error("call at byte {offset} is never closed")]
    UnterminatedCall { offset: usize },

    #[error("lookup call at byte {offset}: expected {expected} arguments, found {found}")]
    MalformedLookup {
        offset: usize,
        expected: usize,
        found: usize,
    },
}

/// One JSON lookup call site.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupCall {
    /// Byte range of the replaceable extent: the call plus, when present,
    /// its `AS ind<code>` alias and the trailing comma.
    pub span: Range<usize>,
    /// Monitoring-object expression (second argument).
    pub object: String,
    /// Indicator code (third argument, quotes stripped).
    pub code: String,
    /// Period window (fourth and fifth arguments, verbatim).
    pub period_start: String,
    pub period_end: String,
    /// Code from the `AS ind<code>` alias, when the alias was found.
    pub alias_code: Option<String>,
    /// Whether the matched extent ended with a comma.
    pub trailing_comma: bool,
}

/// Time-window argument of a direct lookup call.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowArg {
    /// Year expression, verbatim.
    Year(String),
    /// Period bounds, verbatim (usually quoted date literals).
    Period { start: String, end: String },
}

/// One direct lookup call site (inliner shapes).
#[derive(Debug, Clone, PartialEq)]
pub struct InlineCall {
    /// Byte range of the call expression itself.
    pub span: Range<usize>,
    /// Monitoring-object expression (first argument).
    pub object: String,
    /// Indicator code (third argument, quotes stripped).
    pub code: String,
    pub window: WindowArg,
}

/// Compiled call-site patterns for one configuration.
#[derive(Debug)]
pub struct CallSiteScanner {
    lookup_head: Regex,
    alias_after: Regex,
    aliased: Regex,
    year_head: Regex,
    period_head: Regex,
    marker: String,
}

impl CallSiteScanner {
    pub fn new(rewrite: &RewriteSettings, inline: &InlineSettings) -> Self {
        // All names are escaped, so the patterns are always valid.
        let head = |name: &str| {
            Regex::new(&format!(r"(?i)\b{}\s*\(", regex::escape(name))).unwrap()
        };
        let alias = regex::escape(&rewrite.alias_prefix);
        Self {
            lookup_head: head(&rewrite.lookup_function),
            alias_after: Regex::new(&format!(r"(?i)^\s*AS\s+{}(\d+)(\s*,)?", alias)).unwrap(),
            aliased: Regex::new(&format!(r"(?i)\bAS\s+{}(\d+)", alias)).unwrap(),
            year_head: head(&inline.year_function),
            period_head: head(&inline.period_function),
            marker: rewrite.lookup_marker.clone(),
        }
    }

    /// Codes already materialized under an `AS ind<code>` alias anywhere in
    /// the text.
    pub fn aliased_codes(&self, sql: &str) -> HashSet<String> {
        self.aliased
            .captures_iter(sql)
            .map(|cap| cap[1].to_string())
            .collect()
    }

    /// Find every JSON lookup call site, in text order. Calls of the lookup
    /// function whose first argument is not the marker literal are skipped:
    /// the function is a general-purpose one and not every call is a lookup.
    pub fn lookup_calls(&self, sql: &str) -> Result<Vec<LookupCall>, ScanError> {
        let mut calls = Vec::new();
        let mut at = 0;

        while let Some(head) = self.lookup_head.find_at(sql, at) {
            let offset = head.start();
            let open = head.end();
            let close = find_close(sql, open)
                .ok_or(ScanError::UnterminatedCall { offset })?;
            at = close + 1;

            let args = split_call_args(&sql[open..close])
                .map_err(|source| ScanError::Args { offset, source })?;

            match args.first() {
                Some(first) if strip_quotes(first) == self.marker => {}
                _ => continue,
            }
            if args.len() != 5 {
                return Err(ScanError::MalformedLookup {
                    offset,
                    expected: 5,
                    found: args.len(),
                });
            }

            let call_end = close + 1;
            let (span_end, alias_code, trailing_comma) =
                match self.alias_after.captures(&sql[call_end..]) {
                    Some(cap) => {
                        let whole = cap.get(0).expect("capture 0 always present");
                        (
                            call_end + whole.end(),
                            Some(cap[1].to_string()),
                            cap.get(2).is_some(),
                        )
                    }
                    None => (call_end, None, false),
                };

            calls.push(LookupCall {
                span: offset..span_end,
                object: args[1].clone(),
                code: strip_quotes(&args[2]).to_string(),
                period_start: args[3].clone(),
                period_end: args[4].clone(),
                alias_code,
                trailing_comma,
            });
        }

        Ok(calls)
    }

    /// Find every direct lookup call site (both shapes), in text order.
    pub fn inline_calls(&self, sql: &str) -> Result<Vec<InlineCall>, ScanError> {
        let mut calls = Vec::new();
        self.scan_inline(sql, &self.year_head, 4, &mut calls)?;
        self.scan_inline(sql, &self.period_head, 5, &mut calls)?;
        calls.sort_by_key(|c| c.span.start);
        Ok(calls)
    }

    fn scan_inline(
        &self,
        sql: &str,
        pattern: &Regex,
        arity: usize,
        calls: &mut Vec<InlineCall>,
    ) -> Result<(), ScanError> {
        let mut at = 0;

        while let Some(head) = pattern.find_at(sql, at) {
            let offset = head.start();
            let open = head.end();
            let close = find_close(sql, open)
                .ok_or(ScanError::UnterminatedCall { offset })?;
            at = close + 1;

            let args = split_call_args(&sql[open..close])
                .map_err(|source| ScanError::Args { offset, source })?;
            if args.len() != arity {
                return Err(ScanError::MalformedLookup {
                    offset,
                    expected: arity,
                    found: args.len(),
                });
            }

            let window = if arity == 4 {
                WindowArg::Year(args[3].clone())
            } else {
                WindowArg::Period {
                    start: args[3].clone(),
                    end: args[4].clone(),
                }
            };

            calls.push(InlineCall {
                span: offset..close + 1,
                object: args[0].clone(),
                code: strip_quotes(&args[2]).to_string(),
                window,
            });
        }

        Ok(())
    }
}

/// Find the `)` matching an already-consumed `(`, honoring quotes and
/// backslash escapes so parentheses inside string literals do not count.
/// `open` is the byte position just past the `(`.
fn find_close(sql: &str, open: usize) -> Option<usize> {
    let mut depth: u32 = 1;
    let mut quote: Option<char> = None;
    let mut escape = false;

    for (pos, ch) in sql[open..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if ch == '\\' {
            escape = true;
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + pos);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract the `YYYY` year from a period-start argument, which is normally
/// a quoted `'YYYY-MM-DD'` literal. A bare year is accepted too. Returns
/// `None` for anything else (computed expressions, parameters).
pub fn year_from_start(start: &str) -> Option<String> {
    let literal = strip_quotes(start);
    let digits: String = literal.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    match literal.as_bytes().get(4) {
        None | Some(b'-') => Some(digits),
        _ => None,
    }
}
