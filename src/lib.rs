//! # indsql
//!
//! Rewrites SQL query text that references externally-defined monitoring
//! *indicators*, replacing opaque lookup function calls with inline
//! aggregation subqueries. Indicators whose value is a formula over other
//! indicators are expanded down to base (measured) indicators first.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │      Indicator metadata (XML)        SQL document         │
//! └──────────────────────────────────────────────────────────┘
//!              │                              │
//!              ▼ [model::loader]              ▼ [batch: split on separator]
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  IndicatorIndex          │   │  Query units             │
//! │  (code → definition)     │   │  (independent SQL text)  │
//! └──────────────────────────┘   └──────────────────────────┘
//!              │                              │
//!              └──────────────┬───────────────┘
//!                             ▼ [rewrite, per unit]
//!          discover lookup call sites → expand formulas
//!          → pool base codes → emit aggregation blocks
//!                             │
//!                             ▼ [batch: rejoin with separator]
//! ┌──────────────────────────────────────────────────────────┐
//! │      Rewritten SQL document + diagnostics report          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is textual: it pattern-matches a fixed set of call shapes and
//! never parses general SQL grammar.

pub mod batch;
pub mod config;
pub mod expand;
pub mod model;
pub mod rewrite;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::batch::{inline_document, rewrite_document, BatchReport};
    pub use crate::config::Settings;
    pub use crate::expand::{Expander, Expansion};
    pub use crate::model::{Indicator, IndicatorIndex, IndicatorKind};
    pub use crate::rewrite::{RewriteError, UnitReport};
    pub use crate::sql::args::split_call_args;
}

pub use config::Settings;
pub use expand::{Expander, Expansion};
pub use model::{Indicator, IndicatorIndex, IndicatorKind};
