//! SQL text handling.
//!
//! This module owns everything that touches raw SQL text:
//!
//! - [`args`] - top-level argument splitting for function-call interiors
//! - [`callsite`] - discovery of indicator-lookup call sites
//! - [`blocks`] - rendering of generated aggregation subqueries
//!
//! None of it parses SQL grammar. Discovery pattern-matches a fixed, small
//! set of call shapes, and that matching is confined here so a future move
//! to a grammar-based parser only touches this module.

pub mod args;
pub mod blocks;
pub mod callsite;

pub use args::{split_call_args, ArgsError};
pub use callsite::{CallSiteScanner, InlineCall, LookupCall, ScanError, WindowArg};
