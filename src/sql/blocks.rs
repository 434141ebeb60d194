//! Generated SQL block rendering.
//!
//! A block is a self-contained scalar subquery aggregating stored
//! measurements for one base indicator over one monitoring object and one
//! year window. Progressive indicators (`type = 1` in the measure store)
//! sum the year's measurements; last-date indicators (`type = 2`) take the
//! most recent measurement up to the year. Missing data coalesces to zero
//! so arithmetic over blocks never propagates NULL.

use crate::config::SchemaSettings;

/// Render the aggregation subquery for one base indicator code.
pub fn measure_subquery(schema: &SchemaSettings, object: &str, code: &str, year: &str) -> String {
    format!(
        "(
    SELECT CASE
        WHEN MAX(mi.type) = 1
        THEN COALESCE(SUM(mm.value), 0)
        ELSE COALESCE((array_agg(mm.value ORDER BY mm.measure_date DESC))[1], 0)
    END
    FROM {measure} mm
    JOIN {indicator} AS mi ON mi.id = mm.indicator_id
    WHERE mm.monitoring_object_id = {object}
      AND mi.code = '{code}'
      AND (
        (mi.type = 1 AND EXTRACT(YEAR FROM mm.measure_date) = {year})
        OR
        (mi.type = 2 AND EXTRACT(YEAR FROM mm.measure_date) <= {year})
      )
)",
        measure = schema.measure_table,
        indicator = schema.indicator_table,
        object = object,
        code = code,
        year = year,
    )
}

/// Render one aliased block for the query rewriter's select list.
pub fn aliased_block(
    schema: &SchemaSettings,
    alias_prefix: &str,
    object: &str,
    code: &str,
    year: &str,
) -> String {
    format!(
        "{} AS {}{}",
        measure_subquery(schema, object, code, year),
        alias_prefix,
        code
    )
}
