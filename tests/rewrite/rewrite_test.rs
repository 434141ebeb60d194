use indsql::config::Settings;
use indsql::model::{Indicator, IndicatorIndex, IndicatorKind};
use indsql::rewrite::Rewriter;

fn calculated(code: &str, expr: &str) -> Indicator {
    Indicator {
        code: code.to_string(),
        kind: IndicatorKind::Calculated,
        expression: Some(expr.to_string()),
    }
}

fn base(code: &str) -> Indicator {
    Indicator {
        code: code.to_string(),
        kind: IndicatorKind::Progressive,
        expression: None,
    }
}

fn index() -> IndicatorIndex {
    vec![
        calculated("1017", "i1015 / i1016 * 100"),
        calculated("1020", "i1015 + i1018"),
        base("1015"),
        base("1016"),
        base("1018"),
    ]
    .into_iter()
    .collect()
}

const QUERY: &str = "\
SELECT
  mo.name,
  json_build_array('get-indicator-value', mo.id, '1017', '2024-01-01', '2024-12-31') AS ind1017,
  json_build_array('get-indicator-value', mo.id, '1020', '2024-01-01', '2024-12-31') AS ind1020,
  mo.region
FROM monitoring.monitoring_object mo
WHERE mo.is_active";

#[test]
fn test_pooled_blocks_are_materialized_at_first_site() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let (out, report) = rewriter.rewrite_unit(QUERY).unwrap();

    assert!(!out.contains("json_build_array"));
    // One block per transitive base code, appearance order, no duplicates.
    assert_eq!(report.emitted, vec!["1015", "1016", "1018"]);
    for code in ["1015", "1016", "1018"] {
        assert_eq!(
            out.matches(&format!("mi.code = '{}'", code)).count(),
            1,
            "exactly one block for {}",
            code
        );
        assert_eq!(out.matches(&format!("AS ind{},", code)).count(), 1);
    }
    // The rest of the select list is untouched.
    assert!(out.contains("mo.name"));
    assert!(out.contains("mo.region"));
    assert!(out.contains("WHERE mo.is_active"));
}

#[test]
fn test_blocks_use_anchor_site_window() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let (out, _) = rewriter.rewrite_unit(QUERY).unwrap();
    assert!(out.contains("mm.monitoring_object_id = mo.id"));
    assert!(out.contains("EXTRACT(YEAR FROM mm.measure_date) = 2024"));
}

#[test]
fn test_report_lists_expanded_formulas() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let (_, report) = rewriter.rewrite_unit(QUERY).unwrap();
    assert_eq!(report.formulas.len(), 2);
    assert_eq!(report.formulas[0].code, "1017");
    assert_eq!(report.formulas[0].expression, "(i1015) / (i1016) * 100");
    assert_eq!(report.formulas[1].expression, "(i1015) + (i1018)");
    assert_eq!(report.pooled_base_codes, vec!["1015", "1016", "1018"]);
}

#[test]
fn test_preexisting_alias_is_respected() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let query = format!(
        "SELECT\n  (SELECT 1) AS ind1016,\n  {}\nFROM mo",
        "json_build_array('get-indicator-value', mo.id, '1017', '2024-01-01', '2024-12-31') AS ind1017,"
    );
    let (out, report) = rewriter.rewrite_unit(&query).unwrap();

    assert_eq!(report.emitted, vec!["1015"]);
    assert_eq!(report.already_present, vec!["1016"]);
    // The stand-in subquery is still there, and no second ind1016 appears.
    assert_eq!(out.matches("AS ind1016").count(), 1);
}

#[test]
fn test_cyclic_indicator_produces_no_blocks_but_no_crash() {
    let idx: IndicatorIndex = vec![
        calculated("1", "i2"),
        calculated("2", "i1"),
    ]
    .into_iter()
    .collect();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let query = "SELECT json_build_array('get-indicator-value', mo.id, '1', '2024-01-01', '2024-12-31') AS ind1, x FROM mo";
    let (out, report) = rewriter.rewrite_unit(query).unwrap();

    assert!(report.emitted.is_empty());
    assert!(report.pooled_base_codes.is_empty());
    // The call site is consumed; nothing re-emits the cycle.
    assert!(!out.contains("json_build_array"));
    assert_eq!(report.formulas[0].expression, "((i1))");
}

#[test]
fn test_anchor_skips_sites_with_unparseable_windows() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    // The first site's window is computed, not a literal; the second site
    // must anchor the blocks instead of the unit passing through unchanged.
    let query = "\
SELECT
  json_build_array('get-indicator-value', mo.id, '1017', now(), '2024-12-31') AS ind1017,
  json_build_array('get-indicator-value', mo.id, '1020', '2024-01-01', '2024-12-31') AS ind1020,
  mo.name
FROM mo";
    let (out, report) = rewriter.rewrite_unit(query).unwrap();

    assert!(!out.contains("json_build_array"));
    assert_eq!(report.emitted, vec!["1015", "1016", "1018"]);
    assert!(out.contains("EXTRACT(YEAR FROM mm.measure_date) = 2024"));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("site skipped"));
}

#[test]
fn test_unit_without_lookups_passes_through() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let query = "SELECT count(*) FROM monitoring.measure";
    let (out, report) = rewriter.rewrite_unit(query).unwrap();
    assert_eq!(out, query);
    assert!(report.is_empty());
}

#[test]
fn test_report_renders_human_readable_text() {
    let idx = index();
    let settings = Settings::default();
    let rewriter = Rewriter::new(&idx, &settings);

    let (_, report) = rewriter.rewrite_unit(QUERY).unwrap();
    let text = report.to_string();
    assert!(text.contains("Expanded formulas:"));
    assert!(text.contains("1017: (i1015) / (i1016) * 100"));
    assert!(text.contains("Base indicators: 1015, 1016, 1018"));
    assert!(text.contains("New blocks: 1015, 1016, 1018"));
}
