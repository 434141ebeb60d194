use indsql::config::Settings;
use indsql::sql::callsite::{CallSiteScanner, WindowArg};

fn scanner() -> CallSiteScanner {
    let settings = Settings::default();
    CallSiteScanner::new(&settings.rewrite, &settings.inline)
}

const QUERY: &str = "\
SELECT
  mo.name,
  json_build_array('get-indicator-value', mo.id, '1017', '2024-01-01', '2024-12-31') AS ind1017,
  json_build_array('row-meta', mo.id) AS meta,
  JSON_BUILD_ARRAY('get-indicator-value', mo.id, '1020', '2024-01-01', '2024-12-31') AS ind1020,
  existing AS ind7
FROM monitoring.monitoring_object mo";

#[test]
fn test_discovery_finds_only_marked_calls_in_order() {
    let calls = scanner().lookup_calls(QUERY).unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].code, "1017");
    assert_eq!(calls[1].code, "1020");
    // The head match is case-insensitive.
    assert!(QUERY[calls[1].span.clone()].starts_with("JSON_BUILD_ARRAY"));
}

#[test]
fn test_spans_cover_alias_and_trailing_comma() {
    let calls = scanner().lookup_calls(QUERY).unwrap();
    for call in &calls {
        let text = &QUERY[call.span.clone()];
        assert!(text.ends_with(','), "span should include the comma: {:?}", text);
        assert!(text.contains("AS ind"));
        assert!(call.trailing_comma);
    }
}

#[test]
fn test_aliased_codes_include_non_lookup_aliases() {
    let codes = scanner().aliased_codes(QUERY);
    assert!(codes.contains("7"));
    assert!(codes.contains("1017"));
    assert!(codes.contains("1020"));
}

#[test]
fn test_window_arguments_are_verbatim() {
    let calls = scanner().lookup_calls(QUERY).unwrap();
    assert_eq!(calls[0].object, "mo.id");
    assert_eq!(calls[0].period_start, "'2024-01-01'");
    assert_eq!(calls[0].period_end, "'2024-12-31'");
}

#[test]
fn test_inline_discovery_distinguishes_shapes() {
    let sql = "\
SELECT
  monitoring.indicator_value_on_year(mo.id, NULL, '12', 2022) AS a,
  monitoring.indicator_value_on_period(mo.id, NULL, '13', '2022-01-01', '2022-12-31') AS b
FROM mo";
    let calls = scanner().inline_calls(sql).unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].window, WindowArg::Year("2022".to_string()));
    assert!(matches!(
        calls[1].window,
        WindowArg::Period { ref start, .. } if start == "'2022-01-01'"
    ));
    // Spans cover the call only, not the alias.
    assert!(sql[calls[0].span.clone()].ends_with(')'));
}

#[test]
fn test_suffixed_function_names_do_not_match() {
    // indicator_value_on_period_for_object is a different function.
    let sql =
        "SELECT monitoring.indicator_value_on_period_for_object(mo.id, '13', '2022-01-01', '2022-12-31') FROM mo";
    assert!(scanner().inline_calls(sql).unwrap().is_empty());
}

#[test]
fn test_custom_settings_change_patterns() {
    let mut settings = Settings::default();
    settings.rewrite.lookup_function = "jsonb_build_array".to_string();
    settings.rewrite.lookup_marker = "ind-lookup".to_string();
    settings.rewrite.alias_prefix = "metric".to_string();
    let scanner = CallSiteScanner::new(&settings.rewrite, &settings.inline);

    let sql = "SELECT jsonb_build_array('ind-lookup', mo.id, '5', '2024-01-01', '2024-12-31') AS metric5, x AS metric9 FROM t";
    let calls = scanner.lookup_calls(sql).unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].alias_code.as_deref(), Some("5"));
    assert!(scanner.aliased_codes(sql).contains("9"));
}
