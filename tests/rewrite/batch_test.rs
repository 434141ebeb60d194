use indsql::batch::{inline_document, rewrite_document};
use indsql::config::Settings;
use indsql::model::loader::parse_indicators;
use indsql::model::IndicatorIndex;

const METADATA: &str = r#"
<Data>
    <Indicator code="1017" type="CALCULATED">
        <IndicatorCalculationParameter expressionSource="i1015 / i1016 * 100" />
    </Indicator>
    <Indicator code="1015" type="PROGRESSIVE" />
    <Indicator code="1016" type="LAST_DATE" />
</Data>
"#;

fn index() -> IndicatorIndex {
    parse_indicators(METADATA).unwrap()
}

fn lookup_unit(code: &str) -> String {
    format!(
        "SELECT json_build_array('get-indicator-value', mo.id, '{}', '2024-01-01', '2024-12-31') AS ind{}, mo.name FROM mo",
        code, code
    )
}

#[test]
fn test_separator_count_and_order_survive() {
    let settings = Settings::default();
    let sql = format!(
        "{}--NEXT_QUERY{}--NEXT_QUERY{}",
        lookup_unit("1017"),
        "SELECT 2",
        lookup_unit("1015")
    );

    let (out, report) = rewrite_document(&index(), &settings, &sql);

    assert_eq!(out.matches("--NEXT_QUERY").count(), 2);
    assert_eq!(report.units.len(), 3);
    let units: Vec<&str> = out.split("--NEXT_QUERY").collect();
    assert!(units[0].contains("mi.code = '1015'"));
    assert!(units[0].contains("mi.code = '1016'"));
    assert_eq!(units[1], "SELECT 2");
    assert!(units[2].contains("mi.code = '1015'"));
}

#[test]
fn test_units_do_not_share_block_registries() {
    // The same base code is materialized once per unit, not once per batch.
    let settings = Settings::default();
    let sql = format!("{}--NEXT_QUERY{}", lookup_unit("1015"), lookup_unit("1015"));

    let (out, _) = rewrite_document(&index(), &settings, &sql);
    assert_eq!(out.matches("mi.code = '1015'").count(), 2);
}

#[test]
fn test_failed_unit_is_contained() {
    let settings = Settings::default();
    let bad = "SELECT json_build_array('get-indicator-value', mo.id, '1017'";
    let sql = format!("{}--NEXT_QUERY{}", lookup_unit("1017"), bad);

    let (out, report) = rewrite_document(&index(), &settings, &sql);
    let units: Vec<&str> = out.split("--NEXT_QUERY").collect();

    assert!(units[0].contains("mi.code = '1015'"), "good unit rewritten");
    assert_eq!(units[1], bad, "bad unit unchanged");
    assert!(report.units[1].warnings[0].contains("unit left unchanged"));
    assert!(report.has_warnings());
}

#[test]
fn test_custom_separator() {
    let mut settings = Settings::default();
    settings.rewrite.separator = "-- ===".to_string();
    let sql = format!("{}-- ==={}", lookup_unit("1016"), lookup_unit("1016"));

    let (out, report) = rewrite_document(&index(), &settings, &sql);
    assert_eq!(out.matches("-- ===").count(), 1);
    assert_eq!(report.units.len(), 2);
}

#[test]
fn test_whole_document_rewrite_is_deterministic() {
    let settings = Settings::default();
    let sql = format!(
        "{}--NEXT_QUERY{}",
        lookup_unit("1017"),
        lookup_unit("1016")
    );

    let runs: Vec<String> = (0..3)
        .map(|_| rewrite_document(&index(), &settings, &sql).0)
        .collect();
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[test]
fn test_inline_document_respects_units_too() {
    let settings = Settings::default();
    let sql = "SELECT monitoring.indicator_value_on_year(mo.id, NULL, '7', 2024) FROM mo\
               --NEXT_QUERYSELECT 1";

    let (out, report) = inline_document(&IndicatorIndex::new(), &settings, sql);
    assert_eq!(out.matches("--NEXT_QUERY").count(), 1);
    assert!(out.contains("mi.code = '7'"));
    assert_eq!(report.units.len(), 2);
}

#[test]
fn test_report_json_is_stable() {
    let settings = Settings::default();
    let sql = lookup_unit("1017");

    let (_, first) = rewrite_document(&index(), &settings, &sql);
    let (_, second) = rewrite_document(&index(), &settings, &sql);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
