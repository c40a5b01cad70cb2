use chrono::NaiveDate;
use stockpilot_core::config::AnchorKind;
use stockpilot_core::stock::MarginType;
use stockpilot_core::{
    AbcClass, AnalyticsConfig, AssociationKind, AssociationMethod, Dimension, MerchandisingEngine,
    MonthKey, RawTransaction,
};

fn line(customer: &str, product: &str, month: u32, quantity: f64, unit_value: f64) -> RawTransaction {
    RawTransaction::new(product)
        .with_customer(customer)
        .with_city("Porto")
        .with_finish("matte")
        .with_quantity(quantity)
        .with_unit_value(unit_value)
        .with_date(format!("2023-{month:02}-10"))
}

/// A year of sales: TILE and GROUT move together, PAINT sells once.
fn year_of_sales() -> Vec<RawTransaction> {
    let mut rows = Vec::new();
    for month in 1..=12u32 {
        let season = if (4..=9).contains(&month) { 3.0 } else { 1.0 };
        rows.push(line("Acme Build", "TILE", month, 10.0 * season, 40.0));
        rows.push(line("Casa Nova", "GROUT", month, 4.0 * season, 12.0));
        rows.push(line("Casa Nova", "TRIM", month, 1.0 + (month % 3) as f64, 8.0));
    }
    rows.push(line("Obra Viva", "PAINT", 2, 6.0, 25.0));
    rows
}

fn calendar_config() -> AnalyticsConfig {
    let mut config = AnalyticsConfig::default();
    config.window.anchor = AnchorKind::CalendarYear;
    config.window.calendar_year = Some(2023);
    config.association.method = AssociationMethod::Auto;
    config
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

#[test]
fn calendar_year_report_covers_the_whole_pipeline() {
    let report = MerchandisingEngine::new(calendar_config())
        .analyze_raw(&year_of_sales(), as_of())
        .expect("non-empty input");

    assert_eq!(report.window.first(), Some(MonthKey::new(2023, 1)));
    assert_eq!(report.window.last(), Some(MonthKey::new(2023, 12)));
    assert_eq!(report.association_kind, AssociationKind::Correlation);
    assert!(report.data_quality.is_clean());

    let customers = report.classification(Dimension::Customer).expect("customer classification");
    assert_eq!(customers.entities[0].aggregate.key, "Acme Build");
    assert_eq!(customers.entity("Obra Viva").map(|entity| entity.class_label), Some(AbcClass::C));

    let tile = report.insight("TILE").expect("tile insight");
    assert_eq!(tile.metrics.rank, 1);
    assert_eq!(tile.metrics.months_with_sales, 12);
    assert_eq!(tile.metrics.min_sale, 10.0);
    assert_eq!(tile.metrics.max_sale, 30.0);

    let paint = report.insight("PAINT").expect("paint insight");
    assert_eq!(paint.metrics.min_sale, 0.0);
    assert_eq!(paint.safety.margin_type, MarginType::None);
    assert_eq!(paint.safety.recommended_stock, 0);

    let kit = &report.kits.kits[0];
    assert_eq!(kit.pair_key, "GROUT|TILE");
    assert!((kit.strength - 1.0).abs() < 1e-6);
    assert_eq!(kit.lead_sku, "TILE");
}

#[test]
fn every_series_is_window_length_and_insights_are_rank_ordered() {
    let report = MerchandisingEngine::new(calendar_config())
        .analyze_raw(&year_of_sales(), as_of())
        .expect("non-empty input");

    let ranks: Vec<usize> = report.sku_insights.iter().map(|insight| insight.metrics.rank).collect();
    assert_eq!(ranks, (1..=report.sku_insights.len()).collect::<Vec<_>>());

    for insight in &report.sku_insights {
        let expected = insight.metrics.total_sales / 12.0;
        assert!((insight.metrics.average_monthly - expected).abs() < 1e-9);
    }
}

#[test]
fn forecasts_are_never_negative() {
    let mut config = calendar_config();
    config.momentum.alpha = 5.0;
    config.momentum.max_adjustment = 1.0;
    config.association.correlation_threshold = 0.1;

    let report = MerchandisingEngine::new(config).analyze_raw(&year_of_sales(), as_of()).expect("input");

    for insight in &report.sku_insights {
        assert!(insight.forecast.adjustment_factor >= 0.0);
        assert!(insight.forecast.drivers.len() <= 3);
    }
}

#[test]
fn report_round_trips_through_json() {
    let report = MerchandisingEngine::new(calendar_config())
        .analyze_raw(&year_of_sales(), as_of())
        .expect("non-empty input");

    let json = serde_json::to_string(&report).expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(value["window"]["months"].as_array().map(Vec::len), Some(12));
    assert_eq!(value["sku_insights"][0]["class_label"], "A");
}
