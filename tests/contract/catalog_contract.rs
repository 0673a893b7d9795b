use std::fs;

use loom_core::{
    CandidateRecord, ConfigBundle, ConfigError, ContractValidator, IssueKind, LoomConfig,
    MappingConfig, MetricValue, MetricsCatalog, Observation, ObservationLog, PeriodEnd,
    Provenance, Severity, Strategy, Ticker, Vendor,
};
use rust_decimal::Decimal;

#[path = "../support/mod.rs"]
mod support;

#[derive(Clone)]
struct ConstraintCase {
    name: &'static str,
    metric: &'static str,
    value: &'static str,
    expected: Vec<IssueKind>,
}

fn constraint_cases() -> Vec<ConstraintCase> {
    vec![
        ConstraintCase {
            name: "revenue within bounds",
            metric: "revenue",
            value: "383285000000",
            expected: vec![],
        },
        ConstraintCase {
            name: "revenue zero",
            metric: "revenue",
            value: "0",
            expected: vec![],
        },
        ConstraintCase {
            name: "negative revenue",
            metric: "revenue",
            value: "-500",
            expected: vec![IssueKind::BoundsViolation, IssueKind::SignViolation],
        },
        ConstraintCase {
            name: "negative net income",
            metric: "net_income",
            value: "-2500000",
            expected: vec![],
        },
        ConstraintCase {
            name: "negative gross margin inside ratio bounds",
            metric: "gross_margin",
            value: "-0.15",
            expected: vec![],
        },
        ConstraintCase {
            name: "gross margin above ratio bounds",
            metric: "gross_margin",
            value: "1.2",
            expected: vec![IssueKind::RatioViolation],
        },
        ConstraintCase {
            name: "negative combined ratio",
            metric: "combined_ratio",
            value: "-0.1",
            expected: vec![IssueKind::SignViolation, IssueKind::RatioViolation],
        },
    ]
}

fn candidate(metric: &str, value: MetricValue, strategy: Strategy, year: i32) -> CandidateRecord {
    CandidateRecord {
        ticker: Ticker::parse("AAPL").expect("valid ticker"),
        metric: metric.to_owned(),
        value,
        fiscal_year: year,
        period_end: PeriodEnd::calendar_year_end(year).expect("valid year"),
        strategy,
        provenance: None,
    }
}

fn present(raw: &str) -> MetricValue {
    MetricValue::Present(raw.parse::<Decimal>().expect("valid decimal"))
}

#[test]
fn constraint_violations_match_the_catalog_for_every_case() {
    let bundle = support::bundle();
    let validator = ContractValidator::new(&bundle.catalog);

    for case in constraint_cases() {
        let record = candidate(case.metric, present(case.value), Strategy::Operating, 2023);
        let report = validator.validate(&[record], &mut ObservationLog::new());
        let kinds = report
            .issues()
            .iter()
            .map(|issue| issue.kind)
            .collect::<Vec<_>>();

        assert_eq!(kinds, case.expected, "case '{}': issue kinds", case.name);
        assert_eq!(
            report.is_fatal(),
            !case.expected.is_empty(),
            "case '{}': fatality",
            case.name
        );
        assert_eq!(
            report.accepted().len(),
            usize::from(case.expected.is_empty()),
            "case '{}': accepted records",
            case.name
        );
    }
}

#[test]
fn missing_value_severity_follows_strategy_and_year_policy() {
    let bundle = support::bundle();
    let validator = ContractValidator::new(&bundle.catalog);
    let cases = [
        ("revenue", Strategy::Operating, 2015, Some(IssueKind::MissingRequired)),
        ("revenue", Strategy::Insurance, 2015, Some(IssueKind::MissingWarn)),
        ("net_income", Strategy::Operating, 2019, None),
        ("net_income", Strategy::Operating, 2020, Some(IssueKind::MissingWarn)),
        ("combined_ratio", Strategy::Operating, 2023, None),
        ("combined_ratio", Strategy::Insurance, 2023, Some(IssueKind::MissingRequired)),
        ("gross_margin", Strategy::Insurance, 2023, None),
    ];

    for (metric, strategy, year, expected) in cases {
        let mut log = ObservationLog::new();
        let report = validator.validate(
            &[candidate(metric, MetricValue::Missing, strategy, year)],
            &mut log,
        );
        let kind = report.issues().first().map(|issue| issue.kind);

        assert_eq!(kind, expected, "{metric} / {strategy} / FY{year}");
        assert_eq!(
            log.count("contract.missing_required"),
            usize::from(expected == Some(IssueKind::MissingRequired)),
            "{metric} / {strategy} / FY{year}: observation"
        );
    }
}

#[test]
fn issue_kinds_carry_fixed_severities() {
    let cases = [
        (IssueKind::UnknownKey, Severity::Error),
        (IssueKind::MissingRequired, Severity::Error),
        (IssueKind::MissingWarn, Severity::Warning),
        (IssueKind::InvalidValue, Severity::Error),
        (IssueKind::BoundsViolation, Severity::Error),
        (IssueKind::SignViolation, Severity::Error),
        (IssueKind::RatioViolation, Severity::Error),
    ];
    for (kind, severity) in cases {
        assert_eq!(kind.severity(), severity, "kind '{kind}'");
    }
}

#[test]
fn unknown_keys_and_unparsable_values_are_errors_with_observations() {
    let bundle = support::bundle();
    let mut unparsable = candidate(
        "revenue",
        MetricValue::Unparsable(String::from("\"n/a\"")),
        Strategy::Operating,
        2023,
    );
    unparsable.provenance = Some(Provenance {
        vendor: Vendor::Fmp,
        raw_key: String::from("revenue"),
        rank: 0,
    });
    let records = [
        candidate("ebitda", present("1"), Strategy::Operating, 2023),
        unparsable,
    ];

    let mut log = ObservationLog::new();
    let report = ContractValidator::new(&bundle.catalog).validate(&records, &mut log);

    let kinds = report
        .errors()
        .map(|issue| issue.kind)
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec![IssueKind::UnknownKey, IssueKind::InvalidValue]);
    assert_eq!(
        log.events(),
        &[Observation::UnknownKeyRejected {
            ticker: Ticker::parse("AAPL").expect("valid ticker"),
            metric: String::from("ebitda"),
            fiscal_year: 2023,
        }]
    );
}

#[test]
fn report_serializes_with_stable_field_names() {
    let bundle = support::bundle();
    let report = ContractValidator::new(&bundle.catalog).validate(
        &[candidate("revenue", present("-500"), Strategy::Operating, 2022)],
        &mut ObservationLog::new(),
    );

    let json = serde_json::to_value(&report).expect("serializable report");
    let first = &json["issues"][0];
    assert_eq!(first["severity"], "error");
    assert_eq!(first["kind"], "bounds_violation");
    assert_eq!(first["ticker"], "AAPL");
    assert_eq!(first["metric"], "revenue");
    assert_eq!(first["fiscal_year"], 2022);
    assert_eq!(json["accepted"].as_array().map(Vec::len), Some(0));
}

#[test]
fn observations_serialize_under_their_event_names() {
    let observation = Observation::MappingFallbackUsed {
        metric: String::from("revenue"),
        vendor: Vendor::Fmp,
        candidate: String::from("totalRevenue"),
        rank: 1,
    };

    let json = serde_json::to_value(&observation).expect("serializable observation");
    assert_eq!(json["event"], "mapping.fallback_used");
    assert_eq!(json["vendor"], "fmp");
    assert_eq!(json["rank"], 1);
    assert_eq!(observation.name(), "mapping.fallback_used");
}

#[test]
fn configuration_loads_from_loom_home() {
    let home = tempfile::tempdir().expect("tempdir");
    let config_dir = home.path().join("config");
    fs::create_dir_all(&config_dir).expect("config dir");
    fs::write(config_dir.join("metrics_catalog.yaml"), support::CATALOG).expect("catalog");
    fs::write(config_dir.join("mappings.yaml"), support::MAPPING).expect("mapping");
    fs::write(config_dir.join("template.yaml"), support::TEMPLATE_SPEC).expect("template");

    let config = LoomConfig::with_home(home.path().to_path_buf());
    let bundle = ConfigBundle::load(&config).expect("bundle loads");

    assert_eq!(bundle.catalog.len(), 4);
    let revenue = bundle
        .mapping
        .candidates("revenue", Vendor::Fmp)
        .expect("fmp revenue candidates");
    assert_eq!(revenue.primary(), "revenue");
    assert_eq!(bundle.template.data_table().max_rows, 40);
}

#[test]
fn mapping_must_reference_catalog_metrics_with_unique_candidates() {
    let catalog = MetricsCatalog::from_yaml_str(support::CATALOG).expect("catalog fixture");
    let cases = [
        (
            "unknown metric",
            "version: 1\nmappings:\n  ebitda:\n    fmp: [ebitda]\n",
        ),
        (
            "empty candidates",
            "version: 1\nmappings:\n  revenue:\n    fmp: []\n",
        ),
        (
            "duplicate candidate",
            "version: 1\nmappings:\n  revenue:\n    fmp: [revenue, revenue]\n",
        ),
        (
            "unknown vendor",
            "version: 1\nmappings:\n  revenue:\n    bloomberg: [revenue]\n",
        ),
    ];

    for (name, text) in cases {
        let result = MappingConfig::from_yaml_str(text, &catalog);
        assert!(result.is_err(), "case '{name}' must be rejected");
    }

    let err = MappingConfig::from_yaml_str(cases[0].1, &catalog).expect_err("unknown metric");
    assert!(matches!(err, ConfigError::UnknownMappedMetric { key } if key == "ebitda"));
}

#[test]
fn bundle_rejects_required_metrics_without_vendor_candidates() {
    let catalog = MetricsCatalog::from_yaml_str(support::CATALOG).expect("catalog fixture");
    let mapping = MappingConfig::from_yaml_str(
        "version: 1\nmappings:\n  revenue:\n    fmp: [revenue]\n",
        &catalog,
    )
    .expect("mapping parses");
    let template =
        loom_core::TemplateSpec::from_yaml_str(support::TEMPLATE_SPEC).expect("template spec");

    let err = ConfigBundle::new(catalog, mapping, template).expect_err("must fail");
    assert!(matches!(
        err,
        ConfigError::UncoveredRequiredMetric { key } if key == "combined_ratio"
    ));
}
