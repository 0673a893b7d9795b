//! # Report Validation Example
//!
//! Resolves and validates the bundled Apple input against the demo catalog without touching a
//! workbook, then prints every accepted record, issue, and observation.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p loom-core --example validate_report
//! ```

use loom_core::{
    ConfigBundle, ContractValidator, FiscalCalendar, MappingConfig, MetricsCatalog,
    ObservationLog, Pipeline, ReportInput, TemplateSpec,
};

const CATALOG: &str = include_str!("config/metrics_catalog.yaml");
const MAPPING: &str = include_str!("config/mappings.yaml");
const TEMPLATE_SPEC: &str = include_str!("config/template.yaml");
const INPUT: &str = include_str!("input/aapl.json");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = MetricsCatalog::from_yaml_str(CATALOG)?;
    let mapping = MappingConfig::from_yaml_str(MAPPING, &catalog)?;
    let template = TemplateSpec::from_yaml_str(TEMPLATE_SPEC)?;
    let bundle = ConfigBundle::new(catalog, mapping, template)?;

    let input = ReportInput::from_json_str(INPUT)?;
    let pipeline = Pipeline::from_bundle(&bundle, &FiscalCalendar::default());

    let mut log = ObservationLog::new();
    let candidates = pipeline.collect(&input, &mut log)?;
    let report = ContractValidator::new(&bundle.catalog).validate(&candidates, &mut log);

    println!("accepted records:");
    for record in report.accepted() {
        let source = record
            .provenance()
            .map_or_else(|| String::from("direct"), |provenance| provenance.label());
        println!(
            "  FY{} {:<20} {:>18} {:<7} {}",
            record.fiscal_year(),
            record.metric().as_str(),
            record.value().to_string(),
            record.unit(),
            source
        );
    }

    println!("\n{}", report.summary());

    println!("\nobservations:");
    for observation in log.events() {
        println!("  {}", serde_json::to_string(observation)?);
    }

    Ok(())
}
