use loom_core::{ConfigBundle, LoomConfig};
use serde::Serialize;

use crate::cli::ConfigArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CheckConfigResponseData {
    catalog: String,
    mapping: String,
    template_spec: String,
    metrics: usize,
    mapped_metrics: usize,
    direct_only: Vec<String>,
    tables: Vec<TableSummary>,
}

#[derive(Debug, Serialize)]
struct TableSummary {
    name: String,
    max_rows: usize,
    required: bool,
}

pub fn run(args: &ConfigArgs) -> Result<CommandResult, CliError> {
    let config = args.apply(LoomConfig::default());
    let bundle = ConfigBundle::load(&config)?;

    let mut direct_only = Vec::new();
    let mut warnings = Vec::new();
    for entry in bundle.catalog.entries() {
        let key = entry.key().as_str();
        if entry.direct_only() {
            direct_only.push(key.to_owned());
        } else if !bundle.mapping.covers(key) {
            warnings.push(format!(
                "metric '{key}' has no vendor candidates and can only be supplied directly"
            ));
        }
    }

    let data = CheckConfigResponseData {
        catalog: config.catalog_path.display().to_string(),
        mapping: config.mapping_path.display().to_string(),
        template_spec: config.template_spec_path.display().to_string(),
        metrics: bundle.catalog.len(),
        mapped_metrics: bundle.mapping.entries().count(),
        direct_only,
        tables: bundle
            .template
            .tables()
            .iter()
            .map(|table| TableSummary {
                name: table.name.clone(),
                max_rows: table.max_rows,
                required: table.required,
            })
            .collect(),
    };

    Ok(CommandResult::ok(serde_json::to_value(data)?).with_warnings(warnings))
}
