use std::fs;
use std::path::Path;

use loom_core::{
    persist, ConfigBundle, EnvelopeError, FiscalCalendar, LoomConfig, Observation,
    ObservationLog, Pipeline, PipelineError, ReportInput, SafeZoneTable, Strategy, Ticker,
    ValidationIssue, ValidationReport,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct RunResponseData {
    ticker: Ticker,
    strategy: Strategy,
    /// Absent when nothing was written.
    output: Option<String>,
    records: usize,
    tables: Vec<SafeZoneTable>,
    issues: Vec<ValidationIssue>,
    observations: Vec<Observation>,
}

pub fn run(args: &RunArgs, strict: bool) -> Result<CommandResult, CliError> {
    let mut config = args.config.apply(LoomConfig::default());
    if let Some(path) = &args.template {
        config.template_path = path.clone();
    }
    if let Some(days) = args.fiscal_tolerance_days {
        config.fiscal_tolerance_days = days;
    }

    let bundle = ConfigBundle::load(&config)?;
    let input = ReportInput::from_json_str(&read_text(&args.input)?).map_err(|source| {
        CliError::Input {
            path: args.input.clone(),
            source,
        }
    })?;
    let template = fs::read(&config.template_path).map_err(|source| CliError::Read {
        path: config.template_path.clone(),
        source,
    })?;

    let calendar = FiscalCalendar::new(config.fiscal_tolerance_days);
    let pipeline = Pipeline::from_bundle(&bundle, &calendar);
    let mut log = ObservationLog::new();
    let result = pipeline.run(&input, &template, &mut log);
    let observations = log.into_events();

    let mut data = RunResponseData {
        ticker: input.ticker.clone(),
        strategy: input.strategy,
        output: None,
        records: 0,
        tables: Vec::new(),
        issues: Vec::new(),
        observations,
    };

    match result {
        Ok(output) => {
            let warnings = warning_messages(&output.report);
            if strict && !warnings.is_empty() {
                warn!(
                    warnings = warnings.len(),
                    "strict mode: contract warnings present, workbook not written"
                );
            } else {
                persist(&args.output, &output.workbook)?;
                info!(path = %args.output.display(), "workbook written");
                data.output = Some(args.output.display().to_string());
            }

            data.records = output.records.len();
            data.tables = output.tables;
            data.issues = output.report.issues().to_vec();
            Ok(CommandResult::ok(serde_json::to_value(data)?).with_warnings(warnings))
        }
        Err(PipelineError::Contract(report)) => {
            let warnings = warning_messages(&report);
            let errors = EnvelopeError::from_report(&report);
            data.issues = report.issues().to_vec();
            Ok(CommandResult::ok(serde_json::to_value(data)?)
                .with_warnings(warnings)
                .with_errors(errors))
        }
        Err(other) => Err(other.into()),
    }
}

fn warning_messages(report: &ValidationReport) -> Vec<String> {
    report.warnings().map(ToString::to_string).collect()
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
