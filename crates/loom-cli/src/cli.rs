//! CLI argument definitions for loom.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Validate one report input and write it into the workbook template |
//! | `check-config` | Load and cross-check catalog, mappings, and template spec |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--verbose` | `false` | Debug-level logs on stderr |
//!
//! Configuration paths default to `$LOOM_HOME` (see `loom_core::LoomConfig`).
//!
//! # Examples
//!
//! ```bash
//! loom run --input aapl.json --output out/AAPL.xlsx --pretty
//! loom check-config --catalog config/metrics_catalog.yaml
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use loom_core::LoomConfig;

/// loom - catalog-validated financial workbooks
#[derive(Debug, Parser)]
#[command(
    name = "loom",
    author,
    version,
    about = "Catalog-validated financial workbook generation",
    long_about = "loom resolves vendor financial payloads against a metrics catalog, \
validates every value, and injects the accepted rows into named tables of a pre-formatted \
spreadsheet template.\n\
\n\
Use 'loom <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat contract warnings as failures (exit code 5).
    ///
    /// In strict mode a run with warnings does not write the workbook.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Emit debug logs on stderr. `RUST_LOG` takes precedence when set.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a report input and write it into the workbook template.
    ///
    /// A contract violation prints every issue and writes nothing.
    ///
    /// # Examples
    ///
    ///   loom run --input aapl.json --output AAPL.xlsx
    ///   loom run --input aapl.json --template custom.xlsx --output AAPL.xlsx --strict
    Run(RunArgs),

    /// Load the catalog, mappings, and template spec and check them against each other.
    CheckConfig(ConfigArgs),
}

/// Configuration file overrides shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Metrics catalog YAML.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Vendor mappings YAML.
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// Template table spec YAML.
    #[arg(long)]
    pub template_spec: Option<PathBuf>,
}

impl ConfigArgs {
    /// Defaults from `LoomConfig`, with every given flag taking precedence.
    pub fn apply(&self, mut config: LoomConfig) -> LoomConfig {
        if let Some(path) = &self.catalog {
            config.catalog_path = path.clone();
        }
        if let Some(path) = &self.mapping {
            config.mapping_path = path.clone();
        }
        if let Some(path) = &self.template_spec {
            config.template_spec_path = path.clone();
        }
        config
    }
}

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Report input JSON (ticker, strategy, fiscal years, vendor payloads).
    #[arg(long)]
    pub input: PathBuf,

    /// Destination `.xlsx`. Written only when the run succeeds.
    #[arg(long)]
    pub output: PathBuf,

    /// Workbook template to fill.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Days a vendor period end may differ from December 31st before it is reported.
    #[arg(long)]
    pub fiscal_tolerance_days: Option<u32>,

    #[command(flatten)]
    pub config: ConfigArgs,
}
