//! # Report Pipeline
//!
//! One synchronous pass over one report's dataset:
//! resolution, fiscal normalization, contract validation, then safe-zone writing.
//!
//! Configuration is borrowed, never owned, so concurrent runs over independent reports share
//! the same catalog and mapping without locking. Each run needs its own template bytes.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::fiscal::FiscalCalendar;
use crate::observe::Observer;
use crate::resolver::{decimal_from_json, CandidateResolver, Payload, Resolution};
use crate::validation::{CandidateRecord, ContractValidator, MetricValue, ValidationReport};
use crate::workbook::{RowSet, SafeZoneTable, SafeZoneTableWriter, TableWrite};
use crate::{
    ConfigBundle, FinancialRecord, MappingConfig, MetricsCatalog, NarrativeEntry, PeriodEnd,
    PipelineError, Provenance, Strategy, TemplateSpec, Ticker, Vendor,
};

/// Everything the fetch layer hands over for one ticker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportInput {
    pub ticker: Ticker,
    pub strategy: Strategy,
    pub years: Vec<YearInput>,
    #[serde(default)]
    pub narratives: Vec<NarrativeInput>,
}

impl ReportInput {
    pub fn from_json_str(text: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearInput {
    pub fiscal_year: i32,
    /// Vendor-reported period end; the calendar year end is used when absent.
    #[serde(default)]
    pub period_end: Option<PeriodEnd>,
    /// Vendor payloads in priority order.
    #[serde(default)]
    pub payloads: Vec<VendorPayload>,
    /// Values already keyed by catalog metric. They win over vendor payloads.
    #[serde(default)]
    pub direct: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorPayload {
    pub vendor: Vendor,
    pub values: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NarrativeInput {
    pub section: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Accepted records ordered by fiscal year, then catalog order.
    pub records: Vec<FinancialRecord>,
    /// Non-fatal report; may still carry warnings.
    pub report: ValidationReport,
    pub workbook: Vec<u8>,
    pub tables: Vec<SafeZoneTable>,
}

pub struct Pipeline<'a> {
    catalog: &'a MetricsCatalog,
    mapping: &'a MappingConfig,
    template: &'a TemplateSpec,
    calendar: FiscalCalendar,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        catalog: &'a MetricsCatalog,
        mapping: &'a MappingConfig,
        template: &'a TemplateSpec,
        calendar: &FiscalCalendar,
    ) -> Self {
        Self {
            catalog,
            mapping,
            template,
            calendar: *calendar,
        }
    }

    pub fn from_bundle(bundle: &'a ConfigBundle, calendar: &FiscalCalendar) -> Self {
        Self::new(&bundle.catalog, &bundle.mapping, &bundle.template, calendar)
    }

    /// Resolve and normalize every catalog metric for every fiscal year, plus any direct keys
    /// the catalog does not know (those fail validation as unknown keys).
    pub fn collect(
        &self,
        input: &ReportInput,
        observer: &mut dyn Observer,
    ) -> Result<Vec<CandidateRecord>, PipelineError> {
        let mut years = input.years.iter().collect::<Vec<_>>();
        years.sort_by_key(|year| year.fiscal_year);
        if let Some(pair) = years
            .windows(2)
            .find(|pair| pair[0].fiscal_year == pair[1].fiscal_year)
        {
            return Err(PipelineError::DuplicateFiscalYear {
                ticker: input.ticker.to_string(),
                fiscal_year: pair[0].fiscal_year,
            });
        }

        let resolver = CandidateResolver::new(self.mapping);
        let mut candidates = Vec::new();
        for year in years {
            let period = self
                .calendar
                .normalize(year.fiscal_year, year.period_end, observer)?;
            let candidate = |metric: &str, value: MetricValue, provenance: Option<Provenance>| {
                CandidateRecord {
                    ticker: input.ticker.clone(),
                    metric: metric.to_owned(),
                    value,
                    fiscal_year: year.fiscal_year,
                    period_end: period.period_end,
                    strategy: input.strategy,
                    provenance,
                }
            };

            for entry in self.catalog.entries() {
                let key = entry.key().as_str();
                let (value, provenance) = match year.direct.get(key).filter(|raw| !raw.is_null()) {
                    Some(raw) => (direct_value(raw), None),
                    None => self.resolve_payloads(&resolver, key, &year.payloads, observer)?,
                };
                candidates.push(candidate(key, value, provenance));
            }

            for (key, raw) in &year.direct {
                if !self.catalog.contains(key) {
                    let value = if raw.is_null() {
                        MetricValue::Missing
                    } else {
                        direct_value(raw)
                    };
                    candidates.push(candidate(key, value, None));
                }
            }
        }
        Ok(candidates)
    }

    /// First payload, in priority order, whose vendor declares candidates and yields a value.
    fn resolve_payloads(
        &self,
        resolver: &CandidateResolver<'_>,
        key: &str,
        payloads: &[VendorPayload],
        observer: &mut dyn Observer,
    ) -> Result<(MetricValue, Option<Provenance>), PipelineError> {
        for payload in payloads {
            if self.mapping.candidates(key, payload.vendor).is_none() {
                continue;
            }
            match resolver.resolve(key, payload.vendor, &payload.values, observer)? {
                Resolution::Resolved(resolved) => {
                    return Ok((
                        MetricValue::Present(resolved.value),
                        Some(Provenance {
                            vendor: resolved.vendor,
                            raw_key: resolved.raw_key,
                            rank: resolved.rank,
                        }),
                    ));
                }
                Resolution::Unparsable {
                    vendor,
                    raw_key,
                    rank,
                    raw,
                    ..
                } => {
                    return Ok((
                        MetricValue::Unparsable(raw),
                        Some(Provenance {
                            vendor,
                            raw_key,
                            rank,
                        }),
                    ));
                }
                Resolution::Missing => {}
            }
        }
        Ok((MetricValue::Missing, None))
    }

    pub fn run(
        &self,
        input: &ReportInput,
        template_bytes: &[u8],
        observer: &mut dyn Observer,
    ) -> Result<RunOutput, PipelineError> {
        let span = info_span!("loom.run", ticker = %input.ticker, strategy = %input.strategy);
        let _guard = span.enter();

        let candidates = self.collect(input, observer)?;
        debug!(candidates = candidates.len(), "candidates collected");

        let report = ContractValidator::new(self.catalog).validate(&candidates, observer);
        if report.is_fatal() {
            warn!(
                errors = report.errors().count(),
                warnings = report.warnings().count(),
                "contract violated, nothing written"
            );
            return Err(PipelineError::Contract(Box::new(report)));
        }

        let data_spec = self.template.data_table();
        let data_rows = RowSet::from_records(report.accepted());
        let narratives = input
            .narratives
            .iter()
            .map(|narrative| NarrativeEntry {
                ticker: input.ticker.clone(),
                section: narrative.section.clone(),
                text: narrative.text.clone(),
            })
            .collect::<Vec<_>>();
        let narrative_rows = RowSet::from_records(&narratives);

        let mut writes = vec![TableWrite {
            table: &data_spec.name,
            rows: &data_rows,
            max_rows: data_spec.max_rows,
            required: true,
        }];
        match self.template.narrative_table() {
            Some(spec) => writes.push(TableWrite {
                table: &spec.name,
                rows: &narrative_rows,
                max_rows: spec.max_rows,
                required: spec.required,
            }),
            None if !narratives.is_empty() => {
                warn!(
                    sections = narratives.len(),
                    "template declares no narrative table, narratives dropped"
                );
            }
            None => {}
        }

        let written = SafeZoneTableWriter::new().write_tables(template_bytes, &writes, observer)?;
        info!(
            records = report.accepted().len(),
            warnings = report.warnings().count(),
            tables = written.tables.len(),
            "report written"
        );

        Ok(RunOutput {
            records: report.accepted().to_vec(),
            report,
            workbook: written.bytes,
            tables: written.tables,
        })
    }
}

fn direct_value(raw: &Value) -> MetricValue {
    decimal_from_json(raw)
        .map_or_else(|| MetricValue::Unparsable(raw.to_string()), MetricValue::Present)
}
