//! Invocation handling for the clover-merge CLI.
//!
//! Configuration is validated and every input document is loaded before any
//! merging starts, so a bad mode, a missing file or an unparseable document
//! fails the run without writing output.

use std::collections::HashSet;
use std::fmt::Write;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

use crate::accumulator::{Accumulator, MergedReport};
use crate::error::{CloverMergeError, Result};
use crate::model::MergeMode;
use crate::xml::{self, Element};

/// Output style for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Style {
    #[default]
    Text,
    Json,
}

/// Raw, unvalidated options as given on the command line.
#[derive(Debug, Clone)]
pub struct Options {
    pub output: PathBuf,
    pub mode: String,
    /// Required coverage percentage; 0 disables enforcement.
    pub enforce: f64,
    pub paths: Vec<PathBuf>,
}

/// A validated run with all input documents parsed.
#[derive(Debug)]
pub struct Invocation {
    output: PathBuf,
    mode: MergeMode,
    threshold: f64,
    documents: Vec<Element>,
}

impl Invocation {
    pub fn new(options: Options) -> Result<Self> {
        let mode: MergeMode = options.mode.parse()?;

        if !options.enforce.is_finite() || options.enforce < 0.0 {
            return Err(CloverMergeError::Config(format!(
                "Coverage threshold must be a non-negative percentage, got {}.",
                options.enforce
            )));
        }

        let mut unique = HashSet::new();
        let paths: Vec<PathBuf> = options
            .paths
            .into_iter()
            .filter(|p| unique.insert(p.clone()))
            .collect();

        if paths.is_empty() {
            return Err(CloverMergeError::Config(
                "At least one input path is required (preferably two).".to_string(),
            ));
        }

        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(CloverMergeError::MissingInput(missing.clone()));
        }

        let documents = paths
            .iter()
            .map(|path| {
                xml::load(path).map_err(|e| CloverMergeError::Document {
                    path: path.clone(),
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::info!("Loaded {} input documents", documents.len());

        Ok(Self {
            output: options.output,
            mode,
            threshold: options.enforce,
            documents,
        })
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn documents(&self) -> &[Element] {
        &self.documents
    }

    /// Merge every document, write the report and summarise the result.
    pub fn execute(self) -> Result<MergeOutcome> {
        let mut accumulator = Accumulator::new(self.mode);
        accumulator.parse_all(&self.documents);

        let MergedReport {
            xml,
            metrics,
            warnings,
        } = accumulator.to_xml()?;
        std::fs::write(&self.output, xml).map_err(|source| CloverMergeError::Write {
            path: self.output.clone(),
            source,
        })?;
        tracing::info!("Wrote merged report to {}", self.output.display());

        let coverage_percentage = metrics.coverage_percentage();
        let threshold = (self.threshold > 0.0).then_some(self.threshold);
        let passed = threshold.map_or(true, |t| coverage_percentage > t);

        Ok(MergeOutcome {
            files_discovered: metrics.files,
            covered_elements: metrics.covered_element_count(),
            elements: metrics.element_count(),
            coverage_percentage,
            threshold,
            passed,
            warnings: accumulator.warnings().len() + warnings.len(),
        })
    }
}

/// Summary statistics of a finished merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub files_discovered: u64,
    pub covered_elements: u64,
    pub elements: u64,
    pub coverage_percentage: f64,
    pub threshold: Option<f64>,
    pub passed: bool,
    pub warnings: usize,
}

impl MergeOutcome {
    pub fn render(&self, style: Style) -> String {
        match style {
            Style::Text => self.render_text(),
            Style::Json => {
                let mut out = serde_json::to_string_pretty(self).unwrap();
                out.push('\n');
                out
            }
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Files Discovered: {}", self.files_discovered).unwrap();
        writeln!(
            out,
            "Final Coverage: {}/{} ({:.2}%)",
            self.covered_elements, self.elements, self.coverage_percentage
        )
        .unwrap();
        if let Some(threshold) = self.threshold {
            let pct = self.coverage_percentage;
            if self.passed {
                writeln!(
                    out,
                    "Coverage is above required threshold ({pct:.2}% > {threshold:.2}%)."
                )
                .unwrap();
            } else {
                writeln!(
                    out,
                    "Coverage is below required threshold ({pct:.2}% <= {threshold:.2}%)."
                )
                .unwrap();
            }
        }
        out
    }
}
