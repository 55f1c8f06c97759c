use anyhow::{Context, Result};
use chrono::Local;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::config::ProbabilityTables;
use crate::types::{GeneCount, Posterior};

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Indented listing, one block per person
    #[default]
    Text,
    Json,
    Csv,
    Tsv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Tsv => "tsv",
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    source: &'a str,
    tables: &'a ProbabilityTables,
    individuals: &'a [Posterior],
}

/// Renders posterior distributions for display or further processing
pub struct ReportGenerator<'a> {
    source: String,
    tables: &'a ProbabilityTables,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(source: &str, tables: &'a ProbabilityTables) -> Self {
        Self {
            source: source.to_string(),
            tables,
        }
    }

    /// Write the report to `path`, or to stdout when no path is given
    pub fn generate(
        &self,
        posteriors: &[Posterior],
        format: ReportFormat,
        path: Option<&Path>,
    ) -> Result<()> {
        match path {
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("Failed to create report {}", path.display()))?;
                self.write(posteriors, format, &mut file)
                    .with_context(|| format!("Failed to write report to {}", path.display()))
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                self.write(posteriors, format, &mut handle)
            }
        }
    }

    pub fn write<W: Write>(
        &self,
        posteriors: &[Posterior],
        format: ReportFormat,
        out: &mut W,
    ) -> Result<()> {
        match format {
            ReportFormat::Text => self.write_text(posteriors, out),
            ReportFormat::Json => self.write_json(posteriors, out),
            ReportFormat::Csv => self.write_delimited(posteriors, b',', out),
            ReportFormat::Tsv => self.write_delimited(posteriors, b'\t', out),
        }
    }

    fn write_text<W: Write>(&self, posteriors: &[Posterior], out: &mut W) -> Result<()> {
        for posterior in posteriors {
            writeln!(out, "{}:", posterior.name)?;
            writeln!(out, "  Gene:")?;
            for gene in GeneCount::ALL {
                writeln!(out, "    {}: {:.4}", gene.copies(), posterior.gene.get(gene))?;
            }
            writeln!(out, "  Trait:")?;
            writeln!(out, "    True: {:.4}", posterior.trait_.present)?;
            writeln!(out, "    False: {:.4}", posterior.trait_.absent)?;
        }
        out.flush()?;
        Ok(())
    }

    fn write_json<W: Write>(&self, posteriors: &[Posterior], out: &mut W) -> Result<()> {
        let report = JsonReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source: &self.source,
            tables: self.tables,
            individuals: posteriors,
        };
        let json =
            to_string_pretty(&report).with_context(|| "Failed to serialize results to JSON")?;
        writeln!(out, "{}", json)?;
        out.flush()?;
        Ok(())
    }

    fn write_delimited<W: Write>(
        &self,
        posteriors: &[Posterior],
        delimiter: u8,
        out: &mut W,
    ) -> Result<()> {
        let mut wtr = WriterBuilder::new().delimiter(delimiter).from_writer(out);

        wtr.write_record([
            "name",
            "gene_2",
            "gene_1",
            "gene_0",
            "trait_true",
            "trait_false",
        ])?;

        for posterior in posteriors {
            wtr.write_record([
                posterior.name.clone(),
                format!("{:.4}", posterior.gene.two),
                format!("{:.4}", posterior.gene.one),
                format!("{:.4}", posterior.gene.zero),
                format!("{:.4}", posterior.trait_.present),
                format!("{:.4}", posterior.trait_.absent),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }
}
