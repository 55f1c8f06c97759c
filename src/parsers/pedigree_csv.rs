use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::parsers::{detect_delimiter, open_file, parse_trait_flag, peek_header};
use crate::pedigree::Pedigree;
use crate::types::Individual;

/// Parser for delimited pedigree files with a `name,mother,father,trait` header.
///
/// Column order does not matter and header names are matched
/// case-insensitively. Only `name` is required; blank parent cells mean the
/// parent is unknown and a blank or unrecognised trait cell means the trait
/// status is unobserved.
pub struct DelimitedPedigreeParser;

impl DelimitedPedigreeParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<Pedigree> {
        let reader = open_file(path)?;
        self.parse_reader(reader)
            .with_context(|| format!("Failed to load pedigree from {}", path.display()))
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<Pedigree> {
        let mut reader = BufReader::new(reader);
        let delimiter = detect_delimiter(&peek_header(&mut reader)?);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers().context("Failed to read header row")?;
        let columns = self.map_columns(headers)?;

        let mut individuals = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            // Header is line 1
            let line = row + 2;
            let record = record.with_context(|| format!("Malformed record on line {}", line))?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            individuals.push(self.parse_record(&record, &columns, line)?);
        }

        debug!("Parsed {} pedigree records", individuals.len());
        Ok(Pedigree::new(individuals)?)
    }

    fn map_columns(&self, headers: &csv::StringRecord) -> Result<HashMap<&'static str, usize>> {
        let mut mapping = HashMap::new();

        for (i, header) in headers.iter().enumerate() {
            match header.trim().to_lowercase().as_str() {
                "name" | "individual" | "id" => {
                    mapping.insert("name", i);
                }
                "mother" | "mom" => {
                    mapping.insert("mother", i);
                }
                "father" | "dad" => {
                    mapping.insert("father", i);
                }
                "trait" | "phenotype" => {
                    mapping.insert("trait", i);
                }
                other => warn!("Ignoring unknown pedigree column '{}'", other),
            }
        }

        if !mapping.contains_key("name") {
            return Err(anyhow!("Required column 'name' not found in header"));
        }

        Ok(mapping)
    }

    fn parse_record(
        &self,
        record: &csv::StringRecord,
        columns: &HashMap<&'static str, usize>,
        line: usize,
    ) -> Result<Individual> {
        let field = |column: &str| {
            columns
                .get(column)
                .and_then(|&idx| record.get(idx))
                .filter(|value| !value.is_empty())
        };

        let name = field("name").ok_or_else(|| anyhow!("Missing name on line {}", line))?;

        Ok(Individual {
            name: name.to_string(),
            mother: field("mother").map(str::to_string),
            father: field("father").map(str::to_string),
            trait_observed: field("trait").and_then(parse_trait_flag),
        })
    }
}

impl Default for DelimitedPedigreeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl super::PedigreeSource for DelimitedPedigreeParser {
    fn parse(&self, path: &Path) -> Result<Pedigree> {
        self.parse(path)
    }
}
