use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

mod pedigree_csv;

pub use pedigree_csv::DelimitedPedigreeParser;

use crate::pedigree::Pedigree;

/// Anything that can produce a validated pedigree from a file
pub trait PedigreeSource {
    fn parse(&self, path: &Path) -> Result<Pedigree>;
}

/// Entry point for loading pedigree files
pub struct FileParser;

impl FileParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, path: &Path) -> Result<Pedigree> {
        DelimitedPedigreeParser::new().parse(path)
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn open_file(path: &Path) -> Result<BufReader<File>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Pick the delimiter that splits the header line into the most fields
pub fn detect_delimiter(header: &str) -> u8 {
    [b',', b'\t', b';']
        .into_iter()
        .max_by_key(|&d| header.bytes().filter(|&b| b == d).count())
        .filter(|&d| header.as_bytes().contains(&d))
        .unwrap_or(b',')
}

/// Read the first line without consuming it from the caller's view
pub fn peek_header<R: Read>(reader: &mut BufReader<R>) -> Result<String> {
    let buf = reader.fill_buf().context("Failed to read header")?;
    let end = buf
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Trait column semantics: "1" has the trait, "0" does not, anything else is unknown
pub fn parse_trait_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_delimiters() {
        assert_eq!(detect_delimiter("name,mother,father,trait"), b',');
        assert_eq!(detect_delimiter("name\tmother\tfather\ttrait"), b'\t');
        assert_eq!(detect_delimiter("name;mother;father;trait"), b';');
        assert_eq!(detect_delimiter("name"), b',');
    }

    #[test]
    fn trait_flag_is_tri_state() {
        assert_eq!(parse_trait_flag("1"), Some(true));
        assert_eq!(parse_trait_flag(" 0 "), Some(false));
        assert_eq!(parse_trait_flag(""), None);
        assert_eq!(parse_trait_flag("yes"), None);
    }
}
