//! Reads glossary terms from CSV.
//!
//! Columns, in order: term id, term name, parent term id, definition, description,
//! stakeholders. Stakeholders are `;`-separated `upn|objectId` pairs, e.g.
//! `user1@example.com|cf3092bd-53a1-41c3-8831-1aec571958f7;user2@example.com|...`.

use csv::{ReaderBuilder, StringRecord};
use glossary_core::{GlossaryError, Result, Stakeholder, TermRecord, TermSource};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const EXPECTED_FIELDS: usize = 6;

/// A CSV file of glossary terms.
pub struct CsvTermSource {
    path: PathBuf,
}

impl CsvTermSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TermSource for CsvTermSource {
    fn read_all(&self) -> Result<Vec<TermRecord>> {
        let file = std::fs::File::open(&self.path)?;
        let terms = read_terms(file)?;
        debug!("Read {} glossary terms from {}", terms.len(), self.path.display());
        Ok(terms)
    }
}

/// Parses every usable row of `reader`.
///
/// The header row (first field `ID`), blank rows, undecodable rows and rows with too
/// few fields are skipped. Fails only when the input cannot be read or no row is usable.
pub fn read_terms<R: Read>(reader: R) -> Result<Vec<TermRecord>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut terms = Vec::new();
    for (i, row) in csv.records().enumerate() {
        let row_number = i + 1;
        let row = match row {
            Ok(row) => row,
            Err(e) if e.is_io_error() => {
                return Err(GlossaryError::Parse(format!("row {row_number}: {e}")));
            }
            Err(e) => {
                warn!("Skipping row {}: {}", row_number, e);
                continue;
            }
        };

        if is_blank(&row) || row[0].trim().eq_ignore_ascii_case("ID") {
            continue;
        }

        match parse_row(&row) {
            Ok(term) => terms.push(term),
            Err(reason) => warn!("Skipping row {}: {}", row_number, reason),
        }
    }

    if terms.is_empty() {
        return Err(GlossaryError::Parse(
            "input contains no usable glossary terms".to_string(),
        ));
    }

    Ok(terms)
}

fn is_blank(row: &StringRecord) -> bool {
    row.iter().all(|field| field.trim().is_empty())
}

fn parse_row(row: &StringRecord) -> std::result::Result<TermRecord, String> {
    if row.len() < EXPECTED_FIELDS {
        return Err(format!(
            "expected {EXPECTED_FIELDS} fields, found {}",
            row.len()
        ));
    }

    let id = row[0].trim();
    let name = row[1].trim();
    if id.is_empty() {
        return Err("missing term id".to_string());
    }
    if name.is_empty() {
        return Err(format!("term {id} has no name"));
    }

    let mut term = TermRecord::new(id, name, non_empty(&row[2]))
        .with_definition(row[3].to_string())
        .with_stakeholders(parse_stakeholders(&row[5]));
    term.description = non_empty(&row[4]);
    Ok(term)
}

fn non_empty(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_string())
}

/// Parses a `;`-separated list of `upn|objectId` pairs.
///
/// A malformed entry is dropped on its own; the rest of the list still parses.
pub fn parse_stakeholders(field: &str) -> Vec<Stakeholder> {
    field
        .split(';')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match parse_stakeholder(entry) {
            Ok(stakeholder) => Some(stakeholder),
            Err(reason) => {
                warn!("Dropping stakeholder entry {:?}: {}", entry, reason);
                None
            }
        })
        .collect()
}

fn parse_stakeholder(entry: &str) -> std::result::Result<Stakeholder, String> {
    let parts: Vec<&str> = entry.split('|').collect();
    if parts.len() != 2 {
        return Err("expected `upn|objectId`".to_string());
    }

    let object_id = Uuid::parse_str(parts[1].trim()).map_err(|e| e.to_string())?;
    Stakeholder::new(object_id, non_empty(parts[0])).map_err(|e| e.to_string())
}
