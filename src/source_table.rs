//! Tab-separated source table loading.
//!
//! Line 1 holds the column names. Line 2 is the definition row telling what
//! each column is: `std`, `opt`, `gene`, or empty. The first cell may carry
//! the `#gcon:defs` tag instead of `std`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Connection, MarkerName};
use crate::error::GconError;

pub const IDENTIFIER_FIELD: &str = "identifier";
pub const SCIENTIFIC_NAME_FIELD: &str = "scientificName";
pub const DEFINITIONS_TAG: &str = "#gcon:defs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefinition {
    Standard,
    Optional,
    Gene,
    Unset,
}

impl ColumnDefinition {
    fn parse(value: &str, column: &str, index: usize) -> Result<Self, GconError> {
        match value.trim() {
            "std" => Ok(ColumnDefinition::Standard),
            "opt" => Ok(ColumnDefinition::Optional),
            "gene" => Ok(ColumnDefinition::Gene),
            "" => Ok(ColumnDefinition::Unset),
            DEFINITIONS_TAG if index == 0 => Ok(ColumnDefinition::Standard),
            other => Err(GconError::InvalidSourceTable(format!(
                "unknown definition `{other}` for column `{column}`"
            ))),
        }
    }
}

/// Value of an optional or gene column for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Accessions(Vec<String>),
    Text(String),
}

/// One specimen row of the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub identifier: String,
    #[serde(rename = "scientificName")]
    pub scientific_name: String,
    pub uuid: Uuid,
    #[serde(flatten)]
    pub columns: BTreeMap<String, ColumnValue>,
}

impl SourceRow {
    /// Accessions listed under `marker`; empty when the cell is blank.
    pub fn accessions(&self, marker: &MarkerName) -> &[String] {
        match self.columns.get(marker.as_str()) {
            Some(ColumnValue::Accessions(accessions)) => accessions,
            _ => &[],
        }
    }

    pub fn optional(&self, field: &str) -> Option<&str> {
        match self.columns.get(field) {
            Some(ColumnValue::Text(value)) => Some(value),
            _ => None,
        }
    }
}

/// Parsed source table plus the connections built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub data: Vec<SourceRow>,
    pub optional_fields: Vec<String>,
    pub gene_fields: Vec<MarkerName>,
    pub connections: Vec<Connection>,
}

impl ReferenceData {
    pub fn new(
        data: Vec<SourceRow>,
        optional_fields: Vec<String>,
        gene_fields: Vec<MarkerName>,
    ) -> Self {
        Self {
            data,
            optional_fields,
            gene_fields,
            connections: Vec::new(),
        }
    }

    pub fn with_connections(&mut self, connections: impl IntoIterator<Item = Connection>) {
        self.connections.extend(connections);
    }

    /// Every accession listed under `marker`, in row order.
    pub fn marker_accessions(&self, marker: &MarkerName) -> Vec<String> {
        self.data
            .iter()
            .flat_map(|row| row.accessions(marker).iter().cloned())
            .collect()
    }
}

/// Loads a source table from disk. Files ending in `.gz` are decompressed.
pub fn load_source_table(
    path: &Path,
    ignore_duplicates: bool,
) -> Result<ReferenceData, GconError> {
    if !path.is_file() {
        return Err(GconError::SourceTableNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|err| GconError::Filesystem(err.to_string()))?;
    let is_gzip = path.extension().and_then(|ext| ext.to_str()) == Some("gz");
    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let reference = read_source_table(BufReader::new(reader), ignore_duplicates)?;
    debug!(
        path = %path.display(),
        rows = reference.data.len(),
        markers = reference.gene_fields.len(),
        "source table loaded"
    );
    Ok(reference)
}

pub fn read_source_table<R: Read>(
    reader: R,
    ignore_duplicates: bool,
) -> Result<ReferenceData, GconError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(table_error)?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    let mut unique_headers = HashSet::new();
    for header in &headers {
        if !unique_headers.insert(header.as_str()) {
            return Err(GconError::InvalidSourceTable(format!(
                "column `{header}` appears more than once"
            )));
        }
    }

    let mut records = csv_reader.records();
    let definition_row = records
        .next()
        .ok_or_else(|| {
            GconError::InvalidSourceTable("unable to find definition row".to_string())
        })?
        .map_err(table_error)?;
    let definitions = headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            ColumnDefinition::parse(definition_row.get(index).unwrap_or(""), header, index)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let identifier_index = column_index(&headers, IDENTIFIER_FIELD)?;
    let scientific_name_index = column_index(&headers, SCIENTIFIC_NAME_FIELD)?;

    let mut optional_fields = Vec::new();
    let mut gene_fields = Vec::new();
    for (index, (header, definition)) in headers.iter().zip(&definitions).enumerate() {
        match definition {
            ColumnDefinition::Optional => optional_fields.push((index, header.clone())),
            ColumnDefinition::Gene => gene_fields.push((index, header.parse::<MarkerName>()?)),
            ColumnDefinition::Standard | ColumnDefinition::Unset => {}
        }
    }

    let mut rows = Vec::new();
    let mut identifiers = HashSet::new();
    for (offset, record) in records.enumerate() {
        let record = record.map_err(table_error)?;
        let line = offset + 3;
        if record.len() > headers.len() {
            return Err(GconError::InvalidSourceTable(format!(
                "line {line}: {} cells for {} columns",
                record.len(),
                headers.len()
            )));
        }
        let cell = |index: usize| record.get(index).unwrap_or("").trim();

        let identifier = cell(identifier_index);
        if identifier.is_empty() {
            return Err(GconError::InvalidSourceTable(format!(
                "line {line}: empty `{IDENTIFIER_FIELD}`"
            )));
        }
        if !identifiers.insert(identifier.to_string()) {
            return Err(GconError::InvalidSourceTable(format!(
                "line {line}: `{IDENTIFIER_FIELD}` value `{identifier}` is not unique"
            )));
        }
        let scientific_name = cell(scientific_name_index);
        if scientific_name.is_empty() {
            return Err(GconError::InvalidSourceTable(format!(
                "line {line}: empty `{SCIENTIFIC_NAME_FIELD}`"
            )));
        }

        let mut columns = BTreeMap::new();
        for (index, field) in &optional_fields {
            columns.insert(field.clone(), ColumnValue::Text(cell(*index).to_string()));
        }
        for (index, marker) in &gene_fields {
            columns.insert(
                marker.to_string(),
                ColumnValue::Accessions(split_accessions(cell(*index))),
            );
        }

        rows.push(SourceRow {
            identifier: identifier.to_string(),
            scientific_name: scientific_name.to_string(),
            uuid: Uuid::new_v4(),
            columns,
        });
    }

    let gene_fields: Vec<MarkerName> =
        gene_fields.into_iter().map(|(_, marker)| marker).collect();
    check_duplicate_accessions(&rows, &gene_fields, ignore_duplicates)?;

    Ok(ReferenceData::new(
        rows,
        optional_fields.into_iter().map(|(_, field)| field).collect(),
        gene_fields,
    ))
}

fn column_index(headers: &[String], name: &str) -> Result<usize, GconError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| GconError::InvalidSourceTable(format!("unable to find `{name}` column")))
}

fn table_error(err: csv::Error) -> GconError {
    GconError::InvalidSourceTable(err.to_string())
}

pub(crate) fn split_accessions(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|accession| !accession.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_duplicate_accessions(
    rows: &[SourceRow],
    gene_fields: &[MarkerName],
    ignore_duplicates: bool,
) -> Result<(), GconError> {
    let mut repeated: BTreeMap<&MarkerName, BTreeSet<&str>> = BTreeMap::new();
    let mut owners: BTreeMap<&str, BTreeSet<&MarkerName>> = BTreeMap::new();
    for marker in gene_fields {
        let mut seen = HashSet::new();
        for accession in rows.iter().flat_map(|row| row.accessions(marker)) {
            if !seen.insert(accession.as_str()) {
                repeated.entry(marker).or_default().insert(accession);
            }
            owners.entry(accession).or_default().insert(marker);
        }
    }

    let mut problems = Vec::new();
    for (marker, accessions) in &repeated {
        let accessions = accessions.iter().copied().collect::<Vec<_>>().join(", ");
        warn!(%marker, "accessions repeated within column: {accessions}");
        problems.push(format!("`{marker}` repeats {accessions}"));
    }
    for (accession, markers) in owners.iter().filter(|(_, markers)| markers.len() > 1) {
        let markers = markers
            .iter()
            .map(|marker| marker.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        warn!(%accession, "accession listed under several markers: {markers}");
        problems.push(format!("`{accession}` is listed under {markers}"));
    }

    if problems.is_empty() || ignore_duplicates {
        return Ok(());
    }
    Err(GconError::DuplicateAccessions(problems.join("; ")))
}
