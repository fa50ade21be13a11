use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::Connection;
use crate::error::GconError;
use crate::metadata::MetadataKey;
use crate::source_table::{ColumnValue, ReferenceData};
use crate::store::write_bytes_atomic;

pub const FLAT_REPORT_FIXED_COLUMNS: [&str; 6] = [
    "id",
    "identifiers",
    "nodes",
    "observed_completeness_score",
    "reachable_completeness_score",
    "information_gain",
];

const LIST_SEPARATOR: &str = ";";

/// `<output>.json` and `<output>.tsv`, replacing any extension on `output`.
pub fn report_paths(output: &Utf8Path) -> (Utf8PathBuf, Utf8PathBuf) {
    (output.with_extension("json"), output.with_extension("tsv"))
}

impl ReferenceData {
    pub fn to_json(&self) -> Result<String, GconError> {
        serde_json::to_string_pretty(self).map_err(|err| GconError::InvalidReport(err.to_string()))
    }

    pub fn write_json(&self, path: &Utf8Path) -> Result<(), GconError> {
        let content = self.to_json()?;
        write_bytes_atomic(path, content.as_bytes())?;
        debug!(path = %path, connections = self.connections.len(), "JSON report written");
        Ok(())
    }

    /// Reloads a document written by [`ReferenceData::write_json`]. Metadata
    /// keys must still classify into the group they were saved under.
    pub fn from_json(path: &Utf8Path) -> Result<Self, GconError> {
        if !path.is_file() {
            return Err(GconError::InvalidArgument(format!("invalid file path: `{path}`")));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| GconError::Filesystem(err.to_string()))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, GconError> {
        let reference: ReferenceData = serde_json::from_str(content)
            .map_err(|err| GconError::InvalidReport(err.to_string()))?;
        reference.validate_columns()?;
        Ok(reference)
    }

    fn validate_columns(&self) -> Result<(), GconError> {
        for row in &self.data {
            for marker in &self.gene_fields {
                if !matches!(row.columns.get(marker.as_str()), Some(ColumnValue::Accessions(_))) {
                    return Err(GconError::InvalidReport(format!(
                        "row `{}` has no accession list for `{marker}`",
                        row.identifier
                    )));
                }
            }
            for field in &self.optional_fields {
                if row.optional(field).is_none() {
                    return Err(GconError::InvalidReport(format!(
                        "row `{}` has no value for optional field `{field}`",
                        row.identifier
                    )));
                }
            }
        }
        Ok(())
    }

    /// Flat table, one row per connection. The first row is the header.
    pub fn flat_report_rows(&self) -> Vec<Vec<String>> {
        let metadata_columns: BTreeMap<String, &MetadataKey> = self
            .connections
            .iter()
            .flat_map(Connection::metadata_keys)
            .map(|key| (key.to_string(), key))
            .collect();

        let mut header: Vec<String> = FLAT_REPORT_FIXED_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .collect();
        header.extend(self.gene_fields.iter().map(|marker| marker.to_string()));
        header.extend(metadata_columns.keys().cloned());

        let mut rows = vec![header];
        for connection in &self.connections {
            let identifiers: Vec<&str> =
                connection.identifiers.iter().map(String::as_str).collect();
            let (observed, reachable, gain) = match &connection.scores {
                Some(scores) => (
                    scores.observed_completeness_score.to_string(),
                    scores.reachable_completeness_score.to_string(),
                    scores.information_gain().to_string(),
                ),
                None => (String::new(), String::new(), 0.0_f64.to_string()),
            };

            let mut row = vec![
                connection.id.to_string(),
                identifiers.join(LIST_SEPARATOR),
                connection.nodes.len().to_string(),
                observed,
                reachable,
                gain,
            ];
            for marker in &self.gene_fields {
                row.push(connection.accessions_for(marker).join(LIST_SEPARATOR));
            }
            for key in metadata_columns.values() {
                row.push(distinct_values(connection, key).join(LIST_SEPARATOR));
            }
            rows.push(row);
        }
        rows
    }

    pub fn write_flat_report(&self, path: &Utf8Path) -> Result<(), GconError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        for row in self.flat_report_rows() {
            writer
                .write_record(&row)
                .map_err(|err| GconError::Filesystem(err.to_string()))?;
        }
        let content = writer
            .into_inner()
            .map_err(|err| GconError::Filesystem(err.to_string()))?;
        write_bytes_atomic(path, &content)?;
        debug!(path = %path, "flat report written");
        Ok(())
    }
}

fn distinct_values(connection: &Connection, key: &MetadataKey) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut values = Vec::new();
    for node in &connection.nodes {
        for value in node.metadata.get(key).unwrap_or_default() {
            let value = value.to_string();
            if seen.insert(value.clone()) {
                values.push(value);
            }
        }
    }
    values
}
