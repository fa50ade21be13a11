use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{Connection, MarkerName, Node, collect_unique_identifiers};
use crate::error::GconError;
use crate::source_table::ReferenceData;

/// Builds one connection per source row from the nodes collected for each
/// marker. Rows without any resolvable node still yield an empty connection.
pub fn build_connections(
    reference: &ReferenceData,
    by_marker: &BTreeMap<MarkerName, Vec<Node>>,
) -> Result<Vec<Connection>, GconError> {
    let mut connections = Vec::with_capacity(reference.data.len());
    for row in &reference.data {
        let mut row_nodes: Vec<Node> = Vec::new();
        for marker in &reference.gene_fields {
            let accessions = row.accessions(marker);
            if accessions.is_empty() {
                continue;
            }
            let marker_nodes = by_marker
                .get(marker)
                .ok_or_else(|| GconError::MarkerNotCollected(marker.to_string()))?;
            row_nodes.extend(
                marker_nodes
                    .iter()
                    .filter(|node| accessions.contains(&node.accession))
                    .cloned(),
            );
        }

        let mut identifiers = collect_unique_identifiers(&row_nodes);
        identifiers.insert(row.identifier.clone());

        let connection = Connection::new(row.uuid, identifiers).with_nodes(row_nodes);
        debug!(
            identifier = %row.identifier,
            nodes = connection.nodes.len(),
            "connection built"
        );
        connections.push(connection);
    }
    Ok(connections)
}
