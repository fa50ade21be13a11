//! Completeness scoring.
//!
//! For every weighted group, each of its keys is scored by the largest set
//! of distinct accessions agreeing on one normalized value, times the group
//! weight. A group contributes its best key. `observed` is the sum of group
//! contributions, `reachable` credits the full weight of every group that
//! contributed at all, and both are divided by the score a connection would
//! reach if every node agreed on every weighted group.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::domain::{Connection, ConnectionScores, Node};
use crate::error::GconError;
use crate::metadata::{MetadataKey, MetadataKeyGroup, QualifierValue};
use crate::source_table::ReferenceData;

/// Keeps alphanumeric characters only, lower-cased.
pub fn normalize_value(value: &QualifierValue) -> String {
    value
        .to_string()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Largest number of distinct accessions sharing one normalized value under
/// `key`, times the key's group weight.
pub fn key_contribution(nodes: &[Node], key: &MetadataKey) -> u32 {
    let mut shared: HashMap<String, HashSet<&str>> = HashMap::new();
    for node in nodes {
        let Some(values) = node.metadata.get(key) else {
            continue;
        };
        for value in values {
            shared
                .entry(normalize_value(value))
                .or_default()
                .insert(node.accession.as_str());
        }
    }
    let agreeing = shared.values().map(HashSet::len).max().unwrap_or(0);
    agreeing as u32 * key.group.score()
}

/// Contribution of every weighted group to the observed score.
pub fn observed_group_scores(connection: &Connection) -> BTreeMap<MetadataKeyGroup, u32> {
    MetadataKeyGroup::non_zero()
        .map(|group| {
            let best = group
                .keys()
                .iter()
                .map(|key| key_contribution(&connection.nodes, &MetadataKey::new(group, *key)))
                .max()
                .unwrap_or(0);
            (group, best)
        })
        .collect()
}

pub fn score_connection(connection: &Connection) -> ConnectionScores {
    let node_count = connection.nodes.len() as u32;
    let group_scores = observed_group_scores(connection);

    let expected: u32 = MetadataKeyGroup::non_zero()
        .map(|group| group.score() * node_count)
        .sum();
    if expected == 0 {
        return ConnectionScores::EMPTY;
    }

    let observed: u32 = group_scores.values().sum();
    let reachable: u32 = group_scores
        .iter()
        .filter(|(_, score)| **score > 0)
        .map(|(group, _)| group.score() * node_count)
        .sum();

    ConnectionScores::new(
        f64::from(observed) / f64::from(expected),
        f64::from(reachable) / f64::from(expected),
    )
}

/// Scores every connection of `reference` in place.
pub fn build_match_scores(reference: &mut ReferenceData) -> Result<usize, GconError> {
    if reference.connections.len() != reference.data.len() {
        return Err(GconError::ConnectionCountMismatch {
            rows: reference.data.len(),
            connections: reference.connections.len(),
        });
    }
    for connection in &mut reference.connections {
        let scores = score_connection(connection);
        debug!(
            id = %connection.id,
            observed = scores.observed_completeness_score,
            reachable = scores.reachable_completeness_score,
            "connection scored"
        );
        connection.with_scores(scores);
    }
    Ok(reference.connections.len())
}
