use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GconError;
use crate::metadata::{Metadata, MetadataKey, MetadataKeyGroup};

static MARKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{3}-[a-zA-Z0-9]+$").expect("valid marker pattern"));

/// Genome compartment encoded in the three-letter marker prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceGenome {
    Nucleus,
    Mitochondria,
    Plastid,
    Unknown,
}

impl SourceGenome {
    pub const ALL: [SourceGenome; 4] = [
        SourceGenome::Nucleus,
        SourceGenome::Mitochondria,
        SourceGenome::Plastid,
        SourceGenome::Unknown,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            SourceGenome::Nucleus => "nuc",
            SourceGenome::Mitochondria => "mit",
            SourceGenome::Plastid => "pla",
            SourceGenome::Unknown => "unk",
        }
    }

    pub fn example_marker(&self) -> &'static str {
        match self {
            SourceGenome::Nucleus => "nuc-its",
            SourceGenome::Mitochondria => "mit-gapdh",
            SourceGenome::Plastid => "pla-rbcl",
            SourceGenome::Unknown => "unk-gene",
        }
    }

    pub fn from_prefix(prefix: &str) -> SourceGenome {
        Self::ALL
            .into_iter()
            .find(|genome| genome.prefix() == prefix)
            .unwrap_or(SourceGenome::Unknown)
    }
}

impl fmt::Display for SourceGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceGenome::Nucleus => write!(f, "NUCLEUS"),
            SourceGenome::Mitochondria => write!(f, "MITOCHONDRIA"),
            SourceGenome::Plastid => write!(f, "PLASTID"),
            SourceGenome::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A gene/marker column name such as `nuc-its`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarkerName(String);

impl MarkerName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn source_genome(&self) -> SourceGenome {
        let prefix = self.0.split('-').next().unwrap_or_default();
        SourceGenome::from_prefix(prefix)
    }
}

impl fmt::Display for MarkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MarkerName {
    type Err = GconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !MARKER_PATTERN.is_match(trimmed) {
            return Err(GconError::InvalidMarker(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for MarkerName {
    type Error = GconError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MarkerName> for String {
    fn from(value: MarkerName) -> Self {
        value.0
    }
}

/// One fetched sequence record.
///
/// Identity is `(accession, marker, qualifier key set)`: two nodes for the
/// same accession and marker carrying different values under the same keys
/// compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub accession: String,
    pub marker: MarkerName,
    pub metadata: Metadata,
}

impl Node {
    pub fn new(accession: impl Into<String>, marker: MarkerName, metadata: Metadata) -> Self {
        Self {
            accession: accession.into(),
            marker,
            metadata,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.accession == other.accession
            && self.marker == other.marker
            && self.metadata.keys().eq(other.metadata.keys())
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.accession.hash(state);
        self.marker.hash(state);
        for key in self.metadata.keys() {
            key.hash(state);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionScores {
    pub observed_completeness_score: f64,
    pub reachable_completeness_score: f64,
}

impl ConnectionScores {
    pub const EMPTY: ConnectionScores = ConnectionScores {
        observed_completeness_score: 0.0,
        reachable_completeness_score: 0.0,
    };

    /// Builds scores rounded to two decimals.
    pub fn new(observed: f64, reachable: f64) -> Self {
        Self {
            observed_completeness_score: round2(observed),
            reachable_completeness_score: round2(reachable),
        }
    }

    /// `100 - observed * 100 / reachable`, zero when nothing was reachable.
    pub fn information_gain(&self) -> f64 {
        if self.reachable_completeness_score <= 0.0 {
            return 0.0;
        }
        let observed = self.observed_completeness_score * 100.0;
        round2(100.0 - observed / self.reachable_completeness_score)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Records believed to describe one specimen, built from one source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub identifiers: BTreeSet<String>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub scores: Option<ConnectionScores>,
}

impl Connection {
    pub fn new(id: Uuid, identifiers: BTreeSet<String>) -> Self {
        Self {
            id,
            identifiers,
            nodes: Vec::new(),
            scores: None,
        }
    }

    /// Appends every node in order. An accession listed under two markers
    /// stays a member once per marker.
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn with_scores(&mut self, scores: ConnectionScores) {
        self.scores = Some(scores);
    }

    pub fn markers(&self) -> BTreeSet<&MarkerName> {
        self.nodes.iter().map(|node| &node.marker).collect()
    }

    pub fn accessions_for(&self, marker: &MarkerName) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| &node.marker == marker)
            .map(|node| node.accession.as_str())
            .collect()
    }

    pub fn metadata_keys(&self) -> BTreeSet<&MetadataKey> {
        self.nodes
            .iter()
            .flat_map(|node| node.metadata.keys())
            .collect()
    }
}

/// Collects every value recorded under a SPECIMEN-grouped key across `nodes`.
pub fn collect_unique_identifiers<'a>(
    nodes: impl IntoIterator<Item = &'a Node>,
) -> BTreeSet<String> {
    nodes
        .into_iter()
        .flat_map(|node| node.metadata.values_in_group(MetadataKeyGroup::Specimen))
        .map(|value| value.to_string())
        .collect()
}

pub(crate) fn dedup_preserving_order(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|value| seen.insert(value.as_str()))
        .cloned()
        .collect()
}
