use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GconError;

/// Category a GenBank source qualifier belongs to. Each group carries a fixed
/// weight and owns a fixed set of lower-case qualifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataKeyGroup {
    Specimen,
    Taxonomy,
    HostSubstrate,
    TimeReferences,
    GeoReferences,
    Assay,
    ExternalLinks,
    Actors,
    Other,
}

static KEY_INDEX: LazyLock<HashMap<&'static str, MetadataKeyGroup>> = LazyLock::new(|| {
    let mut index = HashMap::new();
    for group in MetadataKeyGroup::ALL {
        for key in group.keys() {
            index.entry(*key).or_insert(group);
        }
    }
    index
});

impl MetadataKeyGroup {
    pub const ALL: [MetadataKeyGroup; 9] = [
        MetadataKeyGroup::Specimen,
        MetadataKeyGroup::Taxonomy,
        MetadataKeyGroup::HostSubstrate,
        MetadataKeyGroup::TimeReferences,
        MetadataKeyGroup::GeoReferences,
        MetadataKeyGroup::Assay,
        MetadataKeyGroup::ExternalLinks,
        MetadataKeyGroup::Actors,
        MetadataKeyGroup::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetadataKeyGroup::Specimen => "SPECIMEN",
            MetadataKeyGroup::Taxonomy => "TAXONOMY",
            MetadataKeyGroup::HostSubstrate => "HOST_SUBSTRATE",
            MetadataKeyGroup::TimeReferences => "TIME_REFERENCES",
            MetadataKeyGroup::GeoReferences => "GEO_REFERENCES",
            MetadataKeyGroup::Assay => "ASSAY",
            MetadataKeyGroup::ExternalLinks => "EXTERNAL_LINKS",
            MetadataKeyGroup::Actors => "ACTORS",
            MetadataKeyGroup::Other => "OTHER",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetadataKeyGroup::Specimen => {
                "Keys that distinguish the specimen among samples of the same species."
            }
            MetadataKeyGroup::Taxonomy => "Taxonomic and infra-specific rank keys.",
            MetadataKeyGroup::HostSubstrate => "Host affinity or substrate preference keys.",
            MetadataKeyGroup::TimeReferences => "Collection time keys.",
            MetadataKeyGroup::GeoReferences => "Geographic location keys.",
            MetadataKeyGroup::Assay => {
                "Molecular technique keys (extraction, primers, extracted molecule)."
            }
            MetadataKeyGroup::ExternalLinks => "External database links.",
            MetadataKeyGroup::Actors => "People involved in collection and identification.",
            MetadataKeyGroup::Other => "Keys not mapped to any other group.",
        }
    }

    /// Weight used by completeness scoring. Zero-weight groups never
    /// contribute.
    pub fn score(&self) -> u32 {
        match self {
            MetadataKeyGroup::Specimen => 8,
            MetadataKeyGroup::Taxonomy => 5,
            MetadataKeyGroup::HostSubstrate => 3,
            MetadataKeyGroup::TimeReferences => 2,
            MetadataKeyGroup::GeoReferences => 2,
            MetadataKeyGroup::Assay
            | MetadataKeyGroup::ExternalLinks
            | MetadataKeyGroup::Actors
            | MetadataKeyGroup::Other => 0,
        }
    }

    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            MetadataKeyGroup::Specimen => &[
                "bio_material",
                "clone",
                "culture_collection",
                "isolate",
                "specimen_voucher",
                "strain",
                "subclone",
                "substrain",
            ],
            MetadataKeyGroup::Taxonomy => &[
                "biovar",
                "biotype",
                "breed",
                "cultivar",
                "genotype",
                "haplogroup",
                "haplotype",
                "serogroup",
                "serotype",
                "serovar",
                "variety",
                "pathovar",
                "pop_variant",
                "organism",
                "type_material",
                "ecotype",
                "forma",
                "forma_specialis",
            ],
            MetadataKeyGroup::HostSubstrate => &["host", "isolation_source"],
            MetadataKeyGroup::TimeReferences => &["collection_date"],
            MetadataKeyGroup::GeoReferences => &["altitude", "country", "isolation", "lat_lon"],
            MetadataKeyGroup::Assay => &[
                "cell_line",
                "cell_type",
                "dev_stage",
                "fwd_primer_name",
                "fwd_primer_seq",
                "lab_host",
                "mol_type",
                "pcr_primers",
                "rev_primer_name",
                "rev_primer_seq",
                "segment",
                "tissue_lib",
                "tissue_type",
                "type",
                "subtype",
            ],
            MetadataKeyGroup::ExternalLinks => &["db_xref"],
            MetadataKeyGroup::Actors => &["authority", "collected_by", "identified_by"],
            MetadataKeyGroup::Other => &["note", "sex"],
        }
    }

    pub fn non_zero() -> impl Iterator<Item = MetadataKeyGroup> {
        Self::ALL.into_iter().filter(|group| group.score() > 0)
    }

    /// Resolves the group owning `key` (case-insensitive). Unknown keys fall
    /// back to [`MetadataKeyGroup::Other`].
    pub fn classify(key: &str) -> MetadataKeyGroup {
        let key = key.to_lowercase();
        match KEY_INDEX.get(key.as_str()) {
            Some(group) => *group,
            None => {
                warn!("key `{key}` not classified; default group OTHER used");
                MetadataKeyGroup::Other
            }
        }
    }

    pub fn from_name(name: &str) -> Option<MetadataKeyGroup> {
        Self::ALL.into_iter().find(|group| group.name() == name)
    }

    /// Checks that no key is owned by two groups and that every key is a
    /// non-empty lower-case name. Run once at startup.
    pub fn validate_registry() -> Result<(), GconError> {
        check_unique_keys(Self::ALL.iter().map(|group| (group.name(), group.keys())))
    }
}

impl fmt::Display for MetadataKeyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MetadataKeyGroup {
    type Err = GconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(value).ok_or_else(|| GconError::InvalidMetadataKey(value.to_string()))
    }
}

pub(crate) fn check_unique_keys<'a, I>(table: I) -> Result<(), GconError>
where
    I: IntoIterator<Item = (&'static str, &'a [&'a str])>,
{
    let mut owners: HashMap<&str, &'static str> = HashMap::new();
    for (group, keys) in table {
        for key in keys {
            if key.is_empty() || key.to_lowercase() != *key {
                return Err(GconError::InvalidMetadataKey(format!(
                    "{group} key `{key}` must be a non-empty lower-case name"
                )));
            }
            if let Some(first) = owners.insert(*key, group) {
                return Err(GconError::DuplicateGroupKey {
                    key: key.to_string(),
                    first,
                    second: group,
                });
            }
        }
    }
    Ok(())
}

/// A raw qualifier value. GenBank only ever yields text; integers survive
/// from JSON documents written by other tools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualifierValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for QualifierValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualifierValue::Integer(value) => write!(f, "{value}"),
            QualifierValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for QualifierValue {
    fn from(value: &str) -> Self {
        QualifierValue::Text(value.to_string())
    }
}

impl From<String> for QualifierValue {
    fn from(value: String) -> Self {
        QualifierValue::Text(value)
    }
}

impl From<i64> for QualifierValue {
    fn from(value: i64) -> Self {
        QualifierValue::Integer(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetadataKey {
    pub group: MetadataKeyGroup,
    pub key: String,
}

impl MetadataKey {
    pub fn new(group: MetadataKeyGroup, key: impl Into<String>) -> Self {
        Self {
            group,
            key: key.into(),
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group.name(), self.key)
    }
}

/// Parses the `GROUP.key` form used in reports.
impl FromStr for MetadataKey {
    type Err = GconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (group, key) = value
            .split_once('.')
            .ok_or_else(|| GconError::InvalidMetadataKey(value.to_string()))?;
        let group = MetadataKeyGroup::from_name(group)
            .ok_or_else(|| GconError::InvalidMetadataKey(value.to_string()))?;
        if key.is_empty() {
            return Err(GconError::InvalidMetadataKey(value.to_string()));
        }
        Ok(Self::new(group, key))
    }
}

/// Qualifiers of one record, keyed by their classified [`MetadataKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<QualifierValue>>",
    into = "BTreeMap<String, Vec<QualifierValue>>"
)]
pub struct Metadata {
    qualifiers: BTreeMap<MetadataKey, Vec<QualifierValue>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `key` (lower-cased) and inserts or overwrites its values.
    pub fn add_feature(
        &mut self,
        key: &str,
        values: Vec<QualifierValue>,
    ) -> Result<&mut Self, GconError> {
        let key = key.to_lowercase();
        if values.is_empty() {
            return Err(GconError::EmptyQualifier(key));
        }
        let group = MetadataKeyGroup::classify(&key);
        self.qualifiers.insert(MetadataKey::new(group, key), values);
        Ok(self)
    }

    pub fn get(&self, key: &MetadataKey) -> Option<&[QualifierValue]> {
        self.qualifiers.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &MetadataKey) -> bool {
        self.qualifiers.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &MetadataKey> {
        self.qualifiers.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKey, &[QualifierValue])> {
        self.qualifiers
            .iter()
            .map(|(key, values)| (key, values.as_slice()))
    }

    pub fn values_in_group(
        &self,
        group: MetadataKeyGroup,
    ) -> impl Iterator<Item = &QualifierValue> {
        self.qualifiers
            .iter()
            .filter(move |(key, _)| key.group == group)
            .flat_map(|(_, values)| values.iter())
    }

    pub fn len(&self) -> usize {
        self.qualifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualifiers.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<QualifierValue>>> for Metadata {
    type Error = GconError;

    fn try_from(grouped: BTreeMap<String, Vec<QualifierValue>>) -> Result<Self, Self::Error> {
        let mut metadata = Metadata::new();
        for (grouped_key, values) in grouped {
            let expected: MetadataKey = grouped_key.parse()?;
            metadata.add_feature(&expected.key, values)?;
            if !metadata.contains_key(&expected) {
                return Err(GconError::InvalidMetadataKey(format!(
                    "`{grouped_key}` does not belong to group {}",
                    expected.group
                )));
            }
        }
        Ok(metadata)
    }
}

impl From<Metadata> for BTreeMap<String, Vec<QualifierValue>> {
    fn from(metadata: Metadata) -> Self {
        metadata
            .qualifiers
            .into_iter()
            .map(|(key, values)| (key.to_string(), values))
            .collect()
    }
}
