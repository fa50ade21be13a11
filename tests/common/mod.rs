#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use gcon::domain::{MarkerName, Node};
use gcon::error::GconError;
use gcon::genbank::{RawFeature, RawRecord, parse_genbank};
use gcon::metadata::{Metadata, QualifierValue};
use gcon::ncbi::SequenceFetcher;

pub const SOURCE_TABLE: &str = "identifier\tscientificName\tliterature\tnuc-its\tmit-gapdh\n\
#gcon:defs\tstd\topt\tgene\tgene\n\
CBS 123.45\tFusarium oxysporum\t\tMK000001\tMK000101\n\
CBS 678.90\tFusarium solani\tSmith 2020\tMK000002,MK000003\t\n\
IMI 1\tFusarium sp.\t\t\t\n";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn marker(name: &str) -> MarkerName {
    name.parse().unwrap()
}

pub fn source_record(accession: &str, qualifiers: &[(&str, &str)]) -> RawRecord {
    RawRecord {
        id: format!("{accession}.1"),
        name: accession.to_string(),
        features: vec![RawFeature {
            kind: "source".to_string(),
            qualifiers: qualifiers
                .iter()
                .map(|(key, value)| (key.to_string(), vec![value.to_string()]))
                .collect(),
        }],
    }
}

pub fn node(accession: &str, marker_name: &str, qualifiers: &[(&str, &str)]) -> Node {
    let mut metadata = Metadata::new();
    for (key, value) in qualifiers {
        metadata
            .add_feature(key, vec![QualifierValue::from(*value)])
            .unwrap();
    }
    Node::new(accession, marker(marker_name), metadata)
}

/// Records from `sample.gb` plus two hand-built records for the second row.
pub fn sample_records() -> Vec<RawRecord> {
    let content = std::fs::read_to_string(fixture("sample.gb")).unwrap();
    let mut records = parse_genbank(&content).unwrap();
    records.push(source_record(
        "MK000002",
        &[("organism", "Fusarium solani"), ("isolate", "X-7")],
    ));
    records.push(source_record(
        "MK000003",
        &[("organism", "Fusarium solani"), ("host", "tomato")],
    ));
    records
}

/// Serves records by locus name and records every requested batch.
#[derive(Default)]
pub struct MockFetcher {
    records: BTreeMap<String, RawRecord>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl MockFetcher {
    pub fn with_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.name.clone(), record))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

impl SequenceFetcher for MockFetcher {
    fn fetch_batch(&self, ids: &[String]) -> Result<Vec<RawRecord>, GconError> {
        self.requests.lock().unwrap().push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect())
    }
}

/// Fails every request, for runs that must not reach the network.
pub struct FailingFetcher;

impl SequenceFetcher for FailingFetcher {
    fn fetch_batch(&self, _ids: &[String]) -> Result<Vec<RawRecord>, GconError> {
        Err(GconError::EntrezHttp("network disabled".to_string()))
    }
}
