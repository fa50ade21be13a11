mod common;

use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use gcon::config::ResolvedConfig;
use gcon::error::{ErrorKind, GconError};
use gcon::lock::StepLock;
use gcon::ncbi::EntrezHttpClient;
use gcon::pipeline::{
    COLLECT_METADATA_STEP, Pipeline, ProgressEvent, ProgressSink, REFERENCE_DATA_FILE,
    ResolveOptions, Stage, source_genomes, validate_source_table,
};
use gcon::source_table::{ReferenceData, read_source_table};
use gcon::store::MemoryStore;
use tempfile::TempDir;

use common::{FailingFetcher, MockFetcher, marker, node, sample_records, source_record};

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn options(dir: &TempDir) -> ResolveOptions {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    ResolveOptions {
        source_table: common::fixture("source_table.tsv"),
        output: root.join("out").join("report"),
        work_dir: root.join("work"),
        ignore_duplicates: false,
    }
}

#[test]
fn resolve_writes_scored_reports() {
    let dir = TempDir::new().unwrap();
    let options = options(&dir);
    let fetcher = MockFetcher::with_records(sample_records());
    let pipeline = Pipeline::new(MemoryStore::new(), &fetcher, 15);
    let sink = RecordingSink::default();

    let summary = pipeline.resolve(&options, &sink).unwrap();

    assert_eq!(summary.rows, 3);
    assert_eq!(summary.connections, 3);
    assert_eq!(summary.scored, 3);
    assert!(!summary.reused_lock);
    assert_eq!(
        fetcher.requests(),
        vec![
            vec!["MK000001".to_string(), "MK000002".to_string(), "MK000003".to_string()],
            vec!["MK000101".to_string()],
        ]
    );
    assert_eq!(pipeline.store().len(), 4);

    let json = options.output.with_extension("json");
    assert_eq!(summary.json_report, json.as_str());
    assert!(options.output.with_extension("tsv").is_file());

    let report = ReferenceData::from_json(&json).unwrap();
    let first = report.connections[0].scores.unwrap();
    assert_eq!(first.reachable_completeness_score, 1.0);
    assert!(first.observed_completeness_score > 0.8);
    assert!(first.observed_completeness_score < 0.85);
    let second = report.connections[1].scores.unwrap();
    assert_eq!(second.reachable_completeness_score, 0.8);
    let third = report.connections[2].scores.unwrap();
    assert_eq!(third.observed_completeness_score, 0.0);
    assert!(report.connections[2].nodes.is_empty());

    assert!(options.work_dir.join(REFERENCE_DATA_FILE).is_file());
    assert!(StepLock::new(options.work_dir.clone(), COLLECT_METADATA_STEP).has_lock());

    let messages = sink.messages.lock().unwrap();
    for phase in ["Load", "FetchAndBuild", "Score", "Persist"] {
        let tag = format!("phase={phase};");
        assert!(messages.iter().any(|m| m.starts_with(&tag)), "missing {phase}");
    }
}

#[test]
fn finished_step_is_reused_without_fetching() {
    let dir = TempDir::new().unwrap();
    let options = options(&dir);
    let fetcher = MockFetcher::with_records(sample_records());
    let first = Pipeline::new(MemoryStore::new(), &fetcher, 15)
        .resolve(&options, &RecordingSink::default())
        .unwrap();
    let first_report = ReferenceData::from_json(&Utf8PathBuf::from(first.json_report)).unwrap();

    let pipeline = Pipeline::new(MemoryStore::new(), FailingFetcher, 15);
    let second = pipeline.resolve(&options, &RecordingSink::default()).unwrap();

    assert!(second.reused_lock);
    assert!(pipeline.store().is_empty());
    let second_report = ReferenceData::from_json(&Utf8PathBuf::from(second.json_report)).unwrap();
    let ids = |report: &ReferenceData| -> Vec<_> {
        report.connections.iter().map(|c| c.id).collect()
    };
    assert_eq!(ids(&first_report), ids(&second_report));
}

#[test]
fn cached_run_needs_no_contact_email() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::with_nodes([
        node("MK000001", "nuc-its", &[("strain", "CBS 123.45")]),
        node("MK000002", "nuc-its", &[("isolate", "X-7")]),
        node("MK000003", "nuc-its", &[("host", "tomato")]),
        node("MK000101", "mit-gapdh", &[("strain", "CBS 123.45")]),
    ]);
    let fetcher = EntrezHttpClient::new(&ResolvedConfig::default()).unwrap();
    let pipeline = Pipeline::new(store, fetcher, 15);

    let summary = pipeline
        .resolve(&options(&dir), &RecordingSink::default())
        .unwrap();
    assert_eq!(summary.connections, 3);
    assert!(pipeline.store().write_batches().is_empty());
}

#[test]
fn missing_contact_email_fails_fetch_stage() {
    let dir = TempDir::new().unwrap();
    let fetcher = EntrezHttpClient::new(&ResolvedConfig::default()).unwrap();
    let pipeline = Pipeline::new(MemoryStore::new(), fetcher, 15);

    let err = pipeline
        .resolve(&options(&dir), &RecordingSink::default())
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::FetchAndBuild));
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_matches!(
        err,
        GconError::Stage { source, .. } if matches!(*source, GconError::MissingEmail)
    );
    assert!(!StepLock::new(options(&dir).work_dir, COLLECT_METADATA_STEP).has_lock());
}

#[test]
fn fetch_failure_leaves_no_lock() {
    let dir = TempDir::new().unwrap();
    let options = options(&dir);
    let pipeline = Pipeline::new(MemoryStore::new(), FailingFetcher, 15);

    let err = pipeline.resolve(&options, &RecordingSink::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::FetchAndBuild));
    assert_eq!(err.kind(), ErrorKind::Retrieval);
    assert!(!options.work_dir.join(REFERENCE_DATA_FILE).exists());
    assert!(!options.output.with_extension("json").exists());
}

#[test]
fn missing_source_table_fails_load_stage() {
    let dir = TempDir::new().unwrap();
    let mut options = options(&dir);
    options.source_table = dir.path().join("absent.tsv");
    let pipeline = Pipeline::new(MemoryStore::new(), FailingFetcher, 15);

    let err = pipeline.resolve(&options, &RecordingSink::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Load));
    assert_eq!(err.kind(), ErrorKind::Argument);
}

#[test]
fn validate_summarizes_markers() {
    let summary = validate_source_table(&common::fixture("source_table.tsv"), false).unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.optional_fields, vec!["literature"]);
    assert_eq!(summary.gene_fields.len(), 2);
    assert_eq!(summary.gene_fields[0].marker, "nuc-its");
    assert_eq!(summary.gene_fields[0].source_genome, "NUCLEUS");
    assert_eq!(summary.gene_fields[0].accessions, 3);
    assert_eq!(summary.gene_fields[1].source_genome, "MITOCHONDRIA");
}

#[test]
fn source_genomes_cover_every_prefix() {
    let prefixes: Vec<String> = source_genomes().into_iter().map(|g| g.prefix).collect();
    assert_eq!(prefixes, vec!["nuc", "mit", "pla", "unk"]);
}

#[test]
fn accession_under_two_markers_joins_once_per_marker() {
    let table = "identifier\tscientificName\tnuc-its\tnuc-lsu\n\
#gcon:defs\tstd\tgene\tgene\n\
CBS 1\tFusarium\tA\tA\n";
    let reference = read_source_table(table.as_bytes(), true).unwrap();
    let dir = TempDir::new().unwrap();
    let work_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let fetcher = MockFetcher::with_records([source_record("A", &[("strain", "CBS 1")])]);
    let pipeline = Pipeline::new(MemoryStore::new(), &fetcher, 15);

    let (reference, reused) = pipeline
        .collect_metadata(reference, &work_dir, &RecordingSink::default())
        .unwrap();

    assert!(!reused);
    assert_eq!(fetcher.requests(), vec![vec!["A".to_string()]]);
    let connection = &reference.connections[0];
    assert_eq!(connection.nodes.len(), 2);
    assert_eq!(connection.accessions_for(&marker("nuc-its")), vec!["A"]);
    assert_eq!(connection.accessions_for(&marker("nuc-lsu")), vec!["A"]);
}
