use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::RecordCache;
use crate::connections::build_connections;
use crate::domain::SourceGenome;
use crate::error::GconError;
use crate::lock::StepLock;
use crate::metadata::MetadataKeyGroup;
use crate::ncbi::SequenceFetcher;
use crate::report::report_paths;
use crate::scoring::build_match_scores;
use crate::source_table::{ReferenceData, load_source_table};
use crate::store::{RecordReader, RecordWriter};

pub const REFERENCE_DATA_FILE: &str = "reference_data.json";
pub const COLLECT_METADATA_STEP: &str = "collect_metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    FetchAndBuild,
    Score,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::FetchAndBuild => write!(f, "fetch-and-build"),
            Stage::Score => write!(f, "score"),
            Stage::Persist => write!(f, "persist"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub source_table: PathBuf,
    pub output: Utf8PathBuf,
    pub work_dir: Utf8PathBuf,
    pub ignore_duplicates: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveSummary {
    pub rows: usize,
    pub connections: usize,
    pub scored: usize,
    pub reused_lock: bool,
    pub json_report: String,
    pub flat_report: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateSummary {
    pub rows: usize,
    pub optional_fields: Vec<String>,
    pub gene_fields: Vec<GeneFieldSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneFieldSummary {
    pub marker: String,
    pub source_genome: String,
    pub accessions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceGenomeInfo {
    pub prefix: String,
    pub genome: String,
    pub example: String,
}

/// Runs LOAD, FETCH_AND_BUILD, SCORE and PERSIST over one source table.
pub struct Pipeline<S, F> {
    store: S,
    fetcher: F,
    chunk_size: usize,
}

impl<S, F> Pipeline<S, F>
where
    S: RecordReader + RecordWriter,
    F: SequenceFetcher,
{
    pub fn new(store: S, fetcher: F, chunk_size: usize) -> Self {
        Self {
            store,
            fetcher,
            chunk_size,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolve(
        &self,
        options: &ResolveOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveSummary, GconError> {
        let started = Instant::now();

        emit(sink, started, format!("phase=Load; {}", options.source_table.display()));
        let reference = load_source_table(&options.source_table, options.ignore_duplicates)
            .map_err(|err| err.in_stage(Stage::Load))?;
        info!(
            rows = reference.data.len(),
            markers = reference.gene_fields.len(),
            "source table loaded"
        );

        emit(sink, started, "phase=FetchAndBuild; collecting metadata".to_string());
        fs::create_dir_all(options.work_dir.as_std_path())
            .map_err(|err| GconError::Filesystem(err.to_string()).in_stage(Stage::FetchAndBuild))?;
        let (mut reference, reused_lock) = self
            .collect_metadata(reference, &options.work_dir, sink)
            .map_err(|err| err.in_stage(Stage::FetchAndBuild))?;

        emit(sink, started, "phase=Score; scoring connections".to_string());
        let scored =
            build_match_scores(&mut reference).map_err(|err| err.in_stage(Stage::Score))?;
        info!(scored, "connections scored");

        let (json_report, flat_report) = report_paths(&options.output);
        emit(sink, started, format!("phase=Persist; {json_report}"));
        reference
            .write_json(&json_report)
            .and_then(|()| reference.write_flat_report(&flat_report))
            .map_err(|err| err.in_stage(Stage::Persist))?;
        info!(json = %json_report, tsv = %flat_report, "reports written");

        Ok(ResolveSummary {
            rows: reference.data.len(),
            connections: reference.connections.len(),
            scored,
            reused_lock,
            json_report: json_report.to_string(),
            flat_report: flat_report.to_string(),
            finished_at: Utc::now().to_rfc3339(),
        })
    }

    /// Fetches nodes for every marker and builds the connections. Guarded by
    /// a step lock in `work_dir`: once finished, later runs reload the saved
    /// reference data instead of fetching again. The flag is true on reuse.
    pub fn collect_metadata(
        &self,
        reference: ReferenceData,
        work_dir: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<(ReferenceData, bool), GconError> {
        if !work_dir.is_dir() {
            return Err(GconError::InvalidDirectory(work_dir.as_std_path().to_path_buf()));
        }
        MetadataKeyGroup::validate_registry()?;

        let snapshot = work_dir.join(REFERENCE_DATA_FILE);
        let lock = StepLock::new(work_dir, COLLECT_METADATA_STEP);
        if lock.has_lock() {
            info!(path = %snapshot, "step already finished; reloading reference data");
            return Ok((ReferenceData::from_json(&snapshot)?, true));
        }

        let cache = RecordCache::new(&self.store, &self.store, &self.fetcher, self.chunk_size);
        let mut by_marker = BTreeMap::new();
        for marker in &reference.gene_fields {
            sink.event(ProgressEvent {
                message: format!("phase=FetchAndBuild; marker {marker}"),
                elapsed: None,
            });
            let accessions = reference.marker_accessions(marker);
            let nodes = cache.collect_marker_nodes(marker, &accessions)?;
            debug!(%marker, nodes = nodes.len(), "marker resolved");
            by_marker.insert(marker.clone(), nodes);
        }
        info!("fetching sequences done");

        let connections = build_connections(&reference, &by_marker)?;
        let mut reference = reference;
        reference.with_connections(connections);

        debug!(path = %snapshot, "persisting reference data");
        reference.write_json(&snapshot)?;
        lock.lock()?;
        Ok((reference, false))
    }
}

/// Loads and validates a source table without fetching anything.
pub fn validate_source_table(
    path: &std::path::Path,
    ignore_duplicates: bool,
) -> Result<ValidateSummary, GconError> {
    let reference =
        load_source_table(path, ignore_duplicates).map_err(|err| err.in_stage(Stage::Load))?;
    let gene_fields = reference
        .gene_fields
        .iter()
        .map(|marker| GeneFieldSummary {
            marker: marker.to_string(),
            source_genome: marker.source_genome().to_string(),
            accessions: reference.marker_accessions(marker).len(),
        })
        .collect();
    Ok(ValidateSummary {
        rows: reference.data.len(),
        optional_fields: reference.optional_fields.clone(),
        gene_fields,
    })
}

pub fn source_genomes() -> Vec<SourceGenomeInfo> {
    SourceGenome::ALL
        .iter()
        .map(|genome| SourceGenomeInfo {
            prefix: genome.prefix().to_string(),
            genome: genome.to_string(),
            example: genome.example_marker().to_string(),
        })
        .collect()
}

fn emit(sink: &dyn ProgressSink, started: Instant, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: Some(started.elapsed()),
    });
}
