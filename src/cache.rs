use tracing::{debug, warn};

use crate::domain::{MarkerName, Node, dedup_preserving_order};
use crate::error::GconError;
use crate::genbank::{RawFeature, RawRecord};
use crate::metadata::{Metadata, QualifierValue};
use crate::ncbi::SequenceFetcher;
use crate::store::{RecordReader, RecordWriter};

/// Get-or-fetch-and-store over accessions of one marker.
pub struct RecordCache<R, W, F> {
    reader: R,
    writer: W,
    fetcher: F,
    chunk_size: usize,
}

impl<R, W, F> RecordCache<R, W, F>
where
    R: RecordReader,
    W: RecordWriter,
    F: SequenceFetcher,
{
    pub fn new(reader: R, writer: W, fetcher: F, chunk_size: usize) -> Self {
        Self {
            reader,
            writer,
            fetcher,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns nodes for `accessions`, fetching only the ones missing from
    /// the cache. Any failure aborts the whole marker.
    pub fn collect_marker_nodes(
        &self,
        marker: &MarkerName,
        accessions: &[String],
    ) -> Result<Vec<Node>, GconError> {
        let accessions = dedup_preserving_order(accessions);
        debug!(%marker, accessions = accessions.len(), "looking up cached nodes");

        let mut cached = Vec::new();
        let mut missing = Vec::new();
        for accession in accessions {
            match self.reader.get(&accession)? {
                Some(mut node) => {
                    // The store is keyed by accession alone; the node answers
                    // for whichever marker asked for it.
                    node.marker = marker.clone();
                    cached.push(node);
                }
                None => missing.push(accession),
            }
        }
        debug!(%marker, cached = cached.len(), missing = missing.len(), "cache lookup done");

        let chunks: Vec<&[String]> = missing.chunks(self.chunk_size).collect();
        let mut fetched: Vec<Node> = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            debug!(
                %marker,
                "processing chunk {} of {}, size {}",
                index + 1,
                chunks.len(),
                chunk.len()
            );
            let records = self.fetcher.fetch_batch(chunk)?;
            let chunk_nodes = build_chunk_nodes(marker, chunk, &records)?;

            let mut batch = chunk_nodes.clone();
            batch.extend(cached.iter().cloned());
            self.writer.put_many(&batch)?;
            fetched.extend(chunk_nodes);
        }

        let unresolved: Vec<&str> = missing
            .iter()
            .filter(|accession| !fetched.iter().any(|node| &node.accession == *accession))
            .map(String::as_str)
            .collect();
        if !unresolved.is_empty() {
            warn!(
                %marker,
                "no record returned for {} accession(s): {}",
                unresolved.len(),
                unresolved.join(", ")
            );
        }

        fetched.extend(cached);
        Ok(fetched)
    }
}

fn build_chunk_nodes(
    marker: &MarkerName,
    requested: &[String],
    records: &[RawRecord],
) -> Result<Vec<Node>, GconError> {
    let mut nodes = Vec::with_capacity(records.len());
    for record in records {
        let source = record
            .source_feature()
            .ok_or_else(|| GconError::MissingSourceFeature(record.id.clone()))?;
        let metadata = place_qualifiers(source)?;
        let accession = requested
            .iter()
            .find(|accession| record.matches_accession(accession))
            .cloned()
            .unwrap_or_else(|| record.name.clone());
        nodes.push(Node::new(accession, marker.clone(), metadata));
    }
    Ok(nodes)
}

/// Builds node metadata from the qualifiers of a `source` feature.
pub fn place_qualifiers(feature: &RawFeature) -> Result<Metadata, GconError> {
    let mut metadata = Metadata::new();
    for (key, values) in &feature.qualifiers {
        let values = values
            .iter()
            .map(|value| QualifierValue::from(value.as_str()))
            .collect();
        metadata.add_feature(key, values)?;
    }
    Ok(metadata)
}
