//! GenBank records as far as node building needs them.
//!
//! Parsing is done by `gb_io`; this module keeps the LOCUS name, the VERSION
//! id and the feature qualifiers, and drops sequence data and references.

use gb_io::reader::parse_slice;
use gb_io::seq::{Feature, Seq};

use crate::error::GconError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeature {
    pub kind: String,
    /// Qualifiers in file order. Repeated keys accumulate their values and
    /// flag qualifiers carry an empty value.
    pub qualifiers: Vec<(String, Vec<String>)>,
}

impl RawFeature {
    pub fn qualifier(&self, key: &str) -> Option<&[String]> {
        self.qualifiers
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, values)| values.as_slice())
    }

    fn push_qualifier(&mut self, key: String, value: String) {
        match self
            .qualifiers
            .iter_mut()
            .find(|(existing, _)| *existing == key)
        {
            Some((_, values)) => values.push(value),
            None => self.qualifiers.push((key, vec![value])),
        }
    }

    fn from_feature(feature: &Feature) -> Self {
        let mut raw = RawFeature {
            kind: feature.kind.to_string(),
            qualifiers: Vec::new(),
        };
        for (key, value) in &feature.qualifiers {
            raw.push_qualifier(key.to_string(), value.clone().unwrap_or_default());
        }
        raw
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Versioned accession from the VERSION line, or the LOCUS name when absent.
    pub id: String,
    pub name: String,
    pub features: Vec<RawFeature>,
}

impl RawRecord {
    pub fn source_feature(&self) -> Option<&RawFeature> {
        self.features.iter().find(|feature| feature.kind == "source")
    }

    /// True when this record answers a request for `accession`, with or
    /// without a version suffix.
    pub fn matches_accession(&self, accession: &str) -> bool {
        if self.id == accession || self.name == accession {
            return true;
        }
        accession
            .rsplit_once('.')
            .is_some_and(|(base, _)| base == self.name)
    }

    fn from_seq(seq: &Seq) -> Result<Self, GconError> {
        let name = seq
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| GconError::GenbankParse("record without a LOCUS name".to_string()))?;
        let id = seq
            .version
            .clone()
            .filter(|version| !version.trim().is_empty())
            .unwrap_or_else(|| name.clone());
        Ok(Self {
            id,
            name,
            features: seq.features.iter().map(RawFeature::from_feature).collect(),
        })
    }
}

/// Parses every record of a multi-record GenBank document. A blank payload
/// holds no records.
pub fn parse_genbank(content: &str) -> Result<Vec<RawRecord>, GconError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let seqs = parse_slice(content.as_bytes())
        .map_err(|err| GconError::GenbankParse(err.to_string()))?;
    seqs.iter().map(RawRecord::from_seq).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = "\
LOCUS       MK000001                  20 bp    DNA     linear   PLN 01-JAN-2020
DEFINITION  Fusarium oxysporum strain CBS 123.45 internal transcribed spacer.
ACCESSION   MK000001
VERSION     MK000001.1
KEYWORDS    .
SOURCE      Fusarium oxysporum
  ORGANISM  Fusarium oxysporum
            Eukaryota; Fungi.
FEATURES             Location/Qualifiers
     source          1..20
                     /organism=\"Fusarium oxysporum\"
                     /mol_type=\"genomic DNA\"
                     /strain=\"CBS 123.45\"
                     /db_xref=\"taxon:5507\"
                     /db_xref=\"BOLD:ABC1234\"
                     /environmental_sample
     misc_RNA        <1..>20
                     /note=\"contains ITS1\"
ORIGIN
        1 aacctgcgga aggatcatta
//
";

    #[test]
    fn parses_source_qualifiers() {
        let records = parse_genbank(RECORD).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "MK000001");
        assert_eq!(record.id, "MK000001.1");
        assert_eq!(record.features.len(), 2);

        let source = record.source_feature().unwrap();
        assert_eq!(
            source.qualifier("organism"),
            Some(&["Fusarium oxysporum".to_string()][..])
        );
        assert_eq!(source.qualifier("db_xref").map(<[String]>::len), Some(2));
        assert_eq!(
            source.qualifier("environmental_sample"),
            Some(&[String::new()][..])
        );
    }

    #[test]
    fn matches_accession_with_or_without_version() {
        let record = &parse_genbank(RECORD).unwrap()[0];
        assert!(record.matches_accession("MK000001"));
        assert!(record.matches_accession("MK000001.1"));
        assert!(record.matches_accession("MK000001.2"));
        assert!(!record.matches_accession("MK000002"));
    }

    #[test]
    fn blank_payload_has_no_records() {
        assert!(parse_genbank("\n\n").unwrap().is_empty());
    }
}
