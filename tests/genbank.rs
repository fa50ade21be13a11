mod common;

use gcon::genbank::parse_genbank;

#[test]
fn parses_fixture_records() {
    let content = std::fs::read_to_string(common::fixture("sample.gb")).unwrap();
    let records = parse_genbank(&content).unwrap();
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.name, "MK000001");
    assert_eq!(first.id, "MK000001.1");
    let source = first.source_feature().unwrap();
    assert_eq!(source.qualifier("strain"), Some(&["CBS 123.45".to_string()][..]));
    assert_eq!(
        source.qualifier("country"),
        Some(&["Brazil: Sao Paulo".to_string()][..])
    );
    assert_eq!(first.features[1].kind, "misc_RNA");
    assert!(first.features[1].qualifier("note").is_some());

    let second = &records[1];
    assert_eq!(second.id, "MK000101.2");
    assert!(second.matches_accession("MK000101"));
    assert!(second.matches_accession("MK000101.2"));
    assert!(!second.matches_accession("MK000001"));
    let kinds: Vec<&str> = second.features.iter().map(|f| f.kind.as_str()).collect();
    assert_eq!(kinds, ["source", "gene", "mRNA"]);
    let mrna = &second.features[2];
    assert_eq!(mrna.qualifier("gene"), Some(&["gapdh".to_string()][..]));
}

#[test]
fn blank_document_has_no_records() {
    assert!(parse_genbank("").unwrap().is_empty());
}
