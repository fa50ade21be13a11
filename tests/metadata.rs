use assert_matches::assert_matches;
use gcon::error::GconError;
use gcon::metadata::{Metadata, MetadataKey, MetadataKeyGroup, QualifierValue};

#[test]
fn every_registered_key_classifies_into_its_group() {
    for group in MetadataKeyGroup::ALL {
        for key in group.keys() {
            assert_eq!(MetadataKeyGroup::classify(key), group, "key `{key}`");
            assert_eq!(
                MetadataKeyGroup::classify(&key.to_uppercase()),
                group,
                "key `{key}` upper-cased"
            );
        }
    }
}

#[test]
fn unknown_key_falls_back_to_other() {
    assert_eq!(MetadataKeyGroup::classify("mystery_key"), MetadataKeyGroup::Other);
}

#[test]
fn registry_is_consistent() {
    MetadataKeyGroup::validate_registry().unwrap();
    let weighted: Vec<_> = MetadataKeyGroup::non_zero().map(|g| g.score()).collect();
    assert_eq!(weighted, vec![8, 5, 3, 2, 2]);
}

#[test]
fn metadata_serializes_with_group_prefixed_keys() {
    let mut metadata = Metadata::new();
    metadata
        .add_feature("Strain", vec![QualifierValue::from("CBS 1")])
        .unwrap()
        .add_feature("country", vec![QualifierValue::from("Brazil")])
        .unwrap();

    let json = serde_json::to_value(&metadata).unwrap();
    assert_eq!(json["SPECIMEN.strain"][0], "CBS 1");
    assert_eq!(json["GEO_REFERENCES.country"][0], "Brazil");

    let back: Metadata = serde_json::from_value(json).unwrap();
    assert_eq!(back, metadata);
    let strain = MetadataKey::new(MetadataKeyGroup::Specimen, "strain");
    assert_eq!(back.get(&strain), Some(&[QualifierValue::from("CBS 1")][..]));
}

#[test]
fn adding_a_key_again_overwrites_values() {
    let mut metadata = Metadata::new();
    metadata
        .add_feature("host", vec![QualifierValue::from("tomato")])
        .unwrap();
    metadata
        .add_feature("host", vec![QualifierValue::from("potato")])
        .unwrap();
    let host = MetadataKey::new(MetadataKeyGroup::HostSubstrate, "host");
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata.get(&host), Some(&[QualifierValue::from("potato")][..]));
}

#[test]
fn grouped_keys_must_match_the_registry() {
    let misplaced = serde_json::json!({ "TAXONOMY.strain": ["CBS 1"] });
    assert!(serde_json::from_value::<Metadata>(misplaced).is_err());

    let unknown_group = serde_json::json!({ "NOWHERE.strain": ["CBS 1"] });
    assert!(serde_json::from_value::<Metadata>(unknown_group).is_err());

    assert_matches!(
        "strain".parse::<MetadataKey>(),
        Err(GconError::InvalidMetadataKey(_))
    );
}
