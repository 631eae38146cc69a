use std::collections::BTreeMap;

use assert_matches::assert_matches;

use vdb_manager::config::{Config, ConfigLoader, DownloadSection, UploadSection, default_fasta_fields};
use vdb_manager::error::VdbError;

#[test]
fn parse_config_sections() {
    let config: Config = serde_json::from_str(
        r#"{
            "database": "test_vdb",
            "store_root": "/srv/vdb",
            "download": { "path": "out", "join_key": "accession" },
            "upload": { "header_fields": { "0": "accession", "1": "strain" }, "locus": "genome" }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.database.as_str(), "test_vdb");
    assert_eq!(resolved.store_root.unwrap().as_str(), "/srv/vdb");
    assert_eq!(resolved.output_path, "out");
    assert_eq!(resolved.join_key, "accession");
    assert_eq!(resolved.fasta_fields, default_fasta_fields());
    assert_eq!(resolved.header_fields.get(&1).map(String::as_str), Some("strain"));
    assert_eq!(resolved.default_locus.as_deref(), Some("genome"));
}

#[test]
fn rejects_unknown_database() {
    let config = Config {
        database: Some("production".to_string()),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, VdbError::InvalidDatabase(_));
}

#[test]
fn rejects_non_numeric_header_position() {
    let config = Config {
        download: Some(DownloadSection::default()),
        upload: Some(UploadSection {
            header_fields: Some(BTreeMap::from([("first".to_string(), "strain".to_string())])),
            locus: None,
        }),
        ..Config::default()
    };
    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, VdbError::ConfigParse(_));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, VdbError::ConfigRead(_));
}
