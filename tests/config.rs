use std::fs;

use assert_matches::assert_matches;

use micrometab::config::{ConfigLoader, Source};
use micrometab::error::MetabError;

#[test]
fn explicit_config_file_is_read() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("micrometab.json");
    fs::write(
        &path,
        r#"{
            "kb_dir": "/data/kegg",
            "source": "kegg",
            "workers": 4,
            "hub_threshold": 25,
            "strict_records": true,
            "network": {"filter_very_common": false, "min_component_size": 4}
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.kb_dir, "/data/kegg");
    assert_eq!(resolved.source, Source::Kegg);
    assert_eq!(resolved.workers, 4);
    assert_eq!(resolved.hub_threshold, 25);
    assert!(resolved.strict_records);
    assert!(!resolved.network.filter_very_common);
    assert_eq!(resolved.network.min_component_size, Some(4));
    assert_eq!(resolved.store_dir, ".micrometab");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, MetabError::ConfigRead(_));
}

#[test]
fn invalid_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("micrometab.json");
    fs::write(&path, r#"{"source": "ftp"}"#).unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, MetabError::ConfigParse(_));
}
