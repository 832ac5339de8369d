//! Incremental generation from documents on disk.

use shapecheck::Session;
use shapecheck_config::ShapecheckConfig;
use std::path::{Path, PathBuf};

const USER: &str = r#"{"file": "src/user.ts", "declarations": [
    {"name": "User", "exported": true, "type": {"kind": "object", "fields": [
        {"name": "name", "type": {"kind": "string"}},
        {"name": "address", "type": {"kind": "ref", "name": "Address"}}
    ]}}
]}"#;

const ADDRESS: &str = r#"{"file": "src/address.ts", "declarations": [
    {"name": "Address", "exported": true, "type": {"kind": "object", "fields": [
        {"name": "city", "type": {"kind": "string"}}
    ]}}
]}"#;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn incremental(cache_path: Option<PathBuf>) -> ShapecheckConfig {
    let mut config = ShapecheckConfig::default();
    config.incremental.enabled = true;
    config.incremental.cache_path = cache_path;
    config
}

#[test]
fn unchanged_documents_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let user = write(dir.path(), "user.json", USER);
    let address = write(dir.path(), "address.json", ADDRESS);
    let paths = vec![user.clone(), address.clone()];

    let mut session = Session::new(incremental(None));
    let first = session.generate_paths(&paths).unwrap();
    assert_eq!(first.modules.len(), 2);
    assert!(first.skipped.is_empty());

    let second = session.generate_paths(&paths).unwrap();
    assert!(second.modules.is_empty());
    assert_eq!(second.skipped, paths);

    // editing one document regenerates only that one, still resolving
    // its reference into the unchanged document
    write(dir.path(), "user.json", &USER.replace(r#""name": "name""#, r#""name": "fullName""#));
    let third = session.generate_paths(&paths).unwrap();
    assert_eq!(third.modules.len(), 1);
    assert_eq!(third.modules[0].file, "src/user.ts");
    assert!(third.modules[0].text.contains("fullName: z.string(), address: AddressSchema"));
    assert!(
        third.modules[0]
            .text
            .contains("import { AddressSchema } from \"./address.schema\";")
    );
    assert_eq!(third.skipped, vec![address]);
    assert_eq!(session.stats().documents_skipped, 3);
}

#[test]
fn without_incremental_mode_everything_is_generated() {
    let dir = tempfile::tempdir().unwrap();
    let user = write(dir.path(), "user.json", USER);
    let address = write(dir.path(), "address.json", ADDRESS);
    let paths = vec![user, address];

    let mut session = Session::new(ShapecheckConfig::default());
    session.generate_paths(&paths).unwrap();
    let again = session.generate_paths(&paths).unwrap();
    assert_eq!(again.modules.len(), 2);
    assert!(again.skipped.is_empty());
}

#[test]
fn file_records_persist_between_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let user = write(dir.path(), "user.json", USER);
    let address = write(dir.path(), "address.json", ADDRESS);
    let store = dir.path().join(".shapecheck").join("files.json");
    let paths = vec![user, address];

    let mut first = Session::new(incremental(Some(store.clone())));
    assert_eq!(first.generate_paths(&paths).unwrap().modules.len(), 2);
    assert_eq!(first.finish().saved, Some(true));
    assert!(store.is_file());

    let mut second = Session::new(incremental(Some(store)));
    assert_eq!(second.tracker().len(), 2);
    let report = second.generate_paths(&paths).unwrap();
    assert!(report.modules.is_empty());
    assert_eq!(report.skipped.len(), 2);
}

#[test]
fn unreadable_document_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(dir.path(), "bad.json", "{ not json");
    let mut session = Session::new(ShapecheckConfig::default());
    let err = session.generate_paths(&[bad]).unwrap_err();
    assert!(err.to_string().contains("invalid declaration document"));
}

#[test]
fn failed_call_leaves_documents_pending() {
    let dir = tempfile::tempdir().unwrap();
    let address = write(dir.path(), "address.json", ADDRESS);
    let user = write(dir.path(), "user.json", "{ not json");
    let paths = vec![address, user];

    let mut session = Session::new(incremental(None));
    assert!(session.generate_paths(&paths).is_err());
    assert!(session.tracker().is_empty());

    write(dir.path(), "user.json", USER);
    let report = session.generate_paths(&paths).unwrap();
    let mut files: Vec<&str> = report.modules.iter().map(|m| m.file.as_str()).collect();
    files.sort();
    assert_eq!(files, vec!["src/address.ts", "src/user.ts"]);
    assert!(report.skipped.is_empty());
    assert_eq!(session.tracker().len(), 2);
}
