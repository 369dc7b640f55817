use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use codelex_store::{CorporaFile, ScopeMask, StoreError};

fn dict_path(dir: &TempDir) -> PathBuf {
    dir.path().join("dictionary.txt")
}

fn open_rooted(dir: &TempDir) -> CorporaFile {
    CorporaFile::open_with(dict_path(dir), &[], Some(dir.path())).expect("open with root")
}

#[test]
fn registered_ids_persist_through_the_sidecar() {
    let dir = TempDir::new().unwrap();

    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("src/hello.c"), "8f14e45f").unwrap();
    dicts.add_by_file_id("helloworld", "8f14e45f").unwrap();
    dicts.close().unwrap();

    let sidecar = dir.path().join("dictionary.txt.fileids.json");
    assert!(sidecar.exists());
    let json = fs::read_to_string(&sidecar).unwrap();
    assert!(json.contains("8f14e45f"));
    assert!(json.contains("src/hello.c"));

    let dicts = open_rooted(&dir);
    assert_eq!(
        dicts.file_id_of(Path::new("src/hello.c")).unwrap(),
        Some("8f14e45f")
    );
    let abs = dir.path().join("src/hello.c");
    assert_eq!(dicts.file_id_of(&abs).unwrap(), Some("8f14e45f"));
    assert!(dicts.matches("helloworld", "hello.c", Some("8f14e45f"), ScopeMask::FILEID));
}

#[test]
fn paths_outside_the_root_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut dicts = open_rooted(&dir);
    let err = dicts
        .register_new_file(Path::new("/somewhere/else/x.c"), "id-x")
        .unwrap_err();
    assert!(matches!(err, StoreError::PathOutsideRoot { .. }));

    // The failed operation must not have touched state.
    assert!(!dicts.is_dirty());
}

#[test]
fn duplicate_registration_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("a.c"), "id-a").unwrap();
    let err = dicts.register_new_file(Path::new("a.c"), "id-b").unwrap_err();
    assert!(matches!(err, StoreError::AlreadyRegistered { .. }));
}

#[test]
fn merge_accepts_ids_or_filenames_and_unions_tokens() {
    let dir = TempDir::new().unwrap();

    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("a.c"), "id-a").unwrap();
    dicts.register_new_file(Path::new("b.c"), "id-b").unwrap();
    dicts.add_by_file_id("alpha", "id-a").unwrap();
    dicts.add_by_file_id("bravo", "id-b").unwrap();

    // merge_from by filename, merge_to by literal id.
    dicts.merge("a.c", "id-b").unwrap();

    assert_eq!(dicts.file_id_of(Path::new("a.c")).unwrap(), Some("id-b"));
    assert_eq!(dicts.file_id_of(Path::new("b.c")).unwrap(), Some("id-b"));
    assert!(dicts.matches("alpha", "x", Some("id-b"), ScopeMask::FILEID));
    assert!(dicts.matches("bravo", "x", Some("id-b"), ScopeMask::FILEID));
    assert!(!dicts.matches("alpha", "x", Some("id-a"), ScopeMask::FILEID));

    assert!(matches!(
        dicts.merge("nonexistent.c", "id-b"),
        Err(StoreError::UnknownReference(_))
    ));

    // The merged-away FILEID section is gone from the rewritten file.
    dicts.close().unwrap();
    let written = fs::read_to_string(dict_path(&dir)).unwrap();
    assert!(written.contains("FILEID: id-b"));
    assert!(!written.contains("FILEID: id-a"));
}

#[test]
fn rename_keeps_the_dictionary_and_overwrites_the_target() {
    let dir = TempDir::new().unwrap();

    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("old.c"), "id-old").unwrap();
    dicts.add_by_file_id("secret", "id-old").unwrap();
    dicts.rename(Path::new("old.c"), Path::new("new.c")).unwrap();

    assert_eq!(dicts.file_id_of(Path::new("old.c")).unwrap(), None);
    assert_eq!(dicts.file_id_of(Path::new("new.c")).unwrap(), Some("id-old"));
    assert!(dicts.matches("secret", "new.c", Some("id-old"), ScopeMask::FILEID));

    // Renaming onto a tracked path deletes that path's mapping first; the
    // orphaned id takes its dictionary with it.
    dicts.register_new_file(Path::new("other.c"), "id-other").unwrap();
    dicts.add_by_file_id("otherword", "id-other").unwrap();
    dicts.rename(Path::new("new.c"), Path::new("other.c")).unwrap();
    assert_eq!(dicts.file_id_of(Path::new("other.c")).unwrap(), Some("id-old"));
    assert!(!dicts.matches("otherword", "other.c", Some("id-other"), ScopeMask::FILEID));

    assert!(matches!(
        dicts.rename(Path::new("ghost.c"), Path::new("any.c")),
        Err(StoreError::UnknownReference(_))
    ));
}

#[test]
fn delete_drops_the_per_file_dictionary_with_the_last_path() {
    let dir = TempDir::new().unwrap();

    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("a.c"), "id-a").unwrap();
    dicts.copy(Path::new("a.c"), Path::new("a_copy.c")).unwrap();
    dicts.add_by_file_id("token", "id-a").unwrap();

    // One path left, the dictionary stays.
    dicts.delete(Path::new("a.c")).unwrap();
    assert!(dicts.matches("token", "x", Some("id-a"), ScopeMask::FILEID));

    // Last path gone, dictionary gone.
    dicts.delete(Path::new("a_copy.c")).unwrap();
    assert!(!dicts.matches("token", "x", Some("id-a"), ScopeMask::FILEID));

    dicts.close().unwrap();
    let written = fs::read_to_string(dict_path(&dir)).unwrap();
    assert!(!written.contains("FILEID"));
}

#[test]
fn copy_shares_one_dictionary_between_paths() {
    let dir = TempDir::new().unwrap();

    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("orig.c"), "id-orig").unwrap();
    dicts.add_by_file_id("sharedword", "id-orig").unwrap();
    dicts.copy(Path::new("orig.c"), Path::new("duplicate.c")).unwrap();

    assert_eq!(
        dicts.file_id_of(Path::new("duplicate.c")).unwrap(),
        Some("id-orig")
    );
    // Adds through either path's id land in the same corpus.
    dicts.add_by_file_id("later", "id-orig").unwrap();
    assert!(dicts.matches("later", "duplicate.c", Some("id-orig"), ScopeMask::FILEID));
}

#[test]
fn bijection_holds_after_mixed_operation_sequences() {
    let dir = TempDir::new().unwrap();

    let mut dicts = open_rooted(&dir);
    dicts.register_new_file(Path::new("a.c"), "id-a").unwrap();
    dicts.register_new_file(Path::new("b.c"), "id-b").unwrap();
    dicts.register_new_file(Path::new("c.c"), "id-c").unwrap();
    dicts.copy(Path::new("a.c"), Path::new("a2.c")).unwrap();
    dicts.rename(Path::new("b.c"), Path::new("b2.c")).unwrap();
    dicts.merge("id-c", "id-a").unwrap();
    dicts.delete(Path::new("a2.c")).unwrap();
    dicts.close().unwrap();

    // Reload and check the surviving associations; each path resolves to
    // exactly one id.
    let dicts = open_rooted(&dir);
    assert_eq!(dicts.file_id_of(Path::new("a.c")).unwrap(), Some("id-a"));
    assert_eq!(dicts.file_id_of(Path::new("c.c")).unwrap(), Some("id-a"));
    assert_eq!(dicts.file_id_of(Path::new("b2.c")).unwrap(), Some("id-b"));
    assert_eq!(dicts.file_id_of(Path::new("a2.c")).unwrap(), None);
    assert_eq!(dicts.file_id_of(Path::new("b.c")).unwrap(), None);
}
