// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fs;

use tempfile::TempDir;

use super::*;
use crate::tests::{spw_tables, FakeDataset, FakeStore, FAKE_SUBTABLES};

fn make_dataset(dir: &Path, name: &str, spws: &[u32]) -> PathBuf {
    let store = FakeStore::new();
    let path = dir.join(name);
    store.create(
        &path,
        &FakeDataset::grid(&[1, 2], spws.len() as u32, &[], 1),
        &spw_tables(spws),
    );
    path
}

#[test]
fn test_list_subtables() {
    let tmp = TempDir::new().unwrap();
    let ms = make_dataset(tmp.path(), "a.ms", &[0]);
    // Neither of these are sub-tables.
    fs::write(ms.join("TABLE_FILE"), "").unwrap();
    fs::create_dir(ms.join("lowercase")).unwrap();

    let names = FakeStore::new().list_subtables(&ms).unwrap();
    assert_eq!(names, FAKE_SUBTABLES);
}

#[test]
fn test_copy_subtable_replaces() {
    let tmp = TempDir::new().unwrap();
    let a = make_dataset(tmp.path(), "a.ms", &[0]);
    let b = make_dataset(tmp.path(), "b.ms", &[1]);
    let store = FakeStore::new();

    store.copy_subtable(&a, &b, "SPECTRAL_WINDOW").unwrap();
    assert_eq!(store.read_spw_tables(&b).unwrap(), spw_tables(&[0]));
    // The copy is independent of the original.
    assert!(!fs::symlink_metadata(b.join("SPECTRAL_WINDOW"))
        .unwrap()
        .file_type()
        .is_symlink());
}

#[cfg(unix)]
#[test]
fn test_link_subtable_is_relative_for_siblings() {
    let tmp = TempDir::new().unwrap();
    let a = make_dataset(tmp.path(), "a.ms", &[0]);
    let b = make_dataset(tmp.path(), "b.ms", &[1]);
    let store = FakeStore::new();

    store.link_subtable(&a, &b, "SPECTRAL_WINDOW").unwrap();
    let target = fs::read_link(b.join("SPECTRAL_WINDOW")).unwrap();
    assert_eq!(target, Path::new("../a.ms/SPECTRAL_WINDOW"));
    assert_eq!(store.read_spw_tables(&b).unwrap(), spw_tables(&[0]));

    // Linked sub-tables are still listed.
    assert!(store
        .list_subtables(&b)
        .unwrap()
        .contains(&"SPECTRAL_WINDOW".to_string()));

    // Removing a dataset with links leaves the link targets alone.
    store.remove_dataset(&b).unwrap();
    assert!(!b.exists());
    assert!(a.join("SPECTRAL_WINDOW").is_dir());
}

#[test]
fn test_move_and_remove_dataset() {
    let tmp = TempDir::new().unwrap();
    let a = make_dataset(tmp.path(), "a.ms", &[0]);
    let store = FakeStore::new();

    let moved = tmp.path().join("nested").join("dir").join("a.ms");
    store.move_dataset(&a, &moved).unwrap();
    assert!(!a.exists());
    assert_eq!(store.read_index(&moved).unwrap().rows.len(), 2);

    store.remove_dataset(&moved).unwrap();
    assert!(!moved.exists());
    // Removing something that isn't there is fine.
    store.remove_dataset(&moved).unwrap();
}

#[test]
fn test_manifest() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    let mms = tmp.path().join("out.mms");
    let a = make_dataset(&mms.join("SUBMSS"), "out.0000.ms", &[0, 1]);
    make_dataset(&mms.join("SUBMSS"), "out.0001.ms", &[0, 1]);

    assert!(store.read_manifest(&a).unwrap().is_none());

    let manifest = Manifest {
        axis: SeparationAxis::Scan,
        members: vec![
            PathBuf::from("SUBMSS/out.0000.ms"),
            PathBuf::from("SUBMSS/out.0001.ms"),
        ],
    };
    store.write_manifest(&mms, &manifest).unwrap();
    assert_eq!(store.read_manifest(&mms).unwrap(), Some(manifest));

    // Members are read as one dataset.
    let index = store.read_index(&mms).unwrap();
    assert_eq!(index.rows.len(), 8);
    assert_eq!(index.dd_spws, vec![0, 1]);
}

#[test]
fn test_bad_manifest() {
    let tmp = TempDir::new().unwrap();
    let mms = tmp.path().join("out.mms");
    fs::create_dir_all(&mms).unwrap();
    fs::write(mms.join(crate::constants::MANIFEST_FILE), "axis = 5").unwrap();

    let result = FakeStore::new().read_manifest(&mms);
    assert!(matches!(result, Err(StoreError::BadManifest { .. })));
}

#[test]
fn test_index_append() {
    let store = FakeStore::new();
    let tmp = TempDir::new().unwrap();
    let a = make_dataset(tmp.path(), "a.ms", &[0]);
    let b = make_dataset(tmp.path(), "b.ms", &[0, 1, 2]);

    let mut index = DatasetIndex::default();
    index.append(store.read_index(&a).unwrap());
    assert_eq!(index.dd_spws, vec![0]);
    index.append(store.read_index(&b).unwrap());
    assert_eq!(index.rows.len(), 2 + 6);
    assert_eq!(index.dd_spws, vec![0, 1, 2]);
    assert_eq!(index.spw_of(2), Some(2));
    assert_eq!(index.spw_of(3), None);
}

#[test]
fn test_ms_store_missing_dataset() {
    let tmp = TempDir::new().unwrap();
    let result = MsStore.read_index(&tmp.path().join("nothing.ms"));
    assert!(matches!(result, Err(StoreError::BadDataset(_))));
}
