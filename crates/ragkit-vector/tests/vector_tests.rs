use std::fs;

use ragkit_core::traits::{CorpusStore, VectorIndex};
use ragkit_core::Error;
use ragkit_vector::{DataLayout, FlatL2Index, JsonCorpusStore};

fn sample_index() -> FlatL2Index {
    let mut index = FlatL2Index::new(2);
    index.add(vec![0.0, 0.0], "origin".into()).unwrap();
    index.add(vec![3.0, 4.0], "far".into()).unwrap();
    index.add(vec![1.0, 0.0], "near".into()).unwrap();
    index.add(vec![0.0, 1.0], "near-too".into()).unwrap();
    index
}

#[test]
fn search_orders_by_squared_distance() {
    let hits = sample_index().search(&[0.0, 0.0], 4).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["origin", "near", "near-too", "far"]);
    assert_eq!(hits[3].distance, 25.0);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn ties_keep_insertion_order() {
    let hits = sample_index().search(&[0.0, 0.0], 3).unwrap();
    assert_eq!(hits[1].distance, hits[2].distance);
    assert_eq!(hits[1].id, "near");
    assert_eq!(hits[2].id, "near-too");
}

#[test]
fn search_returns_at_most_k() {
    let index = sample_index();
    for k in 1..=6 {
        let hits = index.search(&[1.0, 1.0], k).unwrap();
        assert_eq!(hits.len(), k.min(index.len()));
    }
    assert!(index.search(&[1.0, 1.0], 0).unwrap().is_empty());
}

#[test]
fn empty_index_search_is_empty() {
    let index = FlatL2Index::new(8);
    assert!(index.is_empty());
    assert!(index.search(&[0.0; 8], 5).unwrap().is_empty());
}

#[test]
fn add_with_wrong_dimension_is_rejected_without_change() {
    let mut index = sample_index();
    let err = index.add(vec![1.0, 2.0, 3.0], "bad".into()).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
    assert_eq!(index.len(), 4);
    assert_eq!(index.search(&[0.0, 0.0], 1).unwrap()[0].id, "origin");
}

#[test]
fn search_with_wrong_dimension_is_rejected() {
    let err = sample_index().search(&[0.0], 1).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
}

#[test]
fn duplicate_ids_are_appended() {
    let mut index = FlatL2Index::new(1);
    index.add(vec![1.0], "same".into()).unwrap();
    index.add(vec![2.0], "same".into()).unwrap();
    assert_eq!(index.len(), 2);
}

#[test]
fn index_file_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::open(tmp.path()).unwrap();

    let mut index = FlatL2Index::open(layout.index_path(), 2).unwrap();
    assert!(index.is_empty());
    index.add(vec![0.25, -1.5], "p1".into()).unwrap();
    index.add(vec![3.0, 4.0], "p2".into()).unwrap();
    index.save().unwrap();

    let reopened = FlatL2Index::open(layout.index_path(), 2).unwrap();
    let entries: Vec<_> = reopened.entries().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "p1");
    assert_eq!(entries[0].embedding, vec![0.25, -1.5]);
    assert_eq!(entries[1].id, "p2");
}

#[test]
fn reopening_with_other_dimension_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("index.flat");
    let mut index = FlatL2Index::open(&path, 2).unwrap();
    index.add(vec![1.0, 1.0], "a".into()).unwrap();
    index.save().unwrap();

    let err = FlatL2Index::open(&path, 3).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
}

#[test]
fn garbage_index_file_is_corrupt() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("index.flat");
    fs::write(&path, b"hello").unwrap();
    assert!(matches!(FlatL2Index::open(&path, 2).unwrap_err(), Error::Corrupt { .. }));
}

#[test]
fn in_memory_save_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = FlatL2Index::new(1);
    index.add(vec![1.0], "a".into()).unwrap();
    index.save().unwrap();
    JsonCorpusStore::new().save().unwrap();
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn corpus_put_overwrites_and_get_misses() {
    let mut store = JsonCorpusStore::new();
    store.put("a".into(), "first".into()).unwrap();
    store.put("a".into(), "second".into()).unwrap();
    assert_eq!(store.get("a").unwrap(), "second");
    assert_eq!(store.len(), 1);
    assert!(matches!(store.get("b").unwrap_err(), Error::NotFound(id) if id == "b"));
}

#[test]
fn corpus_file_round_trip_and_sorted_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("corpus.json");

    let mut store = JsonCorpusStore::open(&path).unwrap();
    store.put("b".into(), "bee".into()).unwrap();
    store.put("a".into(), "ay".into()).unwrap();
    store.save().unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.find("\"a\"").unwrap() < raw.find("\"b\"").unwrap());

    let reopened = JsonCorpusStore::open(&path).unwrap();
    assert_eq!(reopened.get("a").unwrap(), "ay");
    assert_eq!(reopened.get("b").unwrap(), "bee");
}

#[test]
fn repeated_saves_are_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::open(tmp.path()).unwrap();
    let mut index = FlatL2Index::open(layout.index_path(), 2).unwrap();
    let mut store = JsonCorpusStore::open(layout.corpus_path()).unwrap();
    for (i, text) in ["one", "two", "three"].iter().enumerate() {
        index.add(vec![i as f32, 1.0], format!("d{i}")).unwrap();
        store.put(format!("d{i}"), text.to_string()).unwrap();
    }

    store.save().unwrap();
    index.save().unwrap();
    let first = (fs::read(layout.index_path()).unwrap(), fs::read(layout.corpus_path()).unwrap());
    store.save().unwrap();
    index.save().unwrap();
    let second = (fs::read(layout.index_path()).unwrap(), fs::read(layout.corpus_path()).unwrap());
    assert_eq!(first, second);
}

#[test]
fn malformed_corpus_file_is_corrupt() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("corpus.json");
    fs::write(&path, "[1, 2").unwrap();
    assert!(matches!(JsonCorpusStore::open(&path).unwrap_err(), Error::Corrupt { .. }));
}
