mod common;

use common::{mark_deleted, seed_bib};
use relink_core::db::open_db_in_memory;
use relink_core::search::index::documents_for_bib;
use relink_core::{
    search_documents, DocumentQuery, DocumentRef, RecordKind, SearchError, SearchIndex,
    SqliteInventoryStore, SqliteSearchIndex,
};
use uuid::Uuid;

#[test]
fn reindex_writes_bib_holdings_and_item_documents() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteInventoryStore::try_new(&conn).unwrap();
    let index = SqliteSearchIndex::new(&conn);
    let seeded = seed_bib(&store, "B1", &[("H1", &["I1", "I2"])]);

    let written = index.reindex_by_bibliographic_id(seeded.bib).unwrap();

    assert_eq!(written, 4);
    let documents = documents_for_bib(&conn, seeded.bib).unwrap();
    assert_eq!(documents.len(), 4);
    assert!(documents.iter().all(|hit| hit.root_bib_id == seeded.bib));

    let bib_hits = search_documents(&conn, &DocumentQuery::new("I2")).unwrap();
    let kinds: Vec<RecordKind> = bib_hits.iter().map(|hit| hit.kind).collect();
    assert_eq!(bib_hits.len(), 2);
    assert!(kinds.contains(&RecordKind::Bib));
    assert!(kinds.contains(&RecordKind::Item));
}

#[test]
fn reindex_replaces_previous_documents() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteInventoryStore::try_new(&conn).unwrap();
    let index = SqliteSearchIndex::new(&conn);
    let seeded = seed_bib(&store, "B1", &[("H1", &["I1"]), ("H2", &["I2"])]);

    index.reindex_by_bibliographic_id(seeded.bib).unwrap();
    mark_deleted(&conn, "item_records", seeded.items[1]);
    mark_deleted(&conn, "holdings_records", seeded.holdings[1]);
    let written = index.reindex_by_bibliographic_id(seeded.bib).unwrap();

    assert_eq!(written, 3);
    let mut query = DocumentQuery::new("H2");
    query.kind = Some(RecordKind::Holdings);
    assert!(search_documents(&conn, &query).unwrap().is_empty());
}

#[test]
fn deleted_bib_is_removed_from_index() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteInventoryStore::try_new(&conn).unwrap();
    let index = SqliteSearchIndex::new(&conn);
    let seeded = seed_bib(&store, "B1", &[("H1", &["I1"])]);

    index.reindex_by_bibliographic_id(seeded.bib).unwrap();
    mark_deleted(&conn, "bibliographic_records", seeded.bib);

    assert_eq!(index.reindex_by_bibliographic_id(seeded.bib).unwrap(), 0);
    assert!(documents_for_bib(&conn, seeded.bib).unwrap().is_empty());
}

#[test]
fn reindex_of_unknown_bib_is_an_error() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteSearchIndex::new(&conn);
    let missing = Uuid::new_v4();

    let err = index.reindex_by_bibliographic_id(missing).unwrap_err();
    assert!(matches!(err, SearchError::MissingBib(id) if id == missing));
}

#[test]
fn delete_document_removes_one_document() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteInventoryStore::try_new(&conn).unwrap();
    let index = SqliteSearchIndex::new(&conn);
    let seeded = seed_bib(&store, "B1", &[("H1", &["I1"])]);
    index.reindex_by_bibliographic_id(seeded.bib).unwrap();

    index
        .delete_document(DocumentRef::new(RecordKind::Item, seeded.items[0]))
        .unwrap();
    index
        .delete_document(DocumentRef::new(RecordKind::Item, Uuid::new_v4()))
        .unwrap();

    let remaining = documents_for_bib(&conn, seeded.bib).unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|hit| hit.kind != RecordKind::Item));
}

#[test]
fn search_filters_by_kind_and_institution() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteInventoryStore::try_new(&conn).unwrap();
    let index = SqliteSearchIndex::new(&conn);
    let seeded = seed_bib(&store, "B1", &[("H1", &["I1"])]);
    index.reindex_by_bibliographic_id(seeded.bib).unwrap();

    let mut items = DocumentQuery::new("I1");
    items.kind = Some(RecordKind::Item);
    let hits = search_documents(&conn, &items).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record_id, seeded.items[0]);

    let mut other_institution = DocumentQuery::new("I1");
    other_institution.institution_id = Some(99);
    assert!(search_documents(&conn, &other_institution).unwrap().is_empty());

    assert!(search_documents(&conn, &DocumentQuery::new("   ")).unwrap().is_empty());
}

#[test]
fn malformed_raw_query_returns_invalid_query() {
    let conn = open_db_in_memory().unwrap();
    let mut query = DocumentQuery::new("\"unterminated");
    query.raw_fts_syntax = true;

    let err = search_documents(&conn, &query).unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery { .. }));
}
