mod common;

use common::{
    bib_id_of, holdings_id_of, institution, inventory_snapshot, mark_deleted, seed_bib,
    sqlite_service, version_fingerprint, SeededBib,
};
use relink_core::config::DEFAULT_ACTOR;
use relink_core::db::open_db_in_memory;
use relink_core::search::index::documents_for_bib;
use relink_core::transfer::record::CHANGE_LOG_OPERATION;
use relink_core::{
    ItemLocation, ItemTransferRequest, ItemTransferResponse, SearchIndex, SqliteInventoryStore,
    SqliteSearchIndex, TransferRequest,
};
use rusqlite::Connection;

fn transfer_one(conn: &Connection, request: ItemTransferRequest) -> ItemTransferResponse {
    let service = sqlite_service(conn);
    let batch = TransferRequest {
        item_transfers: vec![request],
        ..TransferRequest::default()
    };
    let mut responses = service.process_item_transfers(&batch, &institution());
    assert_eq!(responses.len(), 1);
    responses.remove(0)
}

fn move_item(source: (&str, &str, &str), destination: (&str, &str, &str)) -> ItemTransferRequest {
    ItemTransferRequest::new(
        ItemLocation::new(source.0, source.1, source.2),
        ItemLocation::new(destination.0, destination.1, destination.2),
    )
}

fn seed_indexed(conn: &Connection, bib_local_id: &str, holdings: &[(&str, &[&str])]) -> SeededBib {
    let store = SqliteInventoryStore::try_new(conn).unwrap();
    let seeded = seed_bib(&store, bib_local_id, holdings);
    SqliteSearchIndex::new(conn)
        .reindex_by_bibliographic_id(seeded.bib)
        .unwrap();
    seeded
}

/// Runs `request` and checks it is rejected with `code` and writes nothing.
fn assert_rejected_untouched(conn: &Connection, request: ItemTransferRequest, code: &str) {
    let before = inventory_snapshot(conn);

    let response = transfer_one(conn, request);

    assert_eq!(response.message, code);
    assert!(!response.valid);
    assert_eq!(inventory_snapshot(conn), before);
}

#[test]
fn item_moves_to_new_bib_and_holdings() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let seeded = seed_bib(service.store(), "B1", &[("H1", &["I1"])]);
    SqliteSearchIndex::new(&conn)
        .reindex_by_bibliographic_id(seeded.bib)
        .unwrap();

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H2", "I1")));

    assert_eq!(response.message, "SUCCESSFULLY_RELINKED");
    assert!(response.valid);

    let store = service.store();
    let new_bib = bib_id_of(store, "B2").unwrap();
    let new_holdings = holdings_id_of(store, "H2").unwrap();

    let item = store.find_item_by_id(seeded.items[0]).unwrap().unwrap();
    assert_eq!(item.bib_ids, vec![new_bib]);
    assert_eq!(item.holdings_ids, vec![new_holdings]);
    assert_eq!(item.version, 2);
    assert_eq!(item.audit.last_updated_by, DEFAULT_ACTOR);

    let old_holdings = store.find_holdings_by_id(seeded.holdings[0]).unwrap().unwrap();
    assert!(old_holdings.is_deleted);
    assert!(old_holdings.item_ids.is_empty());
    assert_eq!(old_holdings.bib_ids, vec![seeded.bib]);

    let old_bib = store.find_bib_by_id(seeded.bib).unwrap().unwrap();
    assert!(old_bib.is_deleted);
    assert!(old_bib.item_ids.is_empty());

    let stub_bib = store.find_bib_by_id(new_bib).unwrap().unwrap();
    assert!(!stub_bib.is_deleted);
    assert_eq!(stub_bib.audit.created_by, DEFAULT_ACTOR);
    assert_eq!(stub_bib.holdings_ids, vec![new_holdings]);
    assert_eq!(stub_bib.item_ids, vec![seeded.items[0]]);

    let change_log = service.audit().change_log_for(seeded.items[0]).unwrap();
    assert_eq!(change_log.len(), 1);
    assert_eq!(change_log[0].operation_type, CHANGE_LOG_OPERATION);
    assert!(change_log[0].notes.starts_with("Item transferred from source"));

    assert!(documents_for_bib(&conn, seeded.bib).unwrap().is_empty());
    let reindexed = documents_for_bib(&conn, new_bib).unwrap();
    assert_eq!(reindexed.len(), 3);
}

#[test]
fn item_moves_into_existing_holdings_of_another_bib() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let source = seed_bib(service.store(), "B1", &[("H1", &["I1"]), ("H3", &["I3"])]);
    let destination = seed_bib(service.store(), "B2", &[("H2", &["I2"])]);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H2", "I1")));

    assert_eq!(response.message, "SUCCESSFULLY_RELINKED");
    let store = service.store();
    let holdings = store
        .find_holdings_by_id(destination.holdings[0])
        .unwrap()
        .unwrap();
    assert_eq!(holdings.item_ids, vec![destination.items[0], source.items[0]]);

    let source_bib = store.find_bib_by_id(source.bib).unwrap().unwrap();
    assert!(!source_bib.is_deleted);
    assert_eq!(source_bib.item_ids, vec![source.items[1]]);
    let emptied = store.find_holdings_by_id(source.holdings[0]).unwrap().unwrap();
    assert!(emptied.is_deleted);
}

#[test]
fn deleted_destination_bib_is_revived() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    seed_bib(service.store(), "B1", &[("H1", &["I1"])]);
    let destination = seed_bib(service.store(), "B2", &[("H2", &["I2"])]);
    mark_deleted(&conn, "item_records", destination.items[0]);
    mark_deleted(&conn, "holdings_records", destination.holdings[0]);
    mark_deleted(&conn, "bibliographic_records", destination.bib);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H3", "I1")));

    assert_eq!(response.message, "SUCCESSFULLY_RELINKED");
    let store = service.store();
    let revived = store.find_bib_by_id(destination.bib).unwrap().unwrap();
    assert!(!revived.is_deleted);
    assert_eq!(revived.holdings_ids.len(), 2);
    let still_deleted = store
        .find_holdings_by_id(destination.holdings[0])
        .unwrap()
        .unwrap();
    assert!(still_deleted.is_deleted);
}

#[test]
fn item_id_mismatch_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    seed_bib(service.store(), "B1", &[("H1", &["I1"])]);
    let before = version_fingerprint(&conn);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H2", "I9")));

    assert_eq!(response.message, "SOURCE_DESTINATION_ITEM_IDS_NOT_MATCHING");
    assert!(!response.valid);
    assert_eq!(version_fingerprint(&conn), before);
    assert!(bib_id_of(service.store(), "B2").is_none());
}

#[test]
fn missing_source_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let request = ItemTransferRequest {
        source: None,
        destination: Some(ItemLocation::new("B2", "H2", "I1")),
    };

    let response = transfer_one(&conn, request);

    assert_eq!(response.message, "SOURCE_EMPTY");
    assert!(!response.valid);
}

#[test]
fn destination_holdings_of_another_bib_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    seed_bib(service.store(), "B1", &[("H1", &["I1"])]);
    seed_bib(service.store(), "B2", &[("H2", &["I2"])]);
    seed_bib(service.store(), "B3", &[("H3", &["I3"])]);
    let before = version_fingerprint(&conn);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H3", "I1")));

    assert_eq!(response.message, "DEST_HOLDINGS_ATTACHED_WITH_DIFF_BIB");
    assert!(!response.valid);
    assert_eq!(version_fingerprint(&conn), before);
}

#[test]
fn deaccessioned_source_item_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let seeded = seed_bib(service.store(), "B1", &[("H1", &["I1", "I2"])]);
    mark_deleted(&conn, "item_records", seeded.items[0]);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H2", "I1")));

    assert_eq!(response.message, "SOURCE_ITEM_DEACCESSIONED");
    assert!(!response.valid);
}

#[test]
fn deaccessioned_source_holdings_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    let seeded = seed_bib(service.store(), "B1", &[("H1", &["I1"]), ("H2", &["I2"])]);
    mark_deleted(&conn, "item_records", seeded.items[0]);
    mark_deleted(&conn, "holdings_records", seeded.holdings[0]);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H5", "I1")));

    assert_eq!(response.message, "SOURCE_HOLDING_DEACCESSIONED");
    assert!(!response.valid);
}

#[test]
fn item_under_other_holdings_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    seed_bib(service.store(), "B1", &[("H1", &["I1"]), ("H2", &["I2"])]);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I2"), ("B2", "H5", "I2")));

    assert_eq!(response.message, "SOURCE_ITEM_NOT_UNDER_SOURCE_HOLDING");
}

#[test]
fn deaccessioned_destination_holdings_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = sqlite_service(&conn);
    seed_bib(service.store(), "B1", &[("H1", &["I1"])]);
    let destination = seed_bib(service.store(), "B2", &[("H2", &["I2"]), ("H4", &["I4"])]);
    mark_deleted(&conn, "item_records", destination.items[0]);
    mark_deleted(&conn, "holdings_records", destination.holdings[0]);

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H2", "I1")));

    assert_eq!(response.message, "DEST_HOLDING_DEACCESSIONED");
    assert!(!response.valid);
}

#[test]
fn unknown_source_bib_is_rejected() {
    let conn = open_db_in_memory().unwrap();

    let response = transfer_one(&conn, move_item(("B1", "H1", "I1"), ("B2", "H2", "I1")));

    assert_eq!(response.message, "SOURCE_BIB_NOT_EXIST");
    assert!(!response.valid);
}

#[test]
fn missing_destination_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    seed_indexed(&conn, "B1", &[("H1", &["I1"])]);
    let request = ItemTransferRequest {
        source: Some(ItemLocation::new("B1", "H1", "I1")),
        destination: None,
    };

    assert_rejected_untouched(&conn, request, "DESTINATION_EMPTY");
}

#[test]
fn blank_source_holdings_id_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    seed_indexed(&conn, "B1", &[("H1", &["I1"])]);

    assert_rejected_untouched(
        &conn,
        move_item(("B1", "  ", "I1"), ("B2", "H2", "I1")),
        "SOURCE_HOLDINGS_ID_EMPTY",
    );
}

#[test]
fn blank_source_item_id_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    seed_indexed(&conn, "B1", &[("H1", &["I1"])]);

    assert_rejected_untouched(
        &conn,
        move_item(("B1", "H1", " "), ("B2", "H2", " ")),
        "SOURCE_ITEM_ID_EMPTY",
    );
}

#[test]
fn padded_ids_are_matched_as_sent() {
    let conn = open_db_in_memory().unwrap();
    seed_indexed(&conn, "B1", &[("H1", &["I1"])]);

    assert_rejected_untouched(
        &conn,
        move_item(("B1", "H1", " I1"), ("B2", "H2", "I1")),
        "SOURCE_DESTINATION_ITEM_IDS_NOT_MATCHING",
    );
    assert_rejected_untouched(
        &conn,
        move_item(("B1", "H1", " I1"), ("B2", "H2", " I1")),
        "SOURCE_ITEM_NOT_UNDER_SOURCE_HOLDING",
    );
    assert_rejected_untouched(
        &conn,
        move_item((" B1", "H1", "I1"), ("B2", "H2", "I1")),
        "SOURCE_BIB_NOT_EXIST",
    );
}

#[test]
fn blank_bib_and_destination_holdings_ids_are_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    seed_indexed(&conn, "B1", &[("H1", &["I1"])]);

    assert_rejected_untouched(
        &conn,
        move_item(("", "H1", "I1"), ("B2", "H2", "I1")),
        "SOURCE_BIB_ID_EMPTY",
    );
    assert_rejected_untouched(
        &conn,
        move_item(("B1", "H1", "I1"), ("B2", " ", "I1")),
        "DEST_OWN_INST_HOLDINGS_ID_EMPTY",
    );
}
