#![allow(dead_code)]

use relink_core::model::graph::InventoryGraph;
use relink_core::model::record::{BibliographicRecord, HoldingsRecord, ItemRecord};
use relink_core::{
    Institution, InventoryStore, RecordId, SqliteAuditSink, SqliteInventoryStore,
    SqliteSearchIndex, TransferConfig, TransferService,
};
use rusqlite::Connection;

pub const INSTITUTION_ID: i64 = 1;
pub const INSTITUTION_CODE: &str = "PUL";

pub type SqliteTransferService<'conn> = TransferService<
    SqliteInventoryStore<'conn>,
    SqliteSearchIndex<'conn>,
    SqliteAuditSink<'conn>,
>;

pub fn institution() -> Institution {
    Institution::new(INSTITUTION_ID, INSTITUTION_CODE)
}

/// Service with every collaborator on `conn` and default config.
pub fn sqlite_service(conn: &Connection) -> SqliteTransferService<'_> {
    TransferService::new(
        SqliteInventoryStore::try_new(conn).unwrap(),
        SqliteSearchIndex::new(conn),
        SqliteAuditSink::new(conn),
        TransferConfig::default(),
    )
}

/// Ids of one seeded bib subtree, in the order they were declared.
pub struct SeededBib {
    pub bib: RecordId,
    pub holdings: Vec<RecordId>,
    pub items: Vec<RecordId>,
}

/// Persists a bib with `(holdings local id, item local ids)` children.
pub fn seed_bib(
    store: &SqliteInventoryStore<'_>,
    bib_local_id: &str,
    holdings: &[(&str, &[&str])],
) -> SeededBib {
    let mut graph = InventoryGraph::new();
    let bib = graph.add_bib(BibliographicRecord::new(INSTITUTION_ID, bib_local_id, "seed", 1));
    let mut seeded = SeededBib {
        bib,
        holdings: Vec::new(),
        items: Vec::new(),
    };

    for (holdings_local_id, item_local_ids) in holdings {
        let holdings_id = graph.add_holdings(HoldingsRecord::new(
            INSTITUTION_ID,
            *holdings_local_id,
            "seed",
            1,
        ));
        graph.link_bib_holdings(bib, holdings_id).unwrap();
        for item_local_id in *item_local_ids {
            let item_id =
                graph.add_item(ItemRecord::new(INSTITUTION_ID, *item_local_id, "seed", 1));
            graph.link_holdings_item(holdings_id, item_id).unwrap();
            graph.link_bib_item(bib, item_id).unwrap();
            seeded.items.push(item_id);
        }
        seeded.holdings.push(holdings_id);
    }

    store.save_bibs(&graph, &[bib]).unwrap();
    seeded
}

/// Flags one row as deleted behind the store's back.
pub fn mark_deleted(conn: &Connection, table: &str, record_id: RecordId) {
    let changed = conn
        .execute(
            &format!("UPDATE {table} SET is_deleted = 1 WHERE record_id = ?1;"),
            [record_id.to_string()],
        )
        .unwrap();
    assert_eq!(changed, 1, "no {table} row for {record_id}");
}

/// Internal id of the bib with `local_id`, if stored.
pub fn bib_id_of(store: &SqliteInventoryStore<'_>, local_id: &str) -> Option<RecordId> {
    store
        .load_bib(&mut InventoryGraph::new(), INSTITUTION_ID, local_id)
        .unwrap()
}

pub fn holdings_id_of(store: &SqliteInventoryStore<'_>, local_id: &str) -> Option<RecordId> {
    store
        .load_holdings(&mut InventoryGraph::new(), INSTITUTION_ID, local_id)
        .unwrap()
}

/// Sum of all record versions; changes whenever any record is written.
pub fn version_fingerprint(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT
            (SELECT COALESCE(SUM(version), 0) FROM bibliographic_records)
          + (SELECT COALESCE(SUM(version), 0) FROM holdings_records)
          + (SELECT COALESCE(SUM(version), 0) FROM item_records);",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

/// Every record, link and search document row, rendered in a stable order.
pub fn inventory_snapshot(conn: &Connection) -> Vec<String> {
    let record_columns = "record_id, is_deleted, last_updated_by, last_updated_at, version";
    let queries = [
        format!("SELECT 'bib', {record_columns} FROM bibliographic_records ORDER BY record_id"),
        format!("SELECT 'holdings', {record_columns} FROM holdings_records ORDER BY record_id"),
        format!("SELECT 'item', {record_columns} FROM item_records ORDER BY record_id"),
        "SELECT 'bib_holdings', bib_id, holdings_id, rowid, '', '' FROM bib_holdings
         ORDER BY rowid"
            .to_string(),
        "SELECT 'bib_items', bib_id, item_id, rowid, '', '' FROM bib_items ORDER BY rowid"
            .to_string(),
        "SELECT 'holdings_items', holdings_id, item_id, rowid, '', '' FROM holdings_items
         ORDER BY rowid"
            .to_string(),
        "SELECT 'doc', doc_type, record_id, root_bib_id, owning_institution_id, body
         FROM search_documents ORDER BY doc_type, record_id"
            .to_string(),
    ];

    let mut rows = Vec::new();
    for sql in &queries {
        let mut stmt = conn.prepare(sql).unwrap();
        let rendered = stmt
            .query_map([], |row| {
                let mut parts = Vec::new();
                for index in 0..6 {
                    let value: rusqlite::types::Value = row.get(index)?;
                    parts.push(format!("{value:?}"));
                }
                Ok(parts.join("|"))
            })
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows.extend(rendered);
    }
    rows
}
