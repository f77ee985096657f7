//! Inventory store contract and SQLite implementation.
//!
//! # Responsibility
//! - Load bib/holdings/item neighbourhoods by `(institution, local id)` into
//!   an [`InventoryGraph`].
//! - Persist changed records and their association rows, cascading from the
//!   given bibliographic roots.
//! - Expose an explicit begin/commit/rollback transaction boundary.
//!
//! # Invariants
//! - A loaded bib brings its holdings and their items; a loaded holdings
//!   brings its items. Every loaded record carries complete id lists.
//! - Saving a persisted record is guarded by its `version`; a concurrent
//!   write surfaces as [`StoreError::Conflict`] instead of a lost update.
//! - Each changed record is written once per save, even when reachable from
//!   several roots.
//! - Association rows keep their insertion order across saves.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::graph::{GraphError, InventoryGraph};
use crate::model::record::{
    AuditStamp, BibliographicRecord, HoldingsRecord, InstitutionId, ItemRecord, RecordId,
    RecordKind,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Inventory persistence error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Graph(GraphError),
    /// The row changed since it was loaded.
    Conflict {
        kind: RecordKind,
        record_id: RecordId,
    },
    /// A linked row is missing.
    NotFound {
        kind: RecordKind,
        record_id: RecordId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Conflict { kind, record_id } => write!(
                f,
                "{kind} record {record_id} was modified concurrently; refusing to overwrite"
            ),
            Self::NotFound { kind, record_id } => {
                write!(f, "{kind} record not found: {record_id}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "inventory store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid inventory data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Graph(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<GraphError> for StoreError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

/// Entity store used by the transfer engine.
pub trait InventoryStore {
    /// Opens the per-request transaction scope.
    fn begin(&self) -> StoreResult<()>;
    fn commit(&self) -> StoreResult<()>;
    fn rollback(&self) -> StoreResult<()>;
    /// Loads a bib and its holdings/items; returns its id when found.
    fn load_bib(
        &self,
        graph: &mut InventoryGraph,
        institution_id: InstitutionId,
        owning_institution_bib_id: &str,
    ) -> StoreResult<Option<RecordId>>;
    /// Loads a holdings and its items; returns its id when found.
    fn load_holdings(
        &self,
        graph: &mut InventoryGraph,
        institution_id: InstitutionId,
        owning_institution_holdings_id: &str,
    ) -> StoreResult<Option<RecordId>>;
    /// Writes every changed record reachable from `roots`, with its links.
    ///
    /// Returns the number of records written.
    fn save_bibs(&self, graph: &InventoryGraph, roots: &[RecordId]) -> StoreResult<usize>;
}

struct RecordTable {
    kind: RecordKind,
    table: &'static str,
    local_id_column: &'static str,
}

const BIB_TABLE: RecordTable = RecordTable {
    kind: RecordKind::Bib,
    table: "bibliographic_records",
    local_id_column: "owning_institution_bib_id",
};

const HOLDINGS_TABLE: RecordTable = RecordTable {
    kind: RecordKind::Holdings,
    table: "holdings_records",
    local_id_column: "owning_institution_holdings_id",
};

const ITEM_TABLE: RecordTable = RecordTable {
    kind: RecordKind::Item,
    table: "item_records",
    local_id_column: "owning_institution_item_id",
};

struct LinkTable {
    table: &'static str,
    left: &'static str,
    right: &'static str,
}

const BIB_HOLDINGS: LinkTable = LinkTable {
    table: "bib_holdings",
    left: "bib_id",
    right: "holdings_id",
};

const BIB_ITEMS: LinkTable = LinkTable {
    table: "bib_items",
    left: "bib_id",
    right: "item_id",
};

const HOLDINGS_ITEMS: LinkTable = LinkTable {
    table: "holdings_items",
    left: "holdings_id",
    right: "item_id",
};

/// Which column of a link table the owning record sits in.
#[derive(Clone, Copy)]
enum LinkSide {
    Left,
    Right,
}

/// Kind-independent columns shared by the three record tables.
struct RecordRow {
    record_id: RecordId,
    owning_institution_id: InstitutionId,
    local_id: String,
    is_deleted: bool,
    audit: AuditStamp,
    version: i64,
}

/// SQLite-backed inventory store.
pub struct SqliteInventoryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInventoryStore<'conn> {
    /// Creates a store over a fully migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Reads one bib snapshot by internal id.
    pub fn find_bib_by_id(&self, record_id: RecordId) -> StoreResult<Option<BibliographicRecord>> {
        let Some(row) = read_record_row(self.conn, &BIB_TABLE, record_id)? else {
            return Ok(None);
        };
        Ok(Some(BibliographicRecord {
            record_id: row.record_id,
            owning_institution_id: row.owning_institution_id,
            owning_institution_bib_id: row.local_id,
            is_deleted: row.is_deleted,
            audit: row.audit,
            version: row.version,
            holdings_ids: linked_ids(self.conn, &BIB_HOLDINGS, LinkSide::Left, record_id)?,
            item_ids: linked_ids(self.conn, &BIB_ITEMS, LinkSide::Left, record_id)?,
        }))
    }

    /// Reads one holdings snapshot by internal id.
    pub fn find_holdings_by_id(&self, record_id: RecordId) -> StoreResult<Option<HoldingsRecord>> {
        let Some(row) = read_record_row(self.conn, &HOLDINGS_TABLE, record_id)? else {
            return Ok(None);
        };
        Ok(Some(HoldingsRecord {
            record_id: row.record_id,
            owning_institution_id: row.owning_institution_id,
            owning_institution_holdings_id: row.local_id,
            is_deleted: row.is_deleted,
            audit: row.audit,
            version: row.version,
            bib_ids: linked_ids(self.conn, &BIB_HOLDINGS, LinkSide::Right, record_id)?,
            item_ids: linked_ids(self.conn, &HOLDINGS_ITEMS, LinkSide::Left, record_id)?,
        }))
    }

    /// Reads one item snapshot by internal id.
    pub fn find_item_by_id(&self, record_id: RecordId) -> StoreResult<Option<ItemRecord>> {
        let Some(row) = read_record_row(self.conn, &ITEM_TABLE, record_id)? else {
            return Ok(None);
        };
        Ok(Some(ItemRecord {
            record_id: row.record_id,
            owning_institution_id: row.owning_institution_id,
            owning_institution_item_id: row.local_id,
            is_deleted: row.is_deleted,
            audit: row.audit,
            version: row.version,
            bib_ids: linked_ids(self.conn, &BIB_ITEMS, LinkSide::Right, record_id)?,
            holdings_ids: linked_ids(self.conn, &HOLDINGS_ITEMS, LinkSide::Right, record_id)?,
        }))
    }

    fn load_bib_by_id(&self, graph: &mut InventoryGraph, record_id: RecordId) -> StoreResult<()> {
        if graph.contains(RecordKind::Bib, record_id) {
            return Ok(());
        }
        let bib = self.find_bib_by_id(record_id)?.ok_or(StoreError::NotFound {
            kind: RecordKind::Bib,
            record_id,
        })?;
        let holdings_ids = bib.holdings_ids.clone();
        graph.insert_loaded_bib(bib);
        for holdings_id in holdings_ids {
            self.load_holdings_by_id(graph, holdings_id)?;
        }
        Ok(())
    }

    fn load_holdings_by_id(
        &self,
        graph: &mut InventoryGraph,
        record_id: RecordId,
    ) -> StoreResult<()> {
        if graph.contains(RecordKind::Holdings, record_id) {
            return Ok(());
        }
        let holdings = self.find_holdings_by_id(record_id)?.ok_or(StoreError::NotFound {
            kind: RecordKind::Holdings,
            record_id,
        })?;
        let item_ids = holdings.item_ids.clone();
        graph.insert_loaded_holdings(holdings);
        for item_id in item_ids {
            if graph.contains(RecordKind::Item, item_id) {
                continue;
            }
            let item = self.find_item_by_id(item_id)?.ok_or(StoreError::NotFound {
                kind: RecordKind::Item,
                record_id: item_id,
            })?;
            graph.insert_loaded_item(item);
        }
        Ok(())
    }

    fn find_record_id(
        &self,
        table: &RecordTable,
        institution_id: InstitutionId,
        local_id: &str,
    ) -> StoreResult<Option<RecordId>> {
        let text: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT record_id
                     FROM {}
                     WHERE owning_institution_id = ?1
                       AND {} = ?2;",
                    table.table, table.local_id_column
                ),
                params![institution_id, local_id],
                |row| row.get(0),
            )
            .optional()?;
        text.map(|value| parse_uuid(&value, table.table)).transpose()
    }

    fn write_record(&self, table: &RecordTable, row: &RecordRow) -> StoreResult<()> {
        if row.version == 0 {
            self.conn.execute(
                &format!(
                    "INSERT INTO {} (
                        record_id,
                        owning_institution_id,
                        {},
                        is_deleted,
                        created_by,
                        created_at,
                        last_updated_by,
                        last_updated_at,
                        version
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1);",
                    table.table, table.local_id_column
                ),
                params![
                    row.record_id.to_string(),
                    row.owning_institution_id,
                    row.local_id.as_str(),
                    bool_to_int(row.is_deleted),
                    row.audit.created_by.as_str(),
                    row.audit.created_at,
                    row.audit.last_updated_by.as_str(),
                    row.audit.last_updated_at,
                ],
            )?;
            return Ok(());
        }

        let changed = self.conn.execute(
            &format!(
                "UPDATE {}
                 SET
                    is_deleted = ?1,
                    last_updated_by = ?2,
                    last_updated_at = ?3,
                    version = version + 1
                 WHERE record_id = ?4
                   AND version = ?5;",
                table.table
            ),
            params![
                bool_to_int(row.is_deleted),
                row.audit.last_updated_by.as_str(),
                row.audit.last_updated_at,
                row.record_id.to_string(),
                row.version,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Conflict {
                kind: table.kind,
                record_id: row.record_id,
            });
        }
        Ok(())
    }

    /// Makes the `owner` side of `link` match `others`.
    ///
    /// Surviving rows are left in place so their rowid order holds; new
    /// pairs are appended in `others` order.
    fn rewrite_links(
        &self,
        link: &LinkTable,
        side: LinkSide,
        owner: RecordId,
        others: &[RecordId],
    ) -> StoreResult<()> {
        let (owner_column, other_column) = match side {
            LinkSide::Left => (link.left, link.right),
            LinkSide::Right => (link.right, link.left),
        };
        let wanted: BTreeSet<RecordId> = others.iter().copied().collect();
        let delete_sql = format!(
            "DELETE FROM {} WHERE {owner_column} = ?1 AND {other_column} = ?2;",
            link.table
        );
        for stale in linked_ids(self.conn, link, side, owner)? {
            if !wanted.contains(&stale) {
                self.conn
                    .execute(&delete_sql, [owner.to_string(), stale.to_string()])?;
            }
        }

        let insert_sql = format!(
            "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2);",
            link.table, link.left, link.right
        );
        for other in others {
            let (left, right) = match side {
                LinkSide::Left => (owner, *other),
                LinkSide::Right => (*other, owner),
            };
            self.conn
                .execute(&insert_sql, [left.to_string(), right.to_string()])?;
        }
        Ok(())
    }

    fn rewrite_record_links(
        &self,
        graph: &InventoryGraph,
        kind: RecordKind,
        record_id: RecordId,
    ) -> StoreResult<()> {
        match kind {
            RecordKind::Bib => {
                let bib = graph.bib(record_id)?;
                self.rewrite_links(&BIB_HOLDINGS, LinkSide::Left, record_id, &bib.holdings_ids)?;
                self.rewrite_links(&BIB_ITEMS, LinkSide::Left, record_id, &bib.item_ids)
            }
            RecordKind::Holdings => {
                let holdings = graph.holdings(record_id)?;
                self.rewrite_links(&BIB_HOLDINGS, LinkSide::Right, record_id, &holdings.bib_ids)?;
                self.rewrite_links(&HOLDINGS_ITEMS, LinkSide::Left, record_id, &holdings.item_ids)
            }
            RecordKind::Item => {
                let item = graph.item(record_id)?;
                self.rewrite_links(&BIB_ITEMS, LinkSide::Right, record_id, &item.bib_ids)?;
                self.rewrite_links(&HOLDINGS_ITEMS, LinkSide::Right, record_id, &item.holdings_ids)
            }
        }
    }
}

impl InventoryStore for SqliteInventoryStore<'_> {
    fn begin(&self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    fn load_bib(
        &self,
        graph: &mut InventoryGraph,
        institution_id: InstitutionId,
        owning_institution_bib_id: &str,
    ) -> StoreResult<Option<RecordId>> {
        let Some(record_id) =
            self.find_record_id(&BIB_TABLE, institution_id, owning_institution_bib_id)?
        else {
            return Ok(None);
        };
        self.load_bib_by_id(graph, record_id)?;
        Ok(Some(record_id))
    }

    fn load_holdings(
        &self,
        graph: &mut InventoryGraph,
        institution_id: InstitutionId,
        owning_institution_holdings_id: &str,
    ) -> StoreResult<Option<RecordId>> {
        let Some(record_id) = self.find_record_id(
            &HOLDINGS_TABLE,
            institution_id,
            owning_institution_holdings_id,
        )?
        else {
            return Ok(None);
        };
        self.load_holdings_by_id(graph, record_id)?;
        Ok(Some(record_id))
    }

    fn save_bibs(&self, graph: &InventoryGraph, roots: &[RecordId]) -> StoreResult<usize> {
        let targets = dirty_records_reachable(graph, roots)?;

        // Rows first: link rows reference them through foreign keys.
        for (kind, record_id) in &targets {
            match kind {
                RecordKind::Bib => {
                    let bib = graph.bib(*record_id)?;
                    self.write_record(&BIB_TABLE, &bib_row(bib))?;
                }
                RecordKind::Holdings => {
                    let holdings = graph.holdings(*record_id)?;
                    self.write_record(&HOLDINGS_TABLE, &holdings_row(holdings))?;
                }
                RecordKind::Item => {
                    let item = graph.item(*record_id)?;
                    self.write_record(&ITEM_TABLE, &item_row(item))?;
                }
            }
        }

        for (kind, record_id) in &targets {
            self.rewrite_record_links(graph, *kind, *record_id)?;
        }

        Ok(targets.len())
    }
}

/// Dirty records reachable from `roots`, bibs before their holdings before
/// their items, each listed once.
fn dirty_records_reachable(
    graph: &InventoryGraph,
    roots: &[RecordId],
) -> StoreResult<Vec<(RecordKind, RecordId)>> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    let mut visit = |kind: RecordKind, record_id: RecordId| {
        if graph.is_dirty(kind, record_id) && seen.insert((kind, record_id)) {
            ordered.push((kind, record_id));
        }
    };

    for root in roots {
        let bib = graph.bib(*root)?;
        visit(RecordKind::Bib, bib.record_id);
        for holdings_id in &bib.holdings_ids {
            let Ok(holdings) = graph.holdings(*holdings_id) else {
                continue;
            };
            visit(RecordKind::Holdings, holdings.record_id);
            for item_id in &holdings.item_ids {
                if graph.contains(RecordKind::Item, *item_id) {
                    visit(RecordKind::Item, *item_id);
                }
            }
        }
        for item_id in &bib.item_ids {
            if graph.contains(RecordKind::Item, *item_id) {
                visit(RecordKind::Item, *item_id);
            }
        }
    }

    Ok(ordered)
}

fn bib_row(bib: &BibliographicRecord) -> RecordRow {
    RecordRow {
        record_id: bib.record_id,
        owning_institution_id: bib.owning_institution_id,
        local_id: bib.owning_institution_bib_id.clone(),
        is_deleted: bib.is_deleted,
        audit: bib.audit.clone(),
        version: bib.version,
    }
}

fn holdings_row(holdings: &HoldingsRecord) -> RecordRow {
    RecordRow {
        record_id: holdings.record_id,
        owning_institution_id: holdings.owning_institution_id,
        local_id: holdings.owning_institution_holdings_id.clone(),
        is_deleted: holdings.is_deleted,
        audit: holdings.audit.clone(),
        version: holdings.version,
    }
}

fn item_row(item: &ItemRecord) -> RecordRow {
    RecordRow {
        record_id: item.record_id,
        owning_institution_id: item.owning_institution_id,
        local_id: item.owning_institution_item_id.clone(),
        is_deleted: item.is_deleted,
        audit: item.audit.clone(),
        version: item.version,
    }
}

fn read_record_row(
    conn: &Connection,
    table: &RecordTable,
    record_id: RecordId,
) -> StoreResult<Option<RecordRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT
            record_id,
            owning_institution_id,
            {} AS local_id,
            is_deleted,
            created_by,
            created_at,
            last_updated_by,
            last_updated_at,
            version
         FROM {}
         WHERE record_id = ?1;",
        table.local_id_column, table.table
    ))?;
    let mut rows = stmt.query([record_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_record_row(row, table)?));
    }
    Ok(None)
}

fn parse_record_row(row: &Row<'_>, table: &RecordTable) -> StoreResult<RecordRow> {
    let record_id_text: String = row.get("record_id")?;
    let record_id = parse_uuid(&record_id_text, table.table)?;

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_deleted value `{other}` in {}.is_deleted",
                table.table
            )));
        }
    };

    Ok(RecordRow {
        record_id,
        owning_institution_id: row.get("owning_institution_id")?,
        local_id: row.get("local_id")?,
        is_deleted,
        audit: AuditStamp {
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            last_updated_by: row.get("last_updated_by")?,
            last_updated_at: row.get("last_updated_at")?,
        },
        version: row.get("version")?,
    })
}

fn linked_ids(
    conn: &Connection,
    link: &LinkTable,
    side: LinkSide,
    owner: RecordId,
) -> StoreResult<Vec<RecordId>> {
    let (owner_column, other_column) = match side {
        LinkSide::Left => (link.left, link.right),
        LinkSide::Right => (link.right, link.left),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {other_column}
         FROM {}
         WHERE {owner_column} = ?1
         ORDER BY rowid ASC;",
        link.table
    ))?;
    let mut rows = stmt.query([owner.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, link.table)?);
    }
    Ok(ids)
}

fn parse_uuid(value: &str, table: &'static str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {table}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
