//! SQLite FTS5 search document index.
//!
//! # Responsibility
//! - Maintain one search document per active record under each root bib.
//! - Rebuild a bib's documents from the committed inventory rows.
//! - Provide keyword lookup over indexed documents.
//!
//! # Invariants
//! - Reindexing a bib replaces every document rooted at it.
//! - Deleted bibs, holdings and items never produce documents.
//! - Result ordering is deterministic by rank, then document type and id.

use crate::db::DbError;
use crate::model::record::{InstitutionId, RecordId, RecordKind};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing, DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    /// Reindex target bib does not exist.
    MissingBib(RecordId),
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::MissingBib(record_id) => write!(f, "bib record not found: {record_id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Identity of one search document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentRef {
    pub kind: RecordKind,
    pub record_id: RecordId,
}

impl DocumentRef {
    pub fn new(kind: RecordKind, record_id: RecordId) -> Self {
        Self { kind, record_id }
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.record_id)
    }
}

/// Search index maintained after each committed transfer.
pub trait SearchIndex {
    /// Removes every document for the record. Missing documents are not an error.
    fn delete_document(&self, document: DocumentRef) -> SearchResult<()>;
    /// Rebuilds the documents rooted at `bib_id`; returns how many were written.
    fn reindex_by_bibliographic_id(&self, bib_id: RecordId) -> SearchResult<usize>;
}

/// FTS5-backed index sharing the inventory connection.
pub struct SqliteSearchIndex<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSearchIndex<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

struct IndexedRecord {
    record_id: RecordId,
    local_id: String,
}

impl SearchIndex for SqliteSearchIndex<'_> {
    fn delete_document(&self, document: DocumentRef) -> SearchResult<()> {
        let removed = self.conn.execute(
            "DELETE FROM search_documents WHERE doc_type = ?1 AND record_id = ?2;",
            params![document.kind.as_str(), document.record_id.to_string()],
        )?;
        debug!("event=index_delete module=search document={document} removed={removed}");
        Ok(())
    }

    fn reindex_by_bibliographic_id(&self, bib_id: RecordId) -> SearchResult<usize> {
        let bib: Option<(InstitutionId, String, i64)> = self
            .conn
            .query_row(
                "SELECT owning_institution_id, owning_institution_bib_id, is_deleted
                 FROM bibliographic_records
                 WHERE record_id = ?1;",
                [bib_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((institution_id, bib_local_id, is_deleted)) = bib else {
            return Err(SearchError::MissingBib(bib_id));
        };

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM search_documents WHERE root_bib_id = ?1;",
            [bib_id.to_string()],
        )?;

        if is_deleted != 0 {
            tx.commit()?;
            return Ok(0);
        }

        let holdings = active_children(
            &tx,
            "SELECT h.record_id, h.owning_institution_holdings_id
             FROM bib_holdings bh
             JOIN holdings_records h ON h.record_id = bh.holdings_id
             WHERE bh.bib_id = ?1
               AND h.is_deleted = 0
             ORDER BY bh.rowid ASC;",
            bib_id,
        )?;
        let items = active_children(
            &tx,
            "SELECT i.record_id, i.owning_institution_item_id
             FROM bib_items bi
             JOIN item_records i ON i.record_id = bi.item_id
             WHERE bi.bib_id = ?1
               AND i.is_deleted = 0
             ORDER BY bi.rowid ASC;",
            bib_id,
        )?;

        let mut bib_body = vec![bib_local_id];
        bib_body.extend(holdings.iter().map(|record| record.local_id.clone()));
        bib_body.extend(items.iter().map(|record| record.local_id.clone()));

        let mut written = 0;
        let mut insert = tx.prepare(
            "INSERT INTO search_documents (
                doc_type,
                record_id,
                root_bib_id,
                owning_institution_id,
                body
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        insert.execute(params![
            RecordKind::Bib.as_str(),
            bib_id.to_string(),
            bib_id.to_string(),
            institution_id,
            bib_body.join(" "),
        ])?;
        written += 1;
        for (kind, records) in [(RecordKind::Holdings, &holdings), (RecordKind::Item, &items)] {
            for record in records {
                insert.execute(params![
                    kind.as_str(),
                    record.record_id.to_string(),
                    bib_id.to_string(),
                    institution_id,
                    record.local_id.as_str(),
                ])?;
                written += 1;
            }
        }
        drop(insert);
        tx.commit()?;

        debug!("event=index_reindex module=search bib_id={bib_id} documents={written}");
        Ok(written)
    }
}

fn active_children(
    conn: &Connection,
    sql: &str,
    bib_id: RecordId,
) -> SearchResult<Vec<IndexedRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([bib_id.to_string()])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let record_id_text: String = row.get(0)?;
        records.push(IndexedRecord {
            record_id: parse_uuid(&record_id_text)?,
            local_id: row.get(1)?,
        });
    }
    Ok(records)
}

/// Keyword lookup options.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    pub text: String,
    pub kind: Option<RecordKind>,
    pub institution_id: Option<InstitutionId>,
    pub limit: u32,
    /// Pass `text` through as a raw FTS5 expression instead of quoting terms.
    pub raw_fts_syntax: bool,
}

impl DocumentQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            institution_id: None,
            limit: 20,
            raw_fts_syntax: false,
        }
    }
}

/// One matching search document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHit {
    pub kind: RecordKind,
    pub record_id: RecordId,
    pub root_bib_id: RecordId,
    pub owning_institution_id: InstitutionId,
}

/// Searches indexed documents. Blank queries return no hits.
pub fn search_documents(
    conn: &Connection,
    query: &DocumentQuery,
) -> SearchResult<Vec<DocumentHit>> {
    let match_expr = if query.raw_fts_syntax {
        Some(query.text.trim().to_string()).filter(|text| !text.is_empty())
    } else {
        build_match_expression(&query.text)
    };
    let Some(match_expr) = match_expr else {
        return Ok(Vec::new());
    };
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let mut sql = String::from(
        "SELECT doc_type, record_id, root_bib_id, owning_institution_id
         FROM search_documents
         WHERE search_documents MATCH ?",
    );
    let mut bind_values: Vec<Value> = vec![Value::Text(match_expr.clone())];

    if let Some(kind) = query.kind {
        sql.push_str(" AND doc_type = ?");
        bind_values.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(institution_id) = query.institution_id {
        sql.push_str(" AND owning_institution_id = ?");
        bind_values.push(Value::Integer(institution_id));
    }

    sql.push_str(" ORDER BY bm25(search_documents), doc_type ASC, record_id ASC LIMIT ?");
    bind_values.push(Value::Integer(i64::from(query.limit)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query(params_from_iter(bind_values))
        .map_err(|err| map_query_error(err, &match_expr))?;
    let mut hits = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        hits.push(parse_hit(row)?);
    }
    Ok(hits)
}

/// Lists the documents currently rooted at one bib.
pub fn documents_for_bib(conn: &Connection, bib_id: RecordId) -> SearchResult<Vec<DocumentHit>> {
    let mut stmt = conn.prepare(
        "SELECT doc_type, record_id, root_bib_id, owning_institution_id
         FROM search_documents
         WHERE root_bib_id = ?1
         ORDER BY doc_type ASC, record_id ASC;",
    )?;
    let mut rows = stmt.query([bib_id.to_string()])?;
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        hits.push(parse_hit(row)?);
    }
    Ok(hits)
}

fn parse_hit(row: &Row<'_>) -> SearchResult<DocumentHit> {
    let type_text: String = row.get("doc_type")?;
    let kind = RecordKind::parse(&type_text)
        .ok_or_else(|| SearchError::InvalidData(format!("invalid doc_type `{type_text}`")))?;
    let record_id_text: String = row.get("record_id")?;
    let root_text: String = row.get("root_bib_id")?;

    Ok(DocumentHit {
        kind,
        record_id: parse_uuid(&record_id_text)?,
        root_bib_id: parse_uuid(&root_text)?,
        owning_institution_id: row.get("owning_institution_id")?,
    })
}

fn parse_uuid(value: &str) -> SearchResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| SearchError::InvalidData(format!("invalid uuid `{value}`")))
}

fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }
    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}
