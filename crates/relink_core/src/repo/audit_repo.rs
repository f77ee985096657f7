//! Audit sink contract and SQLite implementation.
//!
//! # Responsibility
//! - Append human-readable change-log lines for moved items.
//! - Append one header/value report per processed transfer request.
//!
//! # Invariants
//! - A change-log entry writes exactly one row per affected item.
//! - A report and its header rows are written atomically.

use crate::db::DbError;
use crate::model::record::RecordId;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug)]
pub enum AuditError {
    Db(DbError),
    /// Report payload could not be encoded.
    Serialize(serde_json::Error),
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "failed to serialize audit payload: {err}"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<DbError> for AuditError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// One change-log line shared by every affected item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub updated_by: String,
    pub updated_at: i64,
    pub operation_type: String,
    pub notes: String,
    pub item_ids: Vec<RecordId>,
}

/// Persisted change-log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogRow {
    pub record_id: String,
    pub operation_type: String,
    pub updated_by: String,
    pub updated_at: i64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportField {
    pub header_name: String,
    pub header_value: String,
}

impl ReportField {
    pub fn new(header_name: impl Into<String>, header_value: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            header_value: header_value.into(),
        }
    }
}

/// Header/value report for one processed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub file_name: String,
    pub report_type: String,
    pub institution: String,
    pub created_at: i64,
    pub fields: Vec<ReportField>,
}

impl ReportEntry {
    /// Returns the value of the first field named `header_name`.
    pub fn field(&self, header_name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.header_name == header_name)
            .map(|field| field.header_value.as_str())
    }
}

/// Destination for change-log lines and per-request reports.
pub trait AuditSink {
    /// Appends one row per item in `entry.item_ids`.
    fn append_change_log(&self, entry: &ChangeLogEntry) -> AuditResult<()>;
    /// Stores one report; returns its id.
    fn append_report(&self, report: &ReportEntry) -> AuditResult<i64>;
}

/// Audit sink writing to the `item_change_log` and `reports` tables.
pub struct SqliteAuditSink<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditSink<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Lists change-log rows for one item, oldest first.
    pub fn change_log_for(&self, record_id: RecordId) -> AuditResult<Vec<ChangeLogRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT record_id, operation_type, updated_by, updated_at, notes
             FROM item_change_log
             WHERE record_id = ?1
             ORDER BY change_log_id ASC;",
        )?;
        let mut rows = stmt.query([record_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(ChangeLogRow {
                record_id: row.get(0)?,
                operation_type: row.get(1)?,
                updated_by: row.get(2)?,
                updated_at: row.get(3)?,
                notes: row.get(4)?,
            });
        }
        Ok(entries)
    }

    /// Lists every stored report with its fields, oldest first.
    pub fn list_reports(&self) -> AuditResult<Vec<ReportEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_id, file_name, report_type, institution, created_at
             FROM reports
             ORDER BY report_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            let report_id: i64 = row.get(0)?;
            reports.push(ReportEntry {
                file_name: row.get(1)?,
                report_type: row.get(2)?,
                institution: row.get(3)?,
                created_at: row.get(4)?,
                fields: self.report_fields(report_id)?,
            });
        }
        Ok(reports)
    }

    fn report_fields(&self, report_id: i64) -> AuditResult<Vec<ReportField>> {
        let mut stmt = self.conn.prepare(
            "SELECT header_name, header_value
             FROM report_data
             WHERE report_id = ?1
             ORDER BY report_data_id ASC;",
        )?;
        let mut rows = stmt.query([report_id])?;
        let mut fields = Vec::new();
        while let Some(row) = rows.next()? {
            fields.push(ReportField {
                header_name: row.get(0)?,
                header_value: row.get(1)?,
            });
        }
        Ok(fields)
    }
}

impl AuditSink for SqliteAuditSink<'_> {
    fn append_change_log(&self, entry: &ChangeLogEntry) -> AuditResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO item_change_log (
                record_id,
                operation_type,
                updated_by,
                updated_at,
                notes
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        for item_id in &entry.item_ids {
            stmt.execute(params![
                item_id.to_string(),
                entry.operation_type.as_str(),
                entry.updated_by.as_str(),
                entry.updated_at,
                entry.notes.as_str(),
            ])?;
        }
        Ok(())
    }

    fn append_report(&self, report: &ReportEntry) -> AuditResult<i64> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO reports (file_name, report_type, institution, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                report.file_name.as_str(),
                report.report_type.as_str(),
                report.institution.as_str(),
                report.created_at,
            ],
        )?;
        let report_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO report_data (report_id, header_name, header_value)
                 VALUES (?1, ?2, ?3);",
            )?;
            for field in &report.fields {
                stmt.execute(params![
                    report_id,
                    field.header_name.as_str(),
                    field.header_value.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(report_id)
    }
}
