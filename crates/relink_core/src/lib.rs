//! Inventory transfer and relink engine.
//!
//! Moves items and holdings between bibliographic records of a
//! multi-institution catalog while keeping the bib/holdings/item association
//! graph, logical deletion flags, audit trail and search index consistent.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod transfer;

pub use config::{ConfigError, LoggingConfig, TransferConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::graph::{GraphError, InventoryGraph};
pub use model::record::{
    BibliographicRecord, HoldingsRecord, InstitutionId, ItemRecord, RecordId, RecordKind,
};
pub use model::transfer::{
    HoldingTransferResponse, HoldingsLocation, HoldingsTransferRequest, Institution,
    ItemLocation, ItemTransferRequest, ItemTransferResponse, TransferRequest, TransferResponse,
};
pub use repo::audit_repo::{AuditError, AuditSink, ReportEntry, SqliteAuditSink};
pub use repo::inventory_repo::{InventoryStore, SqliteInventoryStore, StoreError, StoreResult};
pub use search::index::{
    search_documents, DocumentHit, DocumentQuery, DocumentRef, SearchError, SearchIndex,
    SqliteSearchIndex,
};
pub use service::transfer_service::TransferService;
pub use transfer::outcome::{ReasonCode, TransferMessage};
pub use transfer::TransferFailure;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
