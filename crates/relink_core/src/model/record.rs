//! Inventory record model.
//!
//! # Responsibility
//! - Define bibliographic, holdings and item records with their identity,
//!   tombstone flag, audit stamp and association id lists.
//! - Provide constructors for freshly created (not yet persisted) records.
//!
//! # Invariants
//! - `record_id` is stable and never reused for another record.
//! - Request resolution matches on `(owning_institution_id, local id)`, never
//!   on `record_id`.
//! - `is_deleted` is a logical tombstone; records are never physically removed.
//! - `version == 0` marks a record that has not been persisted yet.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Internal identifier shared by every record kind.
pub type RecordId = Uuid;

/// Owning institution (tenant) identifier.
pub type InstitutionId = i64;

/// Record kind, also used as the search document type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Bib,
    Holdings,
    Item,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bib => "bib",
            Self::Holdings => "holdings",
            Self::Item => "item",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bib" => Some(Self::Bib),
            "holdings" => Some(Self::Holdings),
            "item" => Some(Self::Item),
            _ => None,
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation and last-update audit fields, epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub created_by: String,
    pub created_at: i64,
    pub last_updated_by: String,
    pub last_updated_at: i64,
}

impl AuditStamp {
    /// Stamp for a record created by `actor` at `now`.
    pub fn created(actor: &str, now: i64) -> Self {
        Self {
            created_by: actor.to_string(),
            created_at: now,
            last_updated_by: actor.to_string(),
            last_updated_at: now,
        }
    }

    pub fn touch(&mut self, actor: &str, now: i64) {
        self.last_updated_by = actor.to_string();
        self.last_updated_at = now;
    }
}

/// Bibliographic record with its owned holdings and denormalized items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographicRecord {
    pub record_id: RecordId,
    pub owning_institution_id: InstitutionId,
    pub owning_institution_bib_id: String,
    pub is_deleted: bool,
    pub audit: AuditStamp,
    /// Optimistic concurrency token; `0` until first persisted.
    pub version: i64,
    pub holdings_ids: Vec<RecordId>,
    /// Kept in sync with the items reachable through `holdings_ids`.
    pub item_ids: Vec<RecordId>,
}

impl BibliographicRecord {
    /// Creates an empty, active bib owned by `owning_institution_id`.
    pub fn new(
        owning_institution_id: InstitutionId,
        owning_institution_bib_id: impl Into<String>,
        actor: &str,
        now: i64,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            owning_institution_id,
            owning_institution_bib_id: owning_institution_bib_id.into(),
            is_deleted: false,
            audit: AuditStamp::created(actor, now),
            version: 0,
            holdings_ids: Vec::new(),
            item_ids: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }
}

/// Holdings record. May transiently belong to more than one bib.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingsRecord {
    pub record_id: RecordId,
    pub owning_institution_id: InstitutionId,
    pub owning_institution_holdings_id: String,
    pub is_deleted: bool,
    pub audit: AuditStamp,
    pub version: i64,
    pub bib_ids: Vec<RecordId>,
    pub item_ids: Vec<RecordId>,
}

impl HoldingsRecord {
    pub fn new(
        owning_institution_id: InstitutionId,
        owning_institution_holdings_id: impl Into<String>,
        actor: &str,
        now: i64,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            owning_institution_id,
            owning_institution_holdings_id: owning_institution_holdings_id.into(),
            is_deleted: false,
            audit: AuditStamp::created(actor, now),
            version: 0,
            bib_ids: Vec::new(),
            item_ids: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }
}

/// Item record with reverse pointers to its bibs and holdings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub record_id: RecordId,
    pub owning_institution_id: InstitutionId,
    pub owning_institution_item_id: String,
    pub is_deleted: bool,
    pub audit: AuditStamp,
    pub version: i64,
    pub bib_ids: Vec<RecordId>,
    pub holdings_ids: Vec<RecordId>,
}

impl ItemRecord {
    pub fn new(
        owning_institution_id: InstitutionId,
        owning_institution_item_id: impl Into<String>,
        actor: &str,
        now: i64,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            owning_institution_id,
            owning_institution_item_id: owning_institution_item_id.into(),
            is_deleted: false,
            audit: AuditStamp::created(actor, now),
            version: 0,
            bib_ids: Vec::new(),
            holdings_ids: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }
}

/// Current wall clock as epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::{AuditStamp, BibliographicRecord, RecordKind};

    #[test]
    fn record_kind_round_trips_through_db_text() {
        for kind in [RecordKind::Bib, RecordKind::Holdings, RecordKind::Item] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("marc"), None);
    }

    #[test]
    fn new_records_are_active_and_unpersisted() {
        let bib = BibliographicRecord::new(1, "B1", "transfer", 10);
        assert!(!bib.is_deleted);
        assert!(!bib.is_persisted());
        assert!(bib.holdings_ids.is_empty());
        assert_eq!(bib.audit, AuditStamp::created("transfer", 10));
    }

    #[test]
    fn touch_only_moves_last_updated_fields() {
        let mut stamp = AuditStamp::created("loader", 1);
        stamp.touch("transfer", 5);
        assert_eq!(stamp.created_by, "loader");
        assert_eq!(stamp.created_at, 1);
        assert_eq!(stamp.last_updated_by, "transfer");
        assert_eq!(stamp.last_updated_at, 5);
    }
}
