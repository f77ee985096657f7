//! In-memory association graph for one transfer request.
//!
//! # Responsibility
//! - Hold the bib/holdings/item records loaded for a request, keyed by id.
//! - Own every association mutation so both directions change together.
//! - Track which records were touched and must be written back.
//!
//! # Invariants
//! - Every `link_*`/`unlink_*` call updates the forward list and the reverse
//!   pointer list in one step, or neither when a record is missing.
//! - Association lists stay set-like: linking an existing pair is a no-op.
//! - Records loaded from storage are never replaced by a later reload.

use crate::model::record::{
    BibliographicRecord, HoldingsRecord, ItemRecord, RecordId, RecordKind,
};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GraphResult<T> = Result<T, GraphError>;

/// Graph access error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A referenced record is not part of the loaded neighbourhood.
    MissingRecord {
        kind: RecordKind,
        record_id: RecordId,
    },
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRecord { kind, record_id } => {
                write!(f, "{kind} record {record_id} is not loaded in the inventory graph")
            }
        }
    }
}

impl Error for GraphError {}

/// Loaded records plus the set of records changed since loading.
#[derive(Debug, Clone, Default)]
pub struct InventoryGraph {
    bibs: BTreeMap<RecordId, BibliographicRecord>,
    holdings: BTreeMap<RecordId, HoldingsRecord>,
    items: BTreeMap<RecordId, ItemRecord>,
    dirty: BTreeSet<(RecordKind, RecordId)>,
}

impl InventoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: RecordKind, record_id: RecordId) -> bool {
        match kind {
            RecordKind::Bib => self.bibs.contains_key(&record_id),
            RecordKind::Holdings => self.holdings.contains_key(&record_id),
            RecordKind::Item => self.items.contains_key(&record_id),
        }
    }

    /// Registers a record read from storage. Keeps the existing copy if the
    /// record was loaded before.
    pub fn insert_loaded_bib(&mut self, record: BibliographicRecord) -> RecordId {
        let record_id = record.record_id;
        self.bibs.entry(record_id).or_insert(record);
        record_id
    }

    pub fn insert_loaded_holdings(&mut self, record: HoldingsRecord) -> RecordId {
        let record_id = record.record_id;
        self.holdings.entry(record_id).or_insert(record);
        record_id
    }

    pub fn insert_loaded_item(&mut self, record: ItemRecord) -> RecordId {
        let record_id = record.record_id;
        self.items.entry(record_id).or_insert(record);
        record_id
    }

    /// Adds a newly created record; it is dirty from the start.
    pub fn add_bib(&mut self, record: BibliographicRecord) -> RecordId {
        let record_id = record.record_id;
        self.bibs.insert(record_id, record);
        self.dirty.insert((RecordKind::Bib, record_id));
        record_id
    }

    pub fn add_holdings(&mut self, record: HoldingsRecord) -> RecordId {
        let record_id = record.record_id;
        self.holdings.insert(record_id, record);
        self.dirty.insert((RecordKind::Holdings, record_id));
        record_id
    }

    pub fn add_item(&mut self, record: ItemRecord) -> RecordId {
        let record_id = record.record_id;
        self.items.insert(record_id, record);
        self.dirty.insert((RecordKind::Item, record_id));
        record_id
    }

    pub fn bib(&self, record_id: RecordId) -> GraphResult<&BibliographicRecord> {
        self.bibs
            .get(&record_id)
            .ok_or(missing(RecordKind::Bib, record_id))
    }

    pub fn holdings(&self, record_id: RecordId) -> GraphResult<&HoldingsRecord> {
        self.holdings
            .get(&record_id)
            .ok_or(missing(RecordKind::Holdings, record_id))
    }

    pub fn item(&self, record_id: RecordId) -> GraphResult<&ItemRecord> {
        self.items
            .get(&record_id)
            .ok_or(missing(RecordKind::Item, record_id))
    }

    /// Mutable access; the record is marked dirty.
    pub fn bib_mut(&mut self, record_id: RecordId) -> GraphResult<&mut BibliographicRecord> {
        self.require(RecordKind::Bib, record_id)?;
        self.dirty.insert((RecordKind::Bib, record_id));
        self.bib_entry(record_id)
    }

    pub fn holdings_mut(&mut self, record_id: RecordId) -> GraphResult<&mut HoldingsRecord> {
        self.require(RecordKind::Holdings, record_id)?;
        self.dirty.insert((RecordKind::Holdings, record_id));
        self.holdings_entry(record_id)
    }

    pub fn item_mut(&mut self, record_id: RecordId) -> GraphResult<&mut ItemRecord> {
        self.require(RecordKind::Item, record_id)?;
        self.dirty.insert((RecordKind::Item, record_id));
        self.item_entry(record_id)
    }

    pub fn is_dirty(&self, kind: RecordKind, record_id: RecordId) -> bool {
        self.dirty.contains(&(kind, record_id))
    }

    /// Stamps `last_updated_by/at` on one record.
    pub fn touch(
        &mut self,
        kind: RecordKind,
        record_id: RecordId,
        actor: &str,
        now: i64,
    ) -> GraphResult<()> {
        match kind {
            RecordKind::Bib => self.bib_mut(record_id)?.audit.touch(actor, now),
            RecordKind::Holdings => self.holdings_mut(record_id)?.audit.touch(actor, now),
            RecordKind::Item => self.item_mut(record_id)?.audit.touch(actor, now),
        }
        Ok(())
    }

    /// Finds a holdings with the given local id among the bib's holdings.
    pub fn find_holdings_under_bib(
        &self,
        bib_id: RecordId,
        owning_institution_holdings_id: &str,
    ) -> GraphResult<Option<RecordId>> {
        for holdings_id in &self.bib(bib_id)?.holdings_ids {
            let holdings = self.holdings(*holdings_id)?;
            if holdings.owning_institution_holdings_id == owning_institution_holdings_id {
                return Ok(Some(*holdings_id));
            }
        }
        Ok(None)
    }

    /// Finds an item with the given local id among the holdings' items.
    pub fn find_item_under_holdings(
        &self,
        holdings_id: RecordId,
        owning_institution_item_id: &str,
    ) -> GraphResult<Option<RecordId>> {
        for item_id in &self.holdings(holdings_id)?.item_ids {
            let item = self.item(*item_id)?;
            if item.owning_institution_item_id == owning_institution_item_id {
                return Ok(Some(*item_id));
            }
        }
        Ok(None)
    }

    pub fn link_bib_holdings(
        &mut self,
        bib_id: RecordId,
        holdings_id: RecordId,
    ) -> GraphResult<bool> {
        self.require(RecordKind::Bib, bib_id)?;
        self.require(RecordKind::Holdings, holdings_id)?;
        let forward =
            insert_unique(&mut self.bib_entry(bib_id)?.holdings_ids, holdings_id);
        let reverse =
            insert_unique(&mut self.holdings_entry(holdings_id)?.bib_ids, bib_id);
        Ok(self.mark_pair(
            forward || reverse,
            (RecordKind::Bib, bib_id),
            (RecordKind::Holdings, holdings_id),
        ))
    }

    pub fn unlink_bib_holdings(
        &mut self,
        bib_id: RecordId,
        holdings_id: RecordId,
    ) -> GraphResult<bool> {
        self.require(RecordKind::Bib, bib_id)?;
        self.require(RecordKind::Holdings, holdings_id)?;
        let forward = remove_id(&mut self.bib_entry(bib_id)?.holdings_ids, holdings_id);
        let reverse = remove_id(&mut self.holdings_entry(holdings_id)?.bib_ids, bib_id);
        Ok(self.mark_pair(
            forward || reverse,
            (RecordKind::Bib, bib_id),
            (RecordKind::Holdings, holdings_id),
        ))
    }

    pub fn link_bib_item(
        &mut self,
        bib_id: RecordId,
        item_id: RecordId,
    ) -> GraphResult<bool> {
        self.require(RecordKind::Bib, bib_id)?;
        self.require(RecordKind::Item, item_id)?;
        let forward = insert_unique(&mut self.bib_entry(bib_id)?.item_ids, item_id);
        let reverse = insert_unique(&mut self.item_entry(item_id)?.bib_ids, bib_id);
        Ok(self.mark_pair(
            forward || reverse,
            (RecordKind::Bib, bib_id),
            (RecordKind::Item, item_id),
        ))
    }

    pub fn unlink_bib_item(
        &mut self,
        bib_id: RecordId,
        item_id: RecordId,
    ) -> GraphResult<bool> {
        self.require(RecordKind::Bib, bib_id)?;
        self.require(RecordKind::Item, item_id)?;
        let forward = remove_id(&mut self.bib_entry(bib_id)?.item_ids, item_id);
        let reverse = remove_id(&mut self.item_entry(item_id)?.bib_ids, bib_id);
        Ok(self.mark_pair(
            forward || reverse,
            (RecordKind::Bib, bib_id),
            (RecordKind::Item, item_id),
        ))
    }

    pub fn link_holdings_item(
        &mut self,
        holdings_id: RecordId,
        item_id: RecordId,
    ) -> GraphResult<bool> {
        self.require(RecordKind::Holdings, holdings_id)?;
        self.require(RecordKind::Item, item_id)?;
        let forward =
            insert_unique(&mut self.holdings_entry(holdings_id)?.item_ids, item_id);
        let reverse =
            insert_unique(&mut self.item_entry(item_id)?.holdings_ids, holdings_id);
        Ok(self.mark_pair(
            forward || reverse,
            (RecordKind::Holdings, holdings_id),
            (RecordKind::Item, item_id),
        ))
    }

    pub fn unlink_holdings_item(
        &mut self,
        holdings_id: RecordId,
        item_id: RecordId,
    ) -> GraphResult<bool> {
        self.require(RecordKind::Holdings, holdings_id)?;
        self.require(RecordKind::Item, item_id)?;
        let forward = remove_id(&mut self.holdings_entry(holdings_id)?.item_ids, item_id);
        let reverse =
            remove_id(&mut self.item_entry(item_id)?.holdings_ids, holdings_id);
        Ok(self.mark_pair(
            forward || reverse,
            (RecordKind::Holdings, holdings_id),
            (RecordKind::Item, item_id),
        ))
    }

    fn require(&self, kind: RecordKind, record_id: RecordId) -> GraphResult<()> {
        if self.contains(kind, record_id) {
            Ok(())
        } else {
            Err(missing(kind, record_id))
        }
    }

    fn mark_pair(
        &mut self,
        changed: bool,
        left: (RecordKind, RecordId),
        right: (RecordKind, RecordId),
    ) -> bool {
        if changed {
            self.dirty.insert(left);
            self.dirty.insert(right);
        }
        changed
    }

    fn bib_entry(&mut self, record_id: RecordId) -> GraphResult<&mut BibliographicRecord> {
        self.bibs
            .get_mut(&record_id)
            .ok_or(missing(RecordKind::Bib, record_id))
    }

    fn holdings_entry(&mut self, record_id: RecordId) -> GraphResult<&mut HoldingsRecord> {
        self.holdings
            .get_mut(&record_id)
            .ok_or(missing(RecordKind::Holdings, record_id))
    }

    fn item_entry(&mut self, record_id: RecordId) -> GraphResult<&mut ItemRecord> {
        self.items
            .get_mut(&record_id)
            .ok_or(missing(RecordKind::Item, record_id))
    }
}

fn missing(kind: RecordKind, record_id: RecordId) -> GraphError {
    GraphError::MissingRecord { kind, record_id }
}

fn insert_unique(ids: &mut Vec<RecordId>, id: RecordId) -> bool {
    if ids.contains(&id) {
        return false;
    }
    ids.push(id);
    true
}

fn remove_id(ids: &mut Vec<RecordId>, id: RecordId) -> bool {
    let before = ids.len();
    ids.retain(|current| *current != id);
    ids.len() != before
}
