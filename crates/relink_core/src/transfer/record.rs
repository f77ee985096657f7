//! Persistence, change log and index planning for one relink.
//!
//! # Responsibility
//! - Save the source and destination bibs, cascading to every changed
//!   holdings and item under them.
//! - Append the change-log line for the moved items.
//! - Compute which search documents to purge and which bibs to reindex.
//!
//! # Invariants
//! - Runs inside the request transaction; a failure here rolls the whole
//!   relink back.
//! - `to_index` covers every bib the moved records hung off before the move
//!   and after it, plus both endpoints.

use crate::model::graph::{GraphResult, InventoryGraph};
use crate::model::record::{RecordId, RecordKind};
use crate::repo::audit_repo::{AuditSink, ChangeLogEntry};
use crate::repo::inventory_repo::InventoryStore;
use crate::search::index::DocumentRef;
use crate::transfer::outcome::TransferKind;
use crate::transfer::TransferFailure;
use log::debug;
use std::collections::BTreeSet;

/// Operation type written to the change log.
pub const CHANGE_LOG_OPERATION: &str = "Transfer";

/// Search maintenance to run once the transaction has committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPlan {
    pub to_delete: BTreeSet<DocumentRef>,
    pub to_index: BTreeSet<RecordId>,
}

/// Endpoints of a completed relink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferChange {
    pub kind: TransferKind,
    /// The moved item or holdings.
    pub moved: DocumentRef,
    pub source_bib: RecordId,
    pub source_holdings: RecordId,
    pub destination_bib: RecordId,
    pub destination_holdings: RecordId,
    /// Bibs reachable from `moved` before the relink.
    pub prior_bibs: BTreeSet<RecordId>,
}

/// Bibs whose documents include `moved`: an item's bibs, or a holdings'
/// bibs together with the bibs of its items.
pub fn bibs_reachable_from(
    graph: &InventoryGraph,
    moved: DocumentRef,
) -> GraphResult<BTreeSet<RecordId>> {
    let mut bibs = BTreeSet::new();
    match moved.kind {
        RecordKind::Item => bibs.extend(graph.item(moved.record_id)?.bib_ids.iter().copied()),
        RecordKind::Holdings => {
            let holdings = graph.holdings(moved.record_id)?;
            bibs.extend(holdings.bib_ids.iter().copied());
            for item_id in &holdings.item_ids {
                bibs.extend(graph.item(*item_id)?.bib_ids.iter().copied());
            }
        }
        RecordKind::Bib => {
            bibs.insert(moved.record_id);
        }
    }
    Ok(bibs)
}

/// Items whose change-log rows and documents are affected by the move.
fn moved_items(graph: &InventoryGraph, moved: DocumentRef) -> GraphResult<Vec<RecordId>> {
    match moved.kind {
        RecordKind::Item => Ok(vec![moved.record_id]),
        RecordKind::Holdings => Ok(graph.holdings(moved.record_id)?.item_ids.clone()),
        RecordKind::Bib => Ok(Vec::new()),
    }
}

/// Human-readable change-log line.
pub fn change_log_line(change: &TransferChange) -> String {
    let subject = match change.kind {
        TransferKind::Item => "Item",
        TransferKind::Holdings => "Holdings",
    };
    format!(
        "{subject} transferred from source (bibId : {} , holdingsId : {}) to destination (bibId : {} , holdingsId : {})",
        change.source_bib,
        change.source_holdings,
        change.destination_bib,
        change.destination_holdings
    )
}

pub struct ChangeRecorder<'a, S: InventoryStore + ?Sized, A: AuditSink + ?Sized> {
    store: &'a S,
    audit: &'a A,
    actor: &'a str,
    now: i64,
}

impl<'a, S: InventoryStore + ?Sized, A: AuditSink + ?Sized> ChangeRecorder<'a, S, A> {
    pub fn new(store: &'a S, audit: &'a A, actor: &'a str, now: i64) -> Self {
        Self {
            store,
            audit,
            actor,
            now,
        }
    }

    /// Persists the relinked graph and returns the index work it implies.
    pub fn record(
        &self,
        graph: &InventoryGraph,
        change: &TransferChange,
    ) -> Result<IndexPlan, TransferFailure> {
        let written = self
            .store
            .save_bibs(graph, &[change.source_bib, change.destination_bib])?;

        let item_ids = moved_items(graph, change.moved)?;
        self.audit.append_change_log(&ChangeLogEntry {
            updated_by: self.actor.to_string(),
            updated_at: self.now,
            operation_type: CHANGE_LOG_OPERATION.to_string(),
            notes: change_log_line(change),
            item_ids: item_ids.clone(),
        })?;

        let mut plan = IndexPlan::default();
        plan.to_delete.insert(change.moved);
        if change.moved.kind == RecordKind::Holdings {
            plan.to_delete.extend(
                item_ids
                    .iter()
                    .map(|item_id| DocumentRef::new(RecordKind::Item, *item_id)),
            );
        }
        plan.to_index.extend(change.prior_bibs.iter().copied());
        plan.to_index.extend(bibs_reachable_from(graph, change.moved)?);
        plan.to_index.insert(change.source_bib);
        plan.to_index.insert(change.destination_bib);

        debug!(
            "event=transfer_recorded module=transfer moved={} records_written={written} to_delete={} to_index={}",
            change.moved,
            plan.to_delete.len(),
            plan.to_index.len()
        );
        Ok(plan)
    }
}
