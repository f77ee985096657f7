//! Bottom-up logical-deletion reconciliation.
//!
//! # Invariants
//! - A holdings is deleted iff every item it owns is deleted, vacuously
//!   true when it owns none.
//! - A bib is deleted iff every holdings it owns is deleted, vacuously true
//!   when it owns none.
//! - Flags flip both ways: a record that regains an active child is revived.

use crate::model::graph::{GraphResult, InventoryGraph};
use crate::model::record::RecordId;
use std::collections::BTreeMap;

/// Deletion flags a bib subtree should carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionState {
    pub bib_deleted: bool,
    pub holdings_deleted: BTreeMap<RecordId, bool>,
}

/// Computes the flags implied by the items currently under `bib_id`.
pub fn recompute_deletion_state(
    graph: &InventoryGraph,
    bib_id: RecordId,
) -> GraphResult<DeletionState> {
    let bib = graph.bib(bib_id)?;
    let mut holdings_deleted = BTreeMap::new();
    for holdings_id in &bib.holdings_ids {
        let holdings = graph.holdings(*holdings_id)?;
        let mut all_items_deleted = true;
        for item_id in &holdings.item_ids {
            all_items_deleted &= graph.item(*item_id)?.is_deleted;
        }
        holdings_deleted.insert(*holdings_id, all_items_deleted);
    }

    Ok(DeletionState {
        bib_deleted: holdings_deleted.values().all(|deleted| *deleted),
        holdings_deleted,
    })
}

/// Writes recomputed flags back into the graph.
pub struct OrphanReconciler<'a> {
    actor: &'a str,
    now: i64,
}

impl<'a> OrphanReconciler<'a> {
    pub fn new(actor: &'a str, now: i64) -> Self {
        Self { actor, now }
    }

    /// Recomputes and applies the flags of one bib subtree.
    ///
    /// Only records whose flag actually changes are modified and stamped.
    pub fn reconcile(
        &self,
        graph: &mut InventoryGraph,
        bib_id: RecordId,
    ) -> GraphResult<DeletionState> {
        let state = recompute_deletion_state(graph, bib_id)?;

        for (holdings_id, deleted) in &state.holdings_deleted {
            if graph.holdings(*holdings_id)?.is_deleted != *deleted {
                let holdings = graph.holdings_mut(*holdings_id)?;
                holdings.is_deleted = *deleted;
                holdings.audit.touch(self.actor, self.now);
            }
        }
        if graph.bib(bib_id)?.is_deleted != state.bib_deleted {
            let bib = graph.bib_mut(bib_id)?;
            bib.is_deleted = state.bib_deleted;
            bib.audit.touch(self.actor, self.now);
        }

        Ok(state)
    }
}
