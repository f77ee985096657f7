//! Association rewiring for item and holdings transfers.
//!
//! # Invariants
//! - Every association change goes through the graph's paired link/unlink
//!   operations, so forward lists and reverse pointers never diverge.
//! - Re-linking an association that already exists is a no-op.
//! - Every record whose associations moved gets its update stamp.

use crate::model::graph::{GraphResult, InventoryGraph};
use crate::model::record::{RecordId, RecordKind};

/// Records taking part in one item move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemMove {
    pub source_bib: RecordId,
    pub source_holdings: RecordId,
    pub item: RecordId,
    pub destination_bib: RecordId,
    pub destination_holdings: RecordId,
}

/// Records taking part in one holdings move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldingsMove {
    pub source_bib: RecordId,
    pub holdings: RecordId,
    pub destination_bib: RecordId,
}

pub struct GraphRelinker<'a> {
    actor: &'a str,
    now: i64,
}

impl<'a> GraphRelinker<'a> {
    pub fn new(actor: &'a str, now: i64) -> Self {
        Self { actor, now }
    }

    /// Detaches the item from its source bib/holdings and attaches it to the
    /// destination pair, which is itself linked if it was not already.
    pub fn transfer_item(&self, graph: &mut InventoryGraph, step: &ItemMove) -> GraphResult<()> {
        graph.unlink_holdings_item(step.source_holdings, step.item)?;
        graph.unlink_bib_item(step.source_bib, step.item)?;

        graph.link_holdings_item(step.destination_holdings, step.item)?;
        graph.link_bib_item(step.destination_bib, step.item)?;
        graph.link_bib_holdings(step.destination_bib, step.destination_holdings)?;

        for (kind, record_id) in [
            (RecordKind::Bib, step.source_bib),
            (RecordKind::Holdings, step.source_holdings),
            (RecordKind::Bib, step.destination_bib),
            (RecordKind::Holdings, step.destination_holdings),
            (RecordKind::Item, step.item),
        ] {
            graph.touch(kind, record_id, self.actor, self.now)?;
        }
        Ok(())
    }

    /// Moves the holdings, with its unchanged item set, under the destination
    /// bib. Its items follow the bib change; their holdings link stays.
    pub fn transfer_holdings(
        &self,
        graph: &mut InventoryGraph,
        step: &HoldingsMove,
    ) -> GraphResult<()> {
        graph.unlink_bib_holdings(step.source_bib, step.holdings)?;

        let item_ids = graph.holdings(step.holdings)?.item_ids.clone();
        for item_id in &item_ids {
            graph.unlink_bib_item(step.source_bib, *item_id)?;
            graph.link_bib_item(step.destination_bib, *item_id)?;
            graph.touch(RecordKind::Item, *item_id, self.actor, self.now)?;
        }

        graph.link_bib_holdings(step.destination_bib, step.holdings)?;

        graph.touch(RecordKind::Bib, step.source_bib, self.actor, self.now)?;
        graph.touch(RecordKind::Bib, step.destination_bib, self.actor, self.now)?;
        graph.touch(RecordKind::Holdings, step.holdings, self.actor, self.now)?;
        Ok(())
    }
}
