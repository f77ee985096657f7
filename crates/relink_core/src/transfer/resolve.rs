//! Destination stub materialization.
//!
//! Stubs are added to the request graph only. They reach storage together
//! with the rest of the relink when the request's changes are saved, so a
//! failed relink never leaves a half-created destination behind.

use crate::model::graph::{GraphResult, InventoryGraph};
use crate::model::record::{BibliographicRecord, HoldingsRecord, InstitutionId, RecordId};
use crate::transfer::validate::Placement;
use log::debug;

/// Turns destination placements into graph record ids.
pub struct DestinationResolver<'a> {
    institution_id: InstitutionId,
    actor: &'a str,
    now: i64,
}

impl<'a> DestinationResolver<'a> {
    pub fn new(institution_id: InstitutionId, actor: &'a str, now: i64) -> Self {
        Self {
            institution_id,
            actor,
            now,
        }
    }

    /// Returns the existing bib, or a fresh empty stub owned by the institution.
    pub fn resolve_bib(
        &self,
        graph: &mut InventoryGraph,
        placement: &Placement,
    ) -> GraphResult<RecordId> {
        match placement {
            Placement::Existing(bib_id) => graph.bib(*bib_id).map(|bib| bib.record_id),
            Placement::Create { local_id } => {
                let stub = BibliographicRecord::new(
                    self.institution_id,
                    local_id.as_str(),
                    self.actor,
                    self.now,
                );
                debug!(
                    "event=stub_created module=transfer kind=bib institution_id={} record_id={}",
                    self.institution_id, stub.record_id
                );
                Ok(graph.add_bib(stub))
            }
        }
    }

    pub fn resolve_holdings(
        &self,
        graph: &mut InventoryGraph,
        placement: &Placement,
    ) -> GraphResult<RecordId> {
        match placement {
            Placement::Existing(holdings_id) => {
                graph.holdings(*holdings_id).map(|holdings| holdings.record_id)
            }
            Placement::Create { local_id } => {
                let stub = HoldingsRecord::new(
                    self.institution_id,
                    local_id.as_str(),
                    self.actor,
                    self.now,
                );
                debug!(
                    "event=stub_created module=transfer kind=holdings institution_id={} record_id={}",
                    self.institution_id, stub.record_id
                );
                Ok(graph.add_holdings(stub))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DestinationResolver;
    use crate::model::graph::InventoryGraph;
    use crate::model::record::RecordKind;
    use crate::transfer::validate::Placement;

    #[test]
    fn stub_is_owned_by_institution_and_dirty() {
        let mut graph = InventoryGraph::new();
        let resolver = DestinationResolver::new(7, "transfer", 42);

        let bib_id = resolver
            .resolve_bib(
                &mut graph,
                &Placement::Create {
                    local_id: "B2".to_string(),
                },
            )
            .unwrap();

        let bib = graph.bib(bib_id).unwrap();
        assert_eq!(bib.owning_institution_id, 7);
        assert_eq!(bib.owning_institution_bib_id, "B2");
        assert_eq!(bib.audit.created_by, "transfer");
        assert_eq!(bib.audit.created_at, 42);
        assert!(!bib.is_persisted());
        assert!(bib.holdings_ids.is_empty());
        assert!(graph.is_dirty(RecordKind::Bib, bib_id));
    }

    #[test]
    fn existing_placement_must_be_loaded() {
        let mut graph = InventoryGraph::new();
        let resolver = DestinationResolver::new(7, "transfer", 42);
        let absent = uuid::Uuid::new_v4();

        assert!(resolver
            .resolve_holdings(&mut graph, &Placement::Existing(absent))
            .is_err());
    }
}
