//! Transfer request validation.
//!
//! # Responsibility
//! - Resolve source and destination records of a request by
//!   `(institution, local id)` and decide whether the move is legal.
//! - Produce a transfer plan naming every record the relink will touch.
//!
//! # Invariants
//! - Checks short-circuit: the first failing rule decides the reason code.
//! - Validation only reads. Records are loaded into the request graph but
//!   never modified here.
//! - A store failure is an error, not a rejection.

use crate::model::graph::{GraphError, InventoryGraph};
use crate::model::record::{InstitutionId, RecordId};
use crate::model::transfer::{non_blank, HoldingsTransferRequest, ItemTransferRequest};
use crate::repo::inventory_repo::{InventoryStore, StoreError, StoreResult};
use crate::transfer::outcome::{ReasonCode, ValidationOutcome};

/// Where a destination record comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Reuse a record already in the graph.
    Existing(RecordId),
    /// Create a stub with this local id.
    Create { local_id: String },
}

impl Placement {
    pub fn existing(&self) -> Option<RecordId> {
        match self {
            Self::Existing(record_id) => Some(*record_id),
            Self::Create { .. } => None,
        }
    }
}

/// Resolved records of a valid item transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTransferPlan {
    pub source_bib: RecordId,
    pub source_holdings: RecordId,
    pub item: RecordId,
    pub destination_bib: Placement,
    pub destination_holdings: Placement,
}

/// Resolved records of a valid holdings transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingTransferPlan {
    pub source_bib: RecordId,
    pub holdings: RecordId,
    pub destination_bib: Placement,
}

enum Check {
    Reject(ReasonCode),
    Store(StoreError),
}

impl From<StoreError> for Check {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<GraphError> for Check {
    fn from(value: GraphError) -> Self {
        Self::Store(StoreError::Graph(value))
    }
}

type CheckResult<T> = Result<T, Check>;

fn required<T>(value: Option<T>, reason: ReasonCode) -> CheckResult<T> {
    value.ok_or(Check::Reject(reason))
}

fn conclude<T>(result: CheckResult<T>) -> StoreResult<ValidationOutcome<T>> {
    match result {
        Ok(plan) => Ok(ValidationOutcome::Valid(plan)),
        Err(Check::Reject(reason)) => Ok(ValidationOutcome::Invalid(reason)),
        Err(Check::Store(err)) => Err(err),
    }
}

/// Validates requests for one acting institution.
pub struct RequestValidator<'a, S: InventoryStore + ?Sized> {
    store: &'a S,
    institution_id: InstitutionId,
}

impl<'a, S: InventoryStore + ?Sized> RequestValidator<'a, S> {
    pub fn new(store: &'a S, institution_id: InstitutionId) -> Self {
        Self {
            store,
            institution_id,
        }
    }

    /// Validates an item transfer, loading the records it names into `graph`.
    pub fn validate_item_transfer(
        &self,
        graph: &mut InventoryGraph,
        request: &ItemTransferRequest,
    ) -> StoreResult<ValidationOutcome<ItemTransferPlan>> {
        conclude(self.check_item_transfer(graph, request))
    }

    /// Validates a holdings transfer, loading the records it names into `graph`.
    pub fn validate_holding_transfer(
        &self,
        graph: &mut InventoryGraph,
        request: &HoldingsTransferRequest,
    ) -> StoreResult<ValidationOutcome<HoldingTransferPlan>> {
        conclude(self.check_holding_transfer(graph, request))
    }

    fn check_item_transfer(
        &self,
        graph: &mut InventoryGraph,
        request: &ItemTransferRequest,
    ) -> CheckResult<ItemTransferPlan> {
        let source = required(request.source.as_ref(), ReasonCode::SourceEmpty)?;
        let destination = required(request.destination.as_ref(), ReasonCode::DestinationEmpty)?;
        if source.owning_institution_item_id != destination.owning_institution_item_id {
            return Err(Check::Reject(ReasonCode::SourceDestinationItemIdsNotMatching));
        }

        let (source_bib, source_holdings) = self.resolve_source_holdings(
            graph,
            &source.owning_institution_bib_id,
            &source.owning_institution_holdings_id,
        )?;

        let item_local_id = required(
            non_blank(&source.owning_institution_item_id),
            ReasonCode::SourceItemIdEmpty,
        )?;
        let item = required(
            graph.find_item_under_holdings(source_holdings, item_local_id)?,
            ReasonCode::SourceItemNotUnderSourceHolding,
        )?;
        if graph.item(item)?.is_deleted {
            return Err(Check::Reject(ReasonCode::SourceItemDeaccessioned));
        }

        let destination_bib_id = required(
            non_blank(&destination.owning_institution_bib_id),
            ReasonCode::DestOwnInstBibIdEmpty,
        )?;
        let destination_holdings_id = required(
            non_blank(&destination.owning_institution_holdings_id),
            ReasonCode::DestOwnInstHoldingsIdEmpty,
        )?;
        required(
            non_blank(&destination.owning_institution_item_id),
            ReasonCode::DestOwnInstItemIdEmpty,
        )?;

        let destination_bib = match self
            .store
            .load_bib(graph, self.institution_id, destination_bib_id)?
        {
            Some(bib_id) => Placement::Existing(bib_id),
            None => Placement::Create {
                local_id: destination_bib_id.to_string(),
            },
        };
        let destination_holdings =
            self.resolve_destination_holdings(graph, &destination_bib, destination_holdings_id)?;

        Ok(ItemTransferPlan {
            source_bib,
            source_holdings,
            item,
            destination_bib,
            destination_holdings,
        })
    }

    fn check_holding_transfer(
        &self,
        graph: &mut InventoryGraph,
        request: &HoldingsTransferRequest,
    ) -> CheckResult<HoldingTransferPlan> {
        let source = required(request.source.as_ref(), ReasonCode::SourceEmpty)?;
        let destination = required(request.destination.as_ref(), ReasonCode::DestinationEmpty)?;
        if source.owning_institution_holdings_id != destination.owning_institution_holdings_id {
            return Err(Check::Reject(
                ReasonCode::SourceDestinationHoldingsIdsNotMatching,
            ));
        }

        let (source_bib, holdings) = self.resolve_source_holdings(
            graph,
            &source.owning_institution_bib_id,
            &source.owning_institution_holdings_id,
        )?;

        let destination_bib_id = required(
            non_blank(&destination.owning_institution_bib_id),
            ReasonCode::DestOwnInstBibIdEmpty,
        )?;
        required(
            non_blank(&destination.owning_institution_holdings_id),
            ReasonCode::DestOwnInstHoldingsIdEmpty,
        )?;

        let destination_bib = match self
            .store
            .load_bib(graph, self.institution_id, destination_bib_id)?
        {
            Some(bib_id) if graph.bib(bib_id)?.is_deleted => {
                return Err(Check::Reject(ReasonCode::DestBibDeaccessioned));
            }
            Some(bib_id) => Placement::Existing(bib_id),
            None => Placement::Create {
                local_id: destination_bib_id.to_string(),
            },
        };

        Ok(HoldingTransferPlan {
            source_bib,
            holdings,
            destination_bib,
        })
    }

    /// Resolves the source bib and the active holdings under it.
    fn resolve_source_holdings(
        &self,
        graph: &mut InventoryGraph,
        bib_local_id: &Option<String>,
        holdings_local_id: &Option<String>,
    ) -> CheckResult<(RecordId, RecordId)> {
        let bib_local_id = required(non_blank(bib_local_id), ReasonCode::SourceBibIdEmpty)?;
        let bib = required(
            self.store.load_bib(graph, self.institution_id, bib_local_id)?,
            ReasonCode::SourceBibNotExist,
        )?;

        let holdings_local_id =
            required(non_blank(holdings_local_id), ReasonCode::SourceHoldingsIdEmpty)?;
        let holdings = required(
            graph.find_holdings_under_bib(bib, holdings_local_id)?,
            ReasonCode::SourceHoldingNotUnderSourceBib,
        )?;
        if graph.holdings(holdings)?.is_deleted {
            return Err(Check::Reject(ReasonCode::SourceHoldingDeaccessioned));
        }
        Ok((bib, holdings))
    }

    /// Reuses a holdings already under the destination bib, then falls back
    /// to an unattached holdings with the same local id, then to a stub.
    fn resolve_destination_holdings(
        &self,
        graph: &mut InventoryGraph,
        destination_bib: &Placement,
        holdings_local_id: &str,
    ) -> CheckResult<Placement> {
        if let Some(bib_id) = destination_bib.existing() {
            if let Some(holdings_id) = graph.find_holdings_under_bib(bib_id, holdings_local_id)? {
                if graph.holdings(holdings_id)?.is_deleted {
                    return Err(Check::Reject(ReasonCode::DestHoldingDeaccessioned));
                }
                return Ok(Placement::Existing(holdings_id));
            }
        }

        let Some(holdings_id) =
            self.store
                .load_holdings(graph, self.institution_id, holdings_local_id)?
        else {
            return Ok(Placement::Create {
                local_id: holdings_local_id.to_string(),
            });
        };

        let holdings = graph.holdings(holdings_id)?;
        if !holdings.bib_ids.is_empty() {
            return Err(Check::Reject(ReasonCode::DestHoldingsAttachedWithDiffBib));
        }
        if holdings.is_deleted {
            return Err(Check::Reject(ReasonCode::DestHoldingDeaccessioned));
        }
        Ok(Placement::Existing(holdings_id))
    }
}
