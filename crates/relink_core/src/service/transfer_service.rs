//! Transfer orchestration service.
//!
//! # Responsibility
//! - Drive each request of a batch through validation, the transactional
//!   relink phase and post-commit index maintenance.
//! - Turn every request into exactly one response and one audit report.
//!
//! # Invariants
//! - Requests run strictly in batch order; response order equals request order.
//! - A failing request never stops the batch and never leaves partial writes:
//!   its transaction is rolled back.
//! - Index maintenance runs only after commit and its failures are swallowed.
//! - The audit report is written for every request, whatever its outcome.

use crate::config::TransferConfig;
use crate::logging::sanitize_message;
use crate::model::graph::InventoryGraph;
use crate::model::record::{now_epoch_ms, RecordKind};
use crate::model::transfer::{
    HoldingTransferResponse, Institution, ItemTransferResponse, TransferRequest,
    TransferResponse,
};
use crate::repo::audit_repo::{AuditResult, AuditSink, ReportEntry, ReportField};
use crate::repo::inventory_repo::{InventoryStore, StoreResult};
use crate::search::index::{DocumentRef, SearchIndex};
use crate::transfer::index_sync::IndexSynchronizer;
use crate::transfer::outcome::{TransferKind, TransferMessage, TransferState, ValidationOutcome};
use crate::transfer::reconcile::OrphanReconciler;
use crate::transfer::record::{bibs_reachable_from, ChangeRecorder, IndexPlan, TransferChange};
use crate::transfer::relink::{GraphRelinker, HoldingsMove, ItemMove};
use crate::transfer::resolve::DestinationResolver;
use crate::transfer::validate::{HoldingTransferPlan, ItemTransferPlan, RequestValidator};
use crate::transfer::TransferFailure;
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

/// Report header names.
pub const HEADER_REQUEST_ID: &str = "RequestId";
pub const HEADER_TRANSFER_TYPE: &str = "TransferType";
pub const HEADER_INSTITUTION: &str = "Institution";
pub const HEADER_REQUEST: &str = "Request";
pub const HEADER_RESPONSE: &str = "Response";

const MAX_LOGGED_ERROR_CHARS: usize = 240;

/// Batch transfer service over an inventory store, a search index and an
/// audit sink.
pub struct TransferService<S: InventoryStore, I: SearchIndex, A: AuditSink> {
    store: S,
    index: I,
    audit: A,
    config: TransferConfig,
}

/// Result of one request before it is shaped into a response.
struct RequestOutcome {
    message: TransferMessage,
    valid: bool,
}

impl<S: InventoryStore, I: SearchIndex, A: AuditSink> TransferService<S, I, A> {
    pub fn new(store: S, index: I, audit: A, config: TransferConfig) -> Self {
        Self {
            store,
            index,
            audit,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Runs item transfers, then holdings transfers.
    pub fn process(
        &self,
        request: &TransferRequest,
        institution: &Institution,
    ) -> TransferResponse {
        TransferResponse {
            item_transfer_responses: self.process_item_transfers(request, institution),
            holding_transfer_responses: self.process_holding_transfers(request, institution),
        }
    }

    /// Processes `request.item_transfers` in order.
    pub fn process_item_transfers(
        &self,
        request: &TransferRequest,
        institution: &Institution,
    ) -> Vec<ItemTransferResponse> {
        request
            .item_transfers
            .iter()
            .map(|item_request| {
                let outcome = self.run_request(
                    TransferKind::Item,
                    item_request,
                    institution,
                    |validator, graph| validator.validate_item_transfer(graph, item_request),
                    |graph, plan, now| self.relink_item(graph, plan, institution, now),
                );
                ItemTransferResponse {
                    message: outcome.message.to_string(),
                    request: item_request.clone(),
                    valid: outcome.valid,
                }
            })
            .collect()
    }

    /// Processes `request.holding_transfers` in order.
    pub fn process_holding_transfers(
        &self,
        request: &TransferRequest,
        institution: &Institution,
    ) -> Vec<HoldingTransferResponse> {
        request
            .holding_transfers
            .iter()
            .map(|holding_request| {
                let outcome = self.run_request(
                    TransferKind::Holdings,
                    holding_request,
                    institution,
                    |validator, graph| {
                        validator.validate_holding_transfer(graph, holding_request)
                    },
                    |graph, plan, now| self.relink_holdings(graph, plan, institution, now),
                );
                HoldingTransferResponse {
                    message: outcome.message.to_string(),
                    request: holding_request.clone(),
                    valid: outcome.valid,
                }
            })
            .collect()
    }

    fn run_request<R, P, V, E>(
        &self,
        kind: TransferKind,
        request: &R,
        institution: &Institution,
        validate: V,
        execute: E,
    ) -> RequestOutcome
    where
        R: Serialize,
        V: FnOnce(
            &RequestValidator<'_, S>,
            &mut InventoryGraph,
        ) -> StoreResult<ValidationOutcome<P>>,
        E: FnOnce(&mut InventoryGraph, &P, i64) -> Result<IndexPlan, TransferFailure>,
    {
        let request_id = Uuid::new_v4();
        log_state(request_id, kind, TransferState::Received);

        let mut graph = InventoryGraph::new();
        let validator = RequestValidator::new(&self.store, institution.id);
        let outcome = match validate(&validator, &mut graph) {
            Err(err) => {
                error!(
                    "event=transfer_request module=transfer status={} request_id={request_id} transfer_type={kind} stage=validate error={}",
                    TransferState::Failed.as_str(),
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
                RequestOutcome {
                    message: TransferMessage::RelinkedFailed,
                    valid: false,
                }
            }
            Ok(ValidationOutcome::Invalid(reason)) => {
                info!(
                    "event=transfer_request module=transfer status={} request_id={request_id} transfer_type={kind} reason={reason}",
                    TransferState::Rejected.as_str()
                );
                RequestOutcome {
                    message: TransferMessage::Rejected(reason),
                    valid: false,
                }
            }
            Ok(ValidationOutcome::Valid(plan)) => {
                log_state(request_id, kind, TransferState::Validated);
                let now = now_epoch_ms();
                let result = self.in_transaction(request_id, || execute(&mut graph, &plan, now));
                RequestOutcome {
                    message: self.finish(request_id, kind, result),
                    valid: true,
                }
            }
        };

        let report = self.write_report(request_id, kind, request, institution, outcome.message);
        if let Err(err) = report {
            warn!(
                "event=transfer_report module=transfer status=error request_id={request_id} transfer_type={kind} error={}",
                sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
            );
        }
        outcome
    }

    /// Runs `work` between begin and commit; rolls back on any failure.
    fn in_transaction<F>(&self, request_id: Uuid, work: F) -> Result<IndexPlan, TransferFailure>
    where
        F: FnOnce() -> Result<IndexPlan, TransferFailure>,
    {
        self.store.begin()?;
        let result = work().and_then(|plan| {
            self.store.commit()?;
            Ok(plan)
        });
        if result.is_err() {
            if let Err(err) = self.store.rollback() {
                error!(
                    "event=transfer_rollback module=transfer status=error request_id={request_id} error={}",
                    sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
            }
        }
        result
    }

    fn finish(
        &self,
        request_id: Uuid,
        kind: TransferKind,
        result: Result<IndexPlan, TransferFailure>,
    ) -> TransferMessage {
        match result {
            Ok(plan) => {
                if self.config.sync_index {
                    let report = IndexSynchronizer::new(&self.index).synchronize(&plan);
                    if !report.is_clean() {
                        warn!(
                            "event=index_sync module=transfer status=partial request_id={request_id} deleted={} reindexed={} failed={}",
                            report.deleted.len(),
                            report.reindexed.len(),
                            report.failures.len()
                        );
                    }
                }
                log_state(request_id, kind, TransferState::Relinked);
                TransferMessage::SuccessfullyRelinked
            }
            Err(failure) => {
                error!(
                    "event=transfer_request module=transfer status={} request_id={request_id} transfer_type={kind} stage=relink error={}",
                    TransferState::Failed.as_str(),
                    sanitize_message(&failure.to_string(), MAX_LOGGED_ERROR_CHARS)
                );
                TransferMessage::RelinkedFailed
            }
        }
    }

    fn relink_item(
        &self,
        graph: &mut InventoryGraph,
        plan: &ItemTransferPlan,
        institution: &Institution,
        now: i64,
    ) -> Result<IndexPlan, TransferFailure> {
        let actor = self.config.actor.as_str();
        let resolver = DestinationResolver::new(institution.id, actor, now);
        let destination_bib = resolver.resolve_bib(graph, &plan.destination_bib)?;
        let destination_holdings = resolver.resolve_holdings(graph, &plan.destination_holdings)?;

        let moved = DocumentRef::new(RecordKind::Item, plan.item);
        let prior_bibs = bibs_reachable_from(graph, moved)?;

        GraphRelinker::new(actor, now).transfer_item(
            graph,
            &ItemMove {
                source_bib: plan.source_bib,
                source_holdings: plan.source_holdings,
                item: plan.item,
                destination_bib,
                destination_holdings,
            },
        )?;

        let reconciler = OrphanReconciler::new(actor, now);
        reconciler.reconcile(graph, plan.source_bib)?;
        reconciler.reconcile(graph, destination_bib)?;

        ChangeRecorder::new(&self.store, &self.audit, actor, now).record(
            graph,
            &TransferChange {
                kind: TransferKind::Item,
                moved,
                source_bib: plan.source_bib,
                source_holdings: plan.source_holdings,
                destination_bib,
                destination_holdings,
                prior_bibs,
            },
        )
    }

    fn relink_holdings(
        &self,
        graph: &mut InventoryGraph,
        plan: &HoldingTransferPlan,
        institution: &Institution,
        now: i64,
    ) -> Result<IndexPlan, TransferFailure> {
        let actor = self.config.actor.as_str();
        let destination_bib = DestinationResolver::new(institution.id, actor, now)
            .resolve_bib(graph, &plan.destination_bib)?;

        let moved = DocumentRef::new(RecordKind::Holdings, plan.holdings);
        let prior_bibs = bibs_reachable_from(graph, moved)?;

        GraphRelinker::new(actor, now).transfer_holdings(
            graph,
            &HoldingsMove {
                source_bib: plan.source_bib,
                holdings: plan.holdings,
                destination_bib,
            },
        )?;

        let reconciler = OrphanReconciler::new(actor, now);
        reconciler.reconcile(graph, plan.source_bib)?;
        reconciler.reconcile(graph, destination_bib)?;

        ChangeRecorder::new(&self.store, &self.audit, actor, now).record(
            graph,
            &TransferChange {
                kind: TransferKind::Holdings,
                moved,
                source_bib: plan.source_bib,
                source_holdings: plan.holdings,
                destination_bib,
                destination_holdings: plan.holdings,
                prior_bibs,
            },
        )
    }

    fn write_report<R: Serialize>(
        &self,
        request_id: Uuid,
        kind: TransferKind,
        request: &R,
        institution: &Institution,
        message: TransferMessage,
    ) -> AuditResult<i64> {
        let request_json = serde_json::to_string(request)?;
        self.audit.append_report(&ReportEntry {
            file_name: self.config.report_file_name.clone(),
            report_type: self.config.report_type.clone(),
            institution: institution.code.clone(),
            created_at: now_epoch_ms(),
            fields: vec![
                ReportField::new(HEADER_REQUEST_ID, request_id.to_string()),
                ReportField::new(HEADER_TRANSFER_TYPE, kind.as_str()),
                ReportField::new(HEADER_INSTITUTION, institution.code.as_str()),
                ReportField::new(HEADER_REQUEST, request_json),
                ReportField::new(HEADER_RESPONSE, message.as_str()),
            ],
        })
    }
}

fn log_state(request_id: Uuid, kind: TransferKind, state: TransferState) {
    info!(
        "event=transfer_request module=transfer status={} request_id={request_id} transfer_type={kind}",
        state.as_str()
    );
}
