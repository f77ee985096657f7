//! Transfer/relink engine.
//!
//! # Responsibility
//! - Validate item and holdings transfer requests.
//! - Materialize destination stubs, rewire associations and reconcile
//!   logical deletion flags inside the request graph.
//! - Persist the result and plan the follow-up search index work.
//!
//! # Invariants
//! - Validation rejections are [`outcome::ValidationOutcome::Invalid`]
//!   values; only execution problems surface as [`TransferFailure`].
//! - Nothing in this module opens or closes transactions. The orchestrator
//!   owns that boundary.
//!
//! # See also
//! - `service::transfer_service` for the per-request pipeline.

use crate::model::graph::GraphError;
use crate::repo::audit_repo::AuditError;
use crate::repo::inventory_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod index_sync;
pub mod outcome;
pub mod reconcile;
pub mod record;
pub mod relink;
pub mod resolve;
pub mod validate;

/// Error of the transactional phase of one request.
#[derive(Debug)]
pub enum TransferFailure {
    Store(StoreError),
    Graph(GraphError),
    Audit(AuditError),
}

impl Display for TransferFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store failure: {err}"),
            Self::Graph(err) => write!(f, "relink failure: {err}"),
            Self::Audit(err) => write!(f, "change log failure: {err}"),
        }
    }
}

impl Error for TransferFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Audit(err) => Some(err),
        }
    }
}

impl From<StoreError> for TransferFailure {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<GraphError> for TransferFailure {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

impl From<AuditError> for TransferFailure {
    fn from(value: AuditError) -> Self {
        Self::Audit(value)
    }
}
