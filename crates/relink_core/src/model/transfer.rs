//! Transfer request and response payloads.
//!
//! Field names serialize in camelCase to match the batch API contract
//! (`itemTransfers`, `owningInstitutionBibId`, ...). `source` and
//! `destination` are optional so an incomplete request can still be parsed
//! and rejected with a reason code instead of a decode error.

use crate::model::record::InstitutionId;
use serde::{Deserialize, Serialize};

/// Acting institution for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    /// Scopes every `(institution, local id)` lookup.
    pub id: InstitutionId,
    /// Label written to audit reports.
    pub code: String,
}

impl Institution {
    pub fn new(id: InstitutionId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}

/// One batch of transfer requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferRequest {
    pub item_transfers: Vec<ItemTransferRequest>,
    pub holding_transfers: Vec<HoldingsTransferRequest>,
}

/// Bib/holdings/item coordinates of one side of an item transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemLocation {
    pub owning_institution_bib_id: Option<String>,
    pub owning_institution_holdings_id: Option<String>,
    pub owning_institution_item_id: Option<String>,
}

impl ItemLocation {
    pub fn new(bib_id: &str, holdings_id: &str, item_id: &str) -> Self {
        Self {
            owning_institution_bib_id: Some(bib_id.to_string()),
            owning_institution_holdings_id: Some(holdings_id.to_string()),
            owning_institution_item_id: Some(item_id.to_string()),
        }
    }
}

/// Moves one item to another bib/holdings pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemTransferRequest {
    pub source: Option<ItemLocation>,
    pub destination: Option<ItemLocation>,
}

impl ItemTransferRequest {
    pub fn new(source: ItemLocation, destination: ItemLocation) -> Self {
        Self {
            source: Some(source),
            destination: Some(destination),
        }
    }
}

/// Bib/holdings coordinates of one side of a holdings transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoldingsLocation {
    pub owning_institution_bib_id: Option<String>,
    pub owning_institution_holdings_id: Option<String>,
}

impl HoldingsLocation {
    pub fn new(bib_id: &str, holdings_id: &str) -> Self {
        Self {
            owning_institution_bib_id: Some(bib_id.to_string()),
            owning_institution_holdings_id: Some(holdings_id.to_string()),
        }
    }
}

/// Moves a whole holdings (with its items) under another bib.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoldingsTransferRequest {
    pub source: Option<HoldingsLocation>,
    pub destination: Option<HoldingsLocation>,
}

impl HoldingsTransferRequest {
    pub fn new(source: HoldingsLocation, destination: HoldingsLocation) -> Self {
        Self {
            source: Some(source),
            destination: Some(destination),
        }
    }
}

/// Per-request result of an item transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTransferResponse {
    pub message: String,
    pub request: ItemTransferRequest,
    pub valid: bool,
}

/// Per-request result of a holdings transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingTransferResponse {
    pub message: String,
    pub request: HoldingsTransferRequest,
    pub valid: bool,
}

/// Responses for a whole batch, each list in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub item_transfer_responses: Vec<ItemTransferResponse>,
    pub holding_transfer_responses: Vec<HoldingTransferResponse>,
}

/// Returns the value, untouched, when it is present and not blank.
///
/// Ids are compared, looked up and stored exactly as sent; whitespace only
/// decides blankness.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}
