//! Outcome vocabulary of the transfer engine.
//!
//! Rejections are values, not errors: every validation path ends in exactly
//! one [`ReasonCode`]. The code text is what callers see as the response
//! message.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Fixed enumeration of validation rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    SourceEmpty,
    DestinationEmpty,
    SourceDestinationItemIdsNotMatching,
    SourceDestinationHoldingsIdsNotMatching,
    SourceBibIdEmpty,
    SourceHoldingsIdEmpty,
    SourceItemIdEmpty,
    SourceBibNotExist,
    SourceHoldingNotUnderSourceBib,
    SourceItemNotUnderSourceHolding,
    SourceItemDeaccessioned,
    SourceHoldingDeaccessioned,
    DestOwnInstBibIdEmpty,
    DestOwnInstHoldingsIdEmpty,
    DestOwnInstItemIdEmpty,
    DestHoldingsAttachedWithDiffBib,
    DestHoldingDeaccessioned,
    DestBibDeaccessioned,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceEmpty => "SOURCE_EMPTY",
            Self::DestinationEmpty => "DESTINATION_EMPTY",
            Self::SourceDestinationItemIdsNotMatching => {
                "SOURCE_DESTINATION_ITEM_IDS_NOT_MATCHING"
            }
            Self::SourceDestinationHoldingsIdsNotMatching => {
                "SOURCE_DESTINATION_HOLDINGS_IDS_NOT_MATCHING"
            }
            Self::SourceBibIdEmpty => "SOURCE_BIB_ID_EMPTY",
            Self::SourceHoldingsIdEmpty => "SOURCE_HOLDINGS_ID_EMPTY",
            Self::SourceItemIdEmpty => "SOURCE_ITEM_ID_EMPTY",
            Self::SourceBibNotExist => "SOURCE_BIB_NOT_EXIST",
            Self::SourceHoldingNotUnderSourceBib => "SOURCE_HOLDING_NOT_UNDER_SOURCE_BIB",
            Self::SourceItemNotUnderSourceHolding => "SOURCE_ITEM_NOT_UNDER_SOURCE_HOLDING",
            Self::SourceItemDeaccessioned => "SOURCE_ITEM_DEACCESSIONED",
            Self::SourceHoldingDeaccessioned => "SOURCE_HOLDING_DEACCESSIONED",
            Self::DestOwnInstBibIdEmpty => "DEST_OWN_INST_BIB_ID_EMPTY",
            Self::DestOwnInstHoldingsIdEmpty => "DEST_OWN_INST_HOLDINGS_ID_EMPTY",
            Self::DestOwnInstItemIdEmpty => "DEST_OWN_INST_ITEM_ID_EMPTY",
            Self::DestHoldingsAttachedWithDiffBib => "DEST_HOLDINGS_ATTACHED_WITH_DIFF_BIB",
            Self::DestHoldingDeaccessioned => "DEST_HOLDING_DEACCESSIONED",
            Self::DestBibDeaccessioned => "DEST_BIB_DEACCESSIONED",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible result message of one transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMessage {
    SuccessfullyRelinked,
    /// The transactional phase failed and was rolled back.
    RelinkedFailed,
    Rejected(ReasonCode),
}

impl TransferMessage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuccessfullyRelinked => "SUCCESSFULLY_RELINKED",
            Self::RelinkedFailed => "RELINKED_FAILED",
            Self::Rejected(reason) => reason.as_str(),
        }
    }
}

impl Display for TransferMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validator verdict: a resolved plan, or one rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome<T> {
    Valid(T),
    Invalid(ReasonCode),
}

impl<T> ValidationOutcome<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }
}

/// Per-request lifecycle: `Received -> Validated -> Rejected | Relinked | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Received,
    Validated,
    Rejected,
    Relinked,
    Failed,
}

impl TransferState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
            Self::Relinked => "relinked",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Relinked | Self::Failed)
    }
}

/// Transfer flavour, used as the report `TransferType` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Item,
    Holdings,
}

impl TransferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Item => "ItemTransfer",
            Self::Holdings => "HoldingsTransfer",
        }
    }
}

impl Display for TransferKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
