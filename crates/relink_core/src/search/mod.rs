//! Search index collaborator.
//!
//! # Responsibility
//! - Keep per-record search documents in step with committed transfers.
//! - Expose keyword lookup over those documents.

pub mod index;
