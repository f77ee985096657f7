//! Inventory domain model.
//!
//! # Responsibility
//! - Define bibliographic, holdings and item records and their associations.
//! - Define the batch transfer request/response payloads.
//!
//! # Invariants
//! - Associations are held as id lists on both sides and only change through
//!   [`graph::InventoryGraph`] link operations.
//! - Deletion is a logical tombstone, never a physical removal.

pub mod graph;
pub mod record;
pub mod transfer;
