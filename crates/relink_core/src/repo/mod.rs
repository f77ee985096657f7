//! Persistence collaborators of the transfer engine.
//!
//! # Responsibility
//! - Define the entity store and audit sink contracts.
//! - Isolate SQLite query details from the transfer engine.
//!
//! # Invariants
//! - Store APIs return semantic errors (`Conflict`, `NotFound`) in addition
//!   to DB transport errors.
//! - The engine only sees the traits; SQLite types never leak into it.

pub mod audit_repo;
pub mod inventory_repo;
