//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate the transfer engine over injected store, index and audit
//!   collaborators.
//! - Keep entry-point layers decoupled from storage details.

pub mod transfer_service;
