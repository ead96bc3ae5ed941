//! Task repository and its change-notification contract.
//!
//! # Responsibility
//! - Own the in-memory task collection and identifier allocation.
//! - Keep memory and the durable store consistent.
//!
//! # Invariants
//! - Presentation code reads snapshots and never mutates tasks directly.
//! - UI-only state (selected task, open dialogs) is not modeled here.

pub mod events;
pub mod task_repo;
