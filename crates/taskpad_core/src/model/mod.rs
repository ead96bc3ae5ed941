//! Domain model for the task list.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every task is identified by a repository-allocated `TaskId`.
//! - Deletion is a hard removal; ids are still never reused.

pub mod task;
