//! # herald-memory
//!
//! The per-role message log. A [`Memory`] is owned by exactly one role and
//! keeps every message the role perceived or produced, indexed by the action
//! that caused it so a role can pull "the latest parsed requirement" or "all
//! user requirements" without scanning.

pub mod memory;

pub use memory::Memory;
