//! Domain model for roster pairs and part records.
//!
//! # Responsibility
//! - Define the canonical data structures shared by store, controller and
//!   export code.
//!
//! # Invariants
//! - A part record is identified by `(pair_id, part_name)`.
//! - Goal slots are addressed by integer index, never by synthesized names.

pub mod part;
pub mod roster;
