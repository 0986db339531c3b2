//! Flutter-facing bridge crate for the goals portal.

pub mod api;
