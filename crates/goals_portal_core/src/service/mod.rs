//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into the portal's page-level workflows.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod record_controller;
