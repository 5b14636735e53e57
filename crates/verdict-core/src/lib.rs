//! # verdict-core
//!
//! Core types and error types shared by every verdict crate.
//!
//! This crate provides:
//! - Module, entity, severity, and issue-type enums used by the validators
//! - Status enums with state machine transitions for analysis sets
//! - Persisted entity structs (`AnalysisRecord`, `AnalysisSet`)
//! - The JSONL validation event envelope
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod events;
