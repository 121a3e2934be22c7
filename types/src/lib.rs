//! Core domain types for Vigil.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: analyzers, the engine, and hosts.

mod diagnostic;
mod entity;
mod ids;
mod language;

pub use diagnostic::{Diagnostic, Position, Severity, SeverityParseError, Span};
pub use entity::{CodeEntity, EntityKind};
pub use ids::{AnalyzerId, EntityId, VersionStamp};
pub use language::LanguageTag;
