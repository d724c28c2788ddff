//! G-code Document
//!
//! Parses 3D-printer G-code into per-line machine state snapshots.
//!
//! This library provides:
//! - Line-level parsing with numbered and checksummed line support
//! - An in-memory document with layer, bounds, filament and timing queries
//! - A bounded-memory streaming document for very large files
//! - Configuration management for the `gcode-info` tool

pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod instruction;
pub mod parser;
pub(crate) mod tracker;

// Re-exports for the public API
pub use analysis::Aabb;
pub use config::{Config, DocumentOptions, FilamentSettings};
pub use document::{
    open, AggregateQueries, GcodeDocument, MemoryDocument, StreamedDocument, ToolChange,
};
pub use error::{DocumentError, Result};
pub use instruction::{Instruction, MovementMode};
pub use parser::{parse_line, LineKind};
