//! G-code documents
//!
//! Two variants answer the same read contract:
//! - [`MemoryDocument`] holds every instruction and answers whole-file
//!   aggregate queries.
//! - [`StreamedDocument`] reads forward through a fixed ring buffer and
//!   only answers per-line queries.
//!
//! Aggregate queries live on the separate [`AggregateQueries`] trait, so
//! code that needs them can require it at compile time. Through a
//! `dyn GcodeDocument` the capability is checked at runtime with
//! [`GcodeDocument::aggregates`].

pub mod memory;
pub mod streamed;

use std::path::Path;

use glam::DVec2;

use crate::analysis::Aabb;
use crate::config::DocumentOptions;
use crate::error::{DocumentError, Result};
use crate::instruction::Instruction;

pub use memory::{MemoryDocument, ToolChange};
pub use streamed::StreamedDocument;

/// Per-line queries every document answers
pub trait GcodeDocument {
    /// The instruction at `index`
    ///
    /// Streamed documents may read forward to reach it.
    fn instruction(&mut self, index: usize) -> Result<&Instruction>;

    /// Number of lines, or an estimate while a stream is unfinished
    fn line_count(&self) -> usize;

    /// Progress through the document in percent
    fn percent_complete(&self, index: usize) -> f64;

    /// Whether [`GcodeDocument::aggregates`] succeeds
    fn supports_aggregates(&self) -> bool {
        false
    }

    /// Whole-file queries, if this document can answer them
    fn aggregates(&self) -> Result<&dyn AggregateQueries> {
        Err(DocumentError::UnsupportedOperation {
            operation: "aggregate queries",
        })
    }
}

/// Whole-file queries; only in-memory documents implement these
pub trait AggregateQueries {
    fn layer_count(&self) -> usize;

    /// Layer containing the instruction, `None` when out of range
    fn layer_index(&self, instruction_index: usize) -> Option<usize>;

    /// How far through its layer the instruction is, in `[0, 1]`
    fn ratio_into_contained_layer(&self, instruction_index: usize) -> f64;

    /// Share of the layer's estimated time spent before the instruction
    fn ratio_into_contained_layer_seconds(&self, instruction_index: usize) -> f64;

    fn bounds(&self) -> Aabb;

    fn weighted_center(&self) -> DVec2;

    fn filament_used_mm(&self, diameter_mm: f64) -> f64;

    fn filament_cubic_mm(&self, diameter_mm: f64) -> f64;

    fn filament_weight_grams(&self, diameter_mm: f64, density_g_per_cm3: f64) -> f64;

    fn layer_height(&self) -> f64;

    fn first_layer_height(&self) -> f64;

    /// Estimated print duration in seconds
    fn total_seconds(&self) -> f64;
}

/// Open a file with the variant its size calls for
pub fn open(path: impl AsRef<Path>, options: &DocumentOptions) -> Result<Box<dyn GcodeDocument>> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)?.len();

    if options.force_streaming || size > options.stream_threshold_bytes {
        log::debug!("streaming {:?} ({} bytes)", path, size);
        Ok(Box::new(StreamedDocument::open(path, options)?))
    } else {
        log::debug!("loading {:?} into memory ({} bytes)", path, size);
        Ok(Box::new(MemoryDocument::load(path, options)?))
    }
}
