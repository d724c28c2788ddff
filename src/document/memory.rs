//! In-memory G-code document
//!
//! Parses the whole file into an indexable instruction list, builds the
//! layer index while parsing, then runs the timing pass. Aggregate results
//! are cached per document instance.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

use glam::DVec2;
use serde::Serialize;

use super::{AggregateQueries, GcodeDocument};
use crate::analysis::{self, Aabb};
use crate::config::DocumentOptions;
use crate::error::{DocumentError, Result};
use crate::instruction::Instruction;
use crate::parser::{self, line, LineKind};
use crate::tracker::KinematicTracker;

const DEFAULT_FILAMENT_DIAMETER: f64 = 1.75;
const DIAMETER_MARKERS: [&str; 2] = ["filamentDiameter = ", "; filament_diameter = "];
const DIAMETER_SCAN_LINES: usize = 100;
/// Comment MatterSlice writes after the last printing move
const PRINT_END_MARKER: &str = "; MatterSlice Completed Successfully";

/// The next point where the active tool changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToolChange {
    /// Instruction that selects the new tool
    pub index: usize,
    pub tool_index: usize,
    /// Estimated seconds from the queried instruction to the change
    pub seconds_until: f64,
}

#[derive(Debug, Clone, Copy)]
struct FilamentCache {
    diameter: f64,
    used_mm: f64,
}

/// A fully parsed G-code file
#[derive(Debug)]
pub struct MemoryDocument {
    instructions: Vec<Instruction>,
    layer_starts: Vec<usize>,
    has_explicit_layers: bool,
    layer_thickness: Option<f64>,
    first_layer_thickness: Option<f64>,
    layer_heights: Vec<f64>,
    tool_changes: Vec<usize>,
    /// Distinct feed rates of extruding XY moves, ascending
    speeds: Vec<f64>,
    print_end: Option<usize>,
    options: DocumentOptions,
    filament_cache: Mutex<Option<FilamentCache>>,
    diameter_cache: OnceLock<f64>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// An empty document with default options
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    pub fn with_options(options: DocumentOptions) -> Self {
        Self {
            instructions: Vec::new(),
            layer_starts: Vec::new(),
            has_explicit_layers: false,
            layer_thickness: None,
            first_layer_thickness: None,
            layer_heights: Vec::new(),
            tool_changes: Vec::new(),
            speeds: Vec::new(),
            print_end: None,
            options,
            filament_cache: Mutex::new(None),
            diameter_cache: OnceLock::new(),
        }
    }

    /// Parse G-code text and analyze it
    pub fn parse(text: &str, options: &DocumentOptions) -> Result<Self> {
        let started = Instant::now();
        let mut doc = Self::with_options(options.clone());

        doc.has_explicit_layers = parser::has_explicit_layers(text);
        if doc.has_explicit_layers {
            // Start code before the first marker belongs to layer 0
            doc.layer_starts.push(0);
        }

        let mut tracker = KinematicTracker::new(options.strict);
        let mut seen_first_marker = false;
        let mut last_move_z: Option<f64> = None;

        for raw in text.lines() {
            let instruction = tracker.process(raw)?;
            let index = doc.instructions.len();

            match instruction.kind() {
                LineKind::Comment => {
                    let body = parser::line_without_checksum(instruction.raw_text());
                    doc.read_comment(body, index, &mut seen_first_marker);
                }
                LineKind::LinearMove if !doc.has_explicit_layers => {
                    let z = instruction.z();
                    if last_move_z != Some(z) {
                        doc.layer_starts.push(index);
                    }
                    last_move_z = Some(z);
                }
                _ => {}
            }

            doc.instructions.push(instruction);
        }

        if doc.layer_starts.is_empty() && !doc.instructions.is_empty() {
            doc.layer_starts.push(0);
        }
        doc.rebuild_derived();
        doc.analyze_timing();

        log::debug!(
            "parsed {} lines into {} layers ({} layer info) in {:?}",
            doc.instructions.len(),
            doc.layer_starts.len(),
            if doc.has_explicit_layers { "explicit" } else { "implicit" },
            started.elapsed()
        );

        Ok(doc)
    }

    /// Read and parse a file
    pub fn load(path: impl AsRef<Path>, options: &DocumentOptions) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&text, options)
    }

    fn read_comment(&mut self, body: &str, index: usize, seen_first_marker: &mut bool) {
        if self.print_end.is_none() && body == PRINT_END_MARKER {
            self.print_end = Some(index);
        } else if self.has_explicit_layers && line::layer_marker(body).is_some() {
            if *seen_first_marker {
                self.layer_starts.push(index);
            } else {
                *seen_first_marker = true;
            }
        } else if body.starts_with(line::LAYER_THICKNESS_MARKER) {
            self.layer_thickness = settings_value(line::LAYER_THICKNESS_MARKER, body);
        } else if body.starts_with(line::FIRST_LAYER_THICKNESS_MARKER) {
            self.first_layer_thickness = settings_value(line::FIRST_LAYER_THICKNESS_MARKER, body);
        } else if body.starts_with(line::LAYER_HEIGHT_MARKER) {
            if let Some(height) = settings_value(line::LAYER_HEIGHT_MARKER, body) {
                self.layer_heights.push(height);
            }
        }
    }

    /// Recompute per-line and remaining seconds
    ///
    /// Idempotent; call again after editing the document.
    pub fn analyze_timing(&mut self) {
        analysis::analyze_timing(&mut self.instructions, self.options.parallel_chunk_size);
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn line_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Result<&Instruction> {
        self.instructions
            .get(index)
            .ok_or(DocumentError::IndexOutOfRange {
                index,
                len: self.instructions.len(),
            })
    }

    /// Whether the file carried layer-change comments
    pub fn has_explicit_layers(&self) -> bool {
        self.has_explicit_layers
    }

    /// First instruction index of every layer, ascending
    pub fn layer_starts(&self) -> &[usize] {
        &self.layer_starts
    }

    pub fn layer_count(&self) -> usize {
        self.layer_starts.len()
    }

    /// First instruction of a layer, or the last instruction past the end
    ///
    /// Layer 0 always starts at instruction 0, matching [`MemoryDocument::layer_index`].
    pub fn instruction_index_at_layer(&self, layer: usize) -> usize {
        if layer == 0 && !self.layer_starts.is_empty() {
            return 0;
        }
        self.layer_starts
            .get(layer)
            .copied()
            .unwrap_or_else(|| self.instructions.len().saturating_sub(1))
    }

    /// Layer containing the instruction
    ///
    /// Instructions before the first recorded boundary count as layer 0.
    pub fn layer_index(&self, instruction_index: usize) -> Option<usize> {
        if instruction_index >= self.instructions.len() || self.layer_starts.is_empty() {
            return None;
        }
        let after = self
            .layer_starts
            .partition_point(|&start| start <= instruction_index);
        Some(after.saturating_sub(1))
    }

    fn layer_range(&self, layer: usize) -> Range<usize> {
        let start = if layer == 0 { 0 } else { self.layer_starts[layer] };
        let end = self
            .layer_starts
            .get(layer + 1)
            .copied()
            .unwrap_or(self.instructions.len());
        start..end
    }

    pub fn ratio_into_contained_layer(&self, instruction_index: usize) -> f64 {
        let Some(layer) = self.layer_index(instruction_index) else {
            return 1.0;
        };
        let range = self.layer_range(layer);
        let length = range.end - range.start;
        if length == 0 {
            return 1.0;
        }
        (instruction_index - range.start) as f64 / length as f64
    }

    /// Share of the containing layer's estimated time already spent
    ///
    /// The last layer ends at the slicer's completion comment when there is
    /// one, so end code does not stretch it. Returns 1.0 out of range or
    /// when the layer takes no time.
    pub fn ratio_into_contained_layer_seconds(&self, instruction_index: usize) -> f64 {
        let Some(layer) = self.layer_index(instruction_index) else {
            return 1.0;
        };
        let range = self.layer_range(layer);
        let end = if range.end < self.instructions.len() {
            range.end
        } else {
            self.print_end
                .filter(|end| range.contains(end))
                .unwrap_or(self.instructions.len() - 1)
        };

        let remaining = |index: usize| self.instructions[index].seconds_to_end_from_here();
        let length = remaining(range.start) - remaining(end);
        if length <= 0.0 {
            return 1.0;
        }
        let spent = (remaining(range.start) - remaining(instruction_index)).max(0.0);
        (spent / length).min(1.0)
    }

    /// `index / line_count` in percent, exactly 100 from the last line on
    pub fn percent_complete(&self, instruction_index: usize) -> f64 {
        let count = self.instructions.len();
        if count == 0 || instruction_index + 1 >= count {
            return 100.0;
        }
        instruction_index as f64 / count as f64 * 100.0
    }

    pub fn bounds(&self) -> Aabb {
        analysis::bounds(&self.instructions, self.options.parallel_chunk_size)
    }

    /// Mean XY over all instructions
    ///
    /// Every line weighs the same; this is not the center of mass of the
    /// printed material.
    pub fn weighted_center(&self) -> DVec2 {
        analysis::weighted_center(&self.instructions, self.options.parallel_chunk_size)
    }

    /// Net filament pushed by all `G0`/`G1` moves, in mm
    ///
    /// Extrusion deltas are summed with their sign, so a retraction and the
    /// matching prime cancel out.
    pub fn filament_used_mm(&self, diameter_mm: f64) -> f64 {
        let mut cache = self
            .filament_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = *cache {
            if cached.diameter == diameter_mm {
                return cached.used_mm;
            }
        }

        let mut last_e = 0.0;
        let mut used_mm = 0.0;
        for instruction in self.instructions.iter().filter(|i| i.kind().is_move()) {
            used_mm += instruction.extrusion_position() - last_e;
            last_e = instruction.extrusion_position();
        }

        *cache = Some(FilamentCache {
            diameter: diameter_mm,
            used_mm,
        });
        used_mm
    }

    pub fn filament_cubic_mm(&self, diameter_mm: f64) -> f64 {
        let radius = diameter_mm / 2.0;
        radius * radius * std::f64::consts::PI * self.filament_used_mm(diameter_mm)
    }

    pub fn filament_weight_grams(&self, diameter_mm: f64, density_g_per_cm3: f64) -> f64 {
        const CUBIC_MM_PER_CUBIC_CM: f64 = 1000.0;
        self.filament_cubic_mm(diameter_mm) * density_g_per_cm3 / CUBIC_MM_PER_CUBIC_CM
    }

    /// Filament diameter announced by the slicer, 1.75 if none
    pub fn filament_diameter(&self) -> f64 {
        *self.diameter_cache.get_or_init(|| {
            let count = self.instructions.len();
            let head = self.instructions.iter().take(DIAMETER_SCAN_LINES);
            let tail = self
                .instructions
                .iter()
                .skip(count.saturating_sub(DIAMETER_SCAN_LINES).max(DIAMETER_SCAN_LINES));

            head.chain(tail)
                .find_map(|i| {
                    DIAMETER_MARKERS
                        .iter()
                        .find_map(|marker| settings_value(marker, i.raw_text()))
                })
                .unwrap_or(DEFAULT_FILAMENT_DIAMETER)
        })
    }

    fn layer_z(&self, layer: usize) -> f64 {
        let range = self.layer_range(layer);
        self.instructions
            .get(range.end.saturating_sub(1))
            .map_or(0.0, Instruction::z)
    }

    /// Layer height from the slicer settings, else from layer Z values
    pub fn layer_height(&self) -> f64 {
        if let Some(thickness) = self.layer_thickness.filter(|t| *t > 0.0) {
            return thickness;
        }

        let derived = match self.layer_count() {
            0 | 1 => None,
            2 => Some(self.layer_z(1) - self.layer_z(0)),
            _ => Some(self.layer_z(2) - self.layer_z(1)),
        };
        derived
            .filter(|h| *h > 0.0)
            .unwrap_or(self.options.fallback_layer_height)
    }

    /// First layer height: settings comment, else the first layer's Z
    pub fn first_layer_height(&self) -> f64 {
        if let Some(thickness) = self.first_layer_thickness.filter(|t| *t > 0.0) {
            return thickness;
        }

        if self.layer_count() > 0 {
            let z = self.layer_z(0);
            if z > 0.0 {
                return z;
            }
        }
        self.options.fallback_layer_height
    }

    /// Height of one layer, from `; LAYER_HEIGHT:` comments when present
    pub fn layer_height_at(&self, layer: usize) -> f64 {
        if !self.layer_heights.is_empty() {
            return self.layer_heights.get(layer).copied().unwrap_or(0.0);
        }

        if layer == 0 {
            return self.first_layer_height();
        }
        if layer < self.layer_count() {
            let delta = self.layer_z(layer) - self.layer_z(layer - 1);
            if delta > 0.0 {
                return delta;
            }
        }
        self.layer_height()
    }

    /// Distance from the bed to the bottom of a layer
    pub fn layer_bottom(&self, layer: usize) -> f64 {
        (0..layer).map(|l| self.layer_height_at(l)).sum()
    }

    /// Distance from the bed to the top of a layer
    pub fn layer_top(&self, layer: usize) -> f64 {
        self.layer_bottom(layer) + self.layer_height_at(layer)
    }

    /// Whether the instruction pushes filament
    pub fn is_extruding(&self, instruction_index: usize) -> bool {
        if instruction_index == 0 || instruction_index >= self.instructions.len() {
            return false;
        }
        let current = &self.instructions[instruction_index];
        let previous = &self.instructions[instruction_index - 1];
        current.extrusion_position() > previous.extrusion_position()
    }

    /// Estimated print duration in seconds
    pub fn total_seconds(&self) -> f64 {
        self.instructions
            .first()
            .map_or(0.0, Instruction::seconds_to_end_from_here)
    }

    /// Indices where the active tool changes
    pub fn tool_changes(&self) -> &[usize] {
        &self.tool_changes
    }

    /// The first tool change after `instruction_index` to a different tool
    pub fn next_tool_change(&self, instruction_index: usize) -> Option<ToolChange> {
        let current = self.instructions.get(instruction_index)?;
        let start = self
            .tool_changes
            .partition_point(|&index| index <= instruction_index);

        self.tool_changes[start..]
            .iter()
            .copied()
            .find(|&index| self.instructions[index].tool_index() != current.tool_index())
            .map(|index| {
                let change = &self.instructions[index];
                ToolChange {
                    index,
                    tool_index: change.tool_index(),
                    seconds_until: current.seconds_to_end_from_here()
                        - change.seconds_to_end_from_here(),
                }
            })
    }

    /// Feed rates used while extruding in XY, ascending and deduplicated
    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    fn rebuild_derived(&mut self) {
        self.tool_changes.clear();
        self.speeds.clear();
        let mut current_tool = 0;
        let mut previous_e = None;
        for (index, instruction) in self.instructions.iter().enumerate() {
            if instruction.tool_index() != current_tool {
                self.tool_changes.push(index);
                current_tool = instruction.tool_index();
            }
            let extruding = previous_e.is_some_and(|e| instruction.extrusion_position() > e);
            if extruding && moves_in_xy(instruction.raw_text()) {
                self.speeds.push(instruction.feed_rate());
            }
            previous_e = Some(instruction.extrusion_position());
        }
        self.speeds.sort_by(f64::total_cmp);
        self.speeds.dedup();
    }

    fn invalidate_caches(&mut self) {
        *self
            .filament_cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.diameter_cache = OnceLock::new();
    }

    /// Append an instruction
    pub fn add(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
        if self.layer_starts.is_empty() {
            self.layer_starts.push(0);
        }
        self.rebuild_derived();
        self.invalidate_caches();
    }

    /// Insert an instruction, shifting later layer boundaries
    ///
    /// Timing is left stale until [`MemoryDocument::analyze_timing`].
    pub fn insert(&mut self, index: usize, instruction: Instruction) -> Result<()> {
        if index > self.instructions.len() {
            return Err(DocumentError::IndexOutOfRange {
                index,
                len: self.instructions.len(),
            });
        }

        self.instructions.insert(index, instruction);
        for start in self.layer_starts.iter_mut().filter(|start| **start >= index) {
            *start += 1;
        }
        if let Some(end) = self.print_end.as_mut().filter(|end| **end >= index) {
            *end += 1;
        }
        if self.layer_starts.is_empty() {
            self.layer_starts.push(0);
        }
        self.rebuild_derived();
        self.invalidate_caches();
        Ok(())
    }

    /// Remove every instruction and layer boundary
    pub fn clear(&mut self) {
        self.instructions.clear();
        self.layer_starts.clear();
        self.layer_heights.clear();
        self.tool_changes.clear();
        self.speeds.clear();
        self.print_end = None;
        self.layer_thickness = None;
        self.first_layer_thickness = None;
        self.invalidate_caches();
    }

    /// Write every line verbatim, one per line
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for instruction in &self.instructions {
            writeln!(writer, "{}", instruction.raw_text())?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn moves_in_xy(raw_text: &str) -> bool {
    let code = raw_text.split(';').next().unwrap_or_default();
    code.contains(['X', 'Y'])
}

fn settings_value(marker: &str, line: &str) -> Option<f64> {
    parser::first_number_after(marker, line, None).map(|m| m.value)
}

impl GcodeDocument for MemoryDocument {
    fn instruction(&mut self, index: usize) -> Result<&Instruction> {
        MemoryDocument::instruction(self, index)
    }

    fn line_count(&self) -> usize {
        MemoryDocument::line_count(self)
    }

    fn percent_complete(&self, index: usize) -> f64 {
        MemoryDocument::percent_complete(self, index)
    }

    fn supports_aggregates(&self) -> bool {
        true
    }

    fn aggregates(&self) -> Result<&dyn AggregateQueries> {
        Ok(self)
    }
}

impl AggregateQueries for MemoryDocument {
    fn layer_count(&self) -> usize {
        MemoryDocument::layer_count(self)
    }

    fn layer_index(&self, instruction_index: usize) -> Option<usize> {
        MemoryDocument::layer_index(self, instruction_index)
    }

    fn ratio_into_contained_layer(&self, instruction_index: usize) -> f64 {
        MemoryDocument::ratio_into_contained_layer(self, instruction_index)
    }

    fn ratio_into_contained_layer_seconds(&self, instruction_index: usize) -> f64 {
        MemoryDocument::ratio_into_contained_layer_seconds(self, instruction_index)
    }

    fn bounds(&self) -> Aabb {
        MemoryDocument::bounds(self)
    }

    fn weighted_center(&self) -> DVec2 {
        MemoryDocument::weighted_center(self)
    }

    fn filament_used_mm(&self, diameter_mm: f64) -> f64 {
        MemoryDocument::filament_used_mm(self, diameter_mm)
    }

    fn filament_cubic_mm(&self, diameter_mm: f64) -> f64 {
        MemoryDocument::filament_cubic_mm(self, diameter_mm)
    }

    fn filament_weight_grams(&self, diameter_mm: f64, density_g_per_cm3: f64) -> f64 {
        MemoryDocument::filament_weight_grams(self, diameter_mm, density_g_per_cm3)
    }

    fn layer_height(&self) -> f64 {
        MemoryDocument::layer_height(self)
    }

    fn first_layer_height(&self) -> f64 {
        MemoryDocument::first_layer_height(self)
    }

    fn total_seconds(&self) -> f64 {
        MemoryDocument::total_seconds(self)
    }
}
