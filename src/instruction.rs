//! Parsed machine instructions
//!
//! An [`Instruction`] is the machine state at the end of one source line.
//! Instructions are produced by the tracker and read-only for callers;
//! only the analysis pass writes the two timing fields.

use glam::DVec3;
use serde::Serialize;

use crate::parser::{self, LineKind};

/// Coordinate addressing mode selected by `G90`/`G91`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MovementMode {
    #[default]
    Absolute,
    Relative,
}

/// One line of G-code with the machine state it leaves behind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    raw_text: String,
    kind: LineKind,
    position: DVec3,
    extrusion_position: f64,
    feed_rate: f64,
    tool_index: usize,
    movement_mode: MovementMode,
    seconds_this_line: f64,
    seconds_to_end_from_here: f64,
}

impl Instruction {
    /// Machine state before the first line: at the origin, absolute mode,
    /// no feed rate
    pub(crate) fn origin() -> Self {
        Self {
            raw_text: String::new(),
            kind: LineKind::Empty,
            position: DVec3::ZERO,
            extrusion_position: 0.0,
            feed_rate: 0.0,
            tool_index: 0,
            movement_mode: MovementMode::Absolute,
            seconds_this_line: 0.0,
            seconds_to_end_from_here: 0.0,
        }
    }

    /// A line that moves nothing but keeps the sticky state of `previous`
    ///
    /// Used when inserting lines such as comments or `M` codes into an
    /// in-memory document. Parameters are not applied: motion text such as
    /// `G1 X100` is stored verbatim but the instruction stays at the
    /// previous position, so it counts as a zero-length move.
    pub fn inherit(previous: &Instruction, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let (_, kind) = parser::parse_line(&raw_text);
        Self {
            raw_text,
            kind,
            seconds_this_line: 0.0,
            seconds_to_end_from_here: 0.0,
            ..previous.clone()
        }
    }

    /// Carry-forward copy used by the tracker for the next line
    pub(crate) fn next_line(&self, raw_text: String, kind: LineKind) -> Self {
        Self {
            raw_text,
            kind,
            seconds_this_line: 0.0,
            seconds_to_end_from_here: 0.0,
            ..self.clone()
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// Absolute position at the end of this line
    pub fn position(&self) -> DVec3 {
        self.position
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn z(&self) -> f64 {
        self.position.z
    }

    /// Absolute filament position, continuous across `G92` resets
    pub fn extrusion_position(&self) -> f64 {
        self.extrusion_position
    }

    /// Sticky feed rate in mm/min
    pub fn feed_rate(&self) -> f64 {
        self.feed_rate
    }

    pub fn tool_index(&self) -> usize {
        self.tool_index
    }

    pub fn movement_mode(&self) -> MovementMode {
        self.movement_mode
    }

    /// Estimated seconds to execute this line
    pub fn seconds_this_line(&self) -> f64 {
        self.seconds_this_line
    }

    /// Estimated seconds from this line to the end of the print
    pub fn seconds_to_end_from_here(&self) -> f64 {
        self.seconds_to_end_from_here
    }

    pub(crate) fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    pub(crate) fn set_extrusion_position(&mut self, e: f64) {
        self.extrusion_position = e;
    }

    pub(crate) fn set_feed_rate(&mut self, feed_rate: f64) {
        self.feed_rate = feed_rate;
    }

    pub(crate) fn set_tool_index(&mut self, tool_index: usize) {
        self.tool_index = tool_index;
    }

    pub(crate) fn set_movement_mode(&mut self, mode: MovementMode) {
        self.movement_mode = mode;
    }

    pub(crate) fn set_seconds_this_line(&mut self, seconds: f64) {
        self.seconds_this_line = seconds;
    }

    pub(crate) fn set_seconds_to_end_from_here(&mut self, seconds: f64) {
        self.seconds_to_end_from_here = seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_keeps_sticky_state() {
        let mut previous = Instruction::origin();
        previous.set_position(DVec3::new(1.0, 2.0, 0.3));
        previous.set_extrusion_position(4.5);
        previous.set_feed_rate(1800.0);
        previous.set_tool_index(1);
        previous.set_movement_mode(MovementMode::Relative);
        previous.set_seconds_this_line(2.0);

        let inserted = Instruction::inherit(&previous, "M117 hello");
        assert_eq!(inserted.raw_text(), "M117 hello");
        assert_eq!(inserted.kind(), LineKind::MCode(117));
        assert_eq!(inserted.position(), previous.position());
        assert_eq!(inserted.extrusion_position(), 4.5);
        assert_eq!(inserted.feed_rate(), 1800.0);
        assert_eq!(inserted.tool_index(), 1);
        assert_eq!(inserted.movement_mode(), MovementMode::Relative);
        assert_eq!(inserted.seconds_this_line(), 0.0);
    }

    #[test]
    fn test_inherit_does_not_apply_motion_text() {
        let mut previous = Instruction::origin();
        previous.set_position(DVec3::new(1.0, 2.0, 0.3));
        previous.set_extrusion_position(4.5);

        let inserted = Instruction::inherit(&previous, "G1 X100 E9");
        assert_eq!(inserted.raw_text(), "G1 X100 E9");
        assert_eq!(inserted.kind(), LineKind::LinearMove);
        assert_eq!(inserted.position(), DVec3::new(1.0, 2.0, 0.3));
        assert_eq!(inserted.extrusion_position(), 4.5);
    }
}
