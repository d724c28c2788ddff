//! Kinematic state tracking
//!
//! The tracker owns the running machine state and turns each raw line
//! into an [`Instruction`] snapshot. It stays private to the documents.

use crate::analysis;
use crate::error::{DocumentError, Result};
use crate::instruction::{Instruction, MovementMode};
use crate::parser::{self, first_number_after_default, LineKind};

/// Running absolute state carried from one line to the next
#[derive(Debug, Clone)]
pub(crate) struct KinematicTracker {
    current: Instruction,
    /// Added to absolute `E` readings so the counter survives `G92 E` resets
    e_offset: f64,
    strict: bool,
    lines_seen: usize,
}

impl KinematicTracker {
    pub fn new(strict: bool) -> Self {
        Self {
            current: Instruction::origin(),
            e_offset: 0.0,
            strict,
            lines_seen: 0,
        }
    }

    /// Number of lines processed so far
    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    /// Apply one raw line and return the resulting snapshot
    pub fn process(&mut self, raw_line: &str) -> Result<Instruction> {
        let raw = raw_line.trim();
        let line_number = self.lines_seen;
        self.lines_seen += 1;

        let (body, kind) = parser::parse_line(raw);
        let mut next = self.current.next_line(raw.to_string(), kind);

        match kind {
            LineKind::LinearMove => self.apply_move(body, &mut next),
            LineKind::SetPosition => self.apply_set_position(body, &mut next),
            LineKind::AbsoluteMode => next.set_movement_mode(MovementMode::Absolute),
            LineKind::RelativeMode => next.set_movement_mode(MovementMode::Relative),
            LineKind::ToolSelect(tool) => next.set_tool_index(tool),
            LineKind::Unrecognized(leading) => {
                if self.strict {
                    return Err(DocumentError::StrictModeViolation {
                        line_number,
                        text: raw.to_string(),
                    });
                }
                log::debug!(
                    "ignoring line {} with unrecognized leading '{}'",
                    line_number,
                    leading
                );
            }
            LineKind::OtherG(_)
            | LineKind::MCode(_)
            | LineKind::Comment
            | LineKind::HostCommand
            | LineKind::Empty => {}
        }

        if kind.is_move() {
            next.set_seconds_this_line(analysis::line_seconds(
                self.current.position(),
                next.position(),
                next.feed_rate(),
            ));
        }

        self.current = next.clone();
        Ok(next)
    }

    fn apply_move(&self, body: &str, next: &mut Instruction) {
        let relative = next.movement_mode() == MovementMode::Relative;

        let mut position = next.position();
        for (axis, marker) in ["X", "Y", "Z"].into_iter().enumerate() {
            if let Some(value) = first_number_after_default(marker, body) {
                if relative {
                    position[axis] += value;
                } else {
                    position[axis] = value;
                }
            }
        }
        next.set_position(position);

        if let Some(value) = first_number_after_default("E", body) {
            let e = if relative {
                next.extrusion_position() + value
            } else {
                value + self.e_offset
            };
            next.set_extrusion_position(e);
        }

        if let Some(feed_rate) = first_number_after_default("F", body) {
            next.set_feed_rate(feed_rate);
        }
    }

    fn apply_set_position(&mut self, body: &str, next: &mut Instruction) {
        let mut position = next.position();
        for (axis, marker) in ["X", "Y", "Z"].into_iter().enumerate() {
            if let Some(value) = first_number_after_default(marker, body) {
                position[axis] = value;
            }
        }
        next.set_position(position);

        if let Some(declared) = first_number_after_default("E", body) {
            self.e_offset = next.extrusion_position() - declared;
        }
    }
}
