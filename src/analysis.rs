//! Whole-document analysis passes
//!
//! Bounds, weighted center and the per-line timing pass split the
//! instruction slice into contiguous chunks and run them on scoped threads
//! once the slice is larger than one chunk. Partial results merge
//! associatively, so chunk order does not matter. The backward time
//! accumulation is sequential.

use std::ops::Range;
use std::thread;

use glam::{DVec2, DVec3};
use serde::Serialize;

use crate::instruction::Instruction;

/// Axis-aligned XY bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// A box containing nothing; merging it changes nothing
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn merge(self, other: Aabb) -> Aabb {
        Aabb {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }
}

/// Seconds for one straight move at a constant feed rate (mm/min)
///
/// Acceleration and jerk are not modeled.
pub fn line_seconds(from: DVec3, to: DVec3, feed_rate_mm_per_min: f64) -> f64 {
    if feed_rate_mm_per_min <= 0.0 {
        return 0.0;
    }
    from.distance(to) / (feed_rate_mm_per_min / 60.0)
}

/// XY bounds of every instruction
pub fn bounds(instructions: &[Instruction], chunk_size: usize) -> Aabb {
    chunked_reduce(
        instructions,
        chunk_size,
        |range| {
            let mut aabb = Aabb::empty();
            for instruction in &instructions[range] {
                aabb.include(instruction.x(), instruction.y());
            }
            aabb
        },
        Aabb::merge,
        Aabb::empty(),
    )
}

/// Mean XY position, each instruction weighted equally
pub fn weighted_center(instructions: &[Instruction], chunk_size: usize) -> DVec2 {
    if instructions.is_empty() {
        return DVec2::ZERO;
    }

    let total = chunked_reduce(
        instructions,
        chunk_size,
        |range| {
            instructions[range]
                .iter()
                .fold(DVec2::ZERO, |sum, i| sum + i.position().truncate())
        },
        |a, b| a + b,
        DVec2::ZERO,
    );
    total / instructions.len() as f64
}

/// Recompute per-line seconds, then accumulate the time remaining
///
/// Safe to call repeatedly; every value is derived from the stored
/// positions and feed rates only.
pub fn analyze_timing(instructions: &mut [Instruction], chunk_size: usize) {
    let seconds = {
        let view: &[Instruction] = instructions;
        chunked_reduce(
            view,
            chunk_size,
            |range| range.map(|i| seconds_for(view, i)).collect::<Vec<f64>>(),
            |mut a, b| {
                a.extend(b);
                a
            },
            Vec::new(),
        )
    };

    let mut after: Option<f64> = None;
    for (instruction, seconds) in instructions.iter_mut().zip(seconds).rev() {
        instruction.set_seconds_this_line(seconds);
        let remaining = after.map_or(0.0, |after| seconds + after);
        instruction.set_seconds_to_end_from_here(remaining);
        after = Some(remaining);
    }
}

fn seconds_for(instructions: &[Instruction], index: usize) -> f64 {
    let instruction = &instructions[index];
    if !instruction.kind().is_move() {
        return 0.0;
    }
    let from = match index {
        0 => DVec3::ZERO,
        _ => instructions[index - 1].position(),
    };
    line_seconds(from, instruction.position(), instruction.feed_rate())
}

/// Map contiguous index ranges of `items` and fold the partial results
/// in range order
fn chunked_reduce<T, F, M>(
    items: &[Instruction],
    chunk_size: usize,
    map: F,
    merge: M,
    identity: T,
) -> T
where
    T: Send,
    F: Fn(Range<usize>) -> T + Sync,
    M: Fn(T, T) -> T,
{
    let len = items.len();
    let chunk_size = chunk_size.max(1);
    if len <= chunk_size {
        return merge(identity, map(0..len));
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let chunk = chunk_size.max(len.div_ceil(workers));

    let map = &map;
    let partials: Vec<T> = thread::scope(|scope| {
        let handles: Vec<_> = (0..len)
            .step_by(chunk)
            .map(|start| {
                let end = (start + chunk).min(len);
                scope.spawn(move || map(start..end))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    partials.into_iter().fold(identity, merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::KinematicTracker;

    fn parse(lines: &[&str]) -> Vec<Instruction> {
        let mut tracker = KinematicTracker::new(false);
        lines.iter().map(|l| tracker.process(l).unwrap()).collect()
    }

    #[test]
    fn test_aabb_merge_is_order_independent() {
        let mut a = Aabb::empty();
        a.include(1.0, 2.0);
        let mut b = Aabb::empty();
        b.include(-3.0, 5.0);
        assert_eq!(a.merge(b), b.merge(a));
        assert_eq!(a.merge(Aabb::empty()), a);
        assert!(Aabb::empty().is_empty());
        assert_eq!(Aabb::empty().width(), 0.0);
    }

    #[test]
    fn test_chunked_bounds_match_single_pass() {
        let lines: Vec<String> = (0..1000)
            .map(|i| format!("G1 X{} Y{}", (i % 37) as f64 - 10.0, (i % 53) as f64 * 0.5))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let instructions = parse(&refs);

        let whole = bounds(&instructions, usize::MAX);
        let chunked = bounds(&instructions, 7);
        assert_eq!(whole, chunked);
        assert_eq!(whole.min_x, -10.0);
        assert_eq!(whole.max_x, 26.0);

        let c1 = weighted_center(&instructions, usize::MAX);
        let c2 = weighted_center(&instructions, 7);
        assert!((c1 - c2).length() < 1e-9);
    }

    #[test]
    fn test_weighted_center_of_empty_slice() {
        assert_eq!(weighted_center(&[], 16), DVec2::ZERO);
    }

    #[test]
    fn test_timing_is_idempotent_and_monotonic() {
        let mut instructions = parse(&[
            "G1 X0 Y0 F600",
            "G1 X10",
            "M104 S200",
            "G1 X10 Y10",
            "G1 X0 Y10 F1200",
        ]);
        analyze_timing(&mut instructions, 2);
        let first: Vec<f64> = instructions
            .iter()
            .map(Instruction::seconds_to_end_from_here)
            .collect();
        analyze_timing(&mut instructions, usize::MAX);
        let second: Vec<f64> = instructions
            .iter()
            .map(Instruction::seconds_to_end_from_here)
            .collect();
        assert_eq!(first, second);

        for pair in first.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert_eq!(*first.last().unwrap(), 0.0);
        // 1s + 0 + 1s, the last line's own 0.5s is not carried
        assert!((first[0] - 2.0).abs() < 1e-9);
        assert!((instructions[4].seconds_this_line() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_line_seconds() {
        let d = line_seconds(DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0), 60.0);
        assert!((d - 5.0).abs() < 1e-12);
        assert_eq!(line_seconds(DVec3::ZERO, DVec3::X, 0.0), 0.0);
    }
}
