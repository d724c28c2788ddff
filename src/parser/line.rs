//! Line classification
//!
//! Decides what a checksum-free line is from its leading command word.
//! Only the commands that move the kinematic state get their own variant.

use serde::Serialize;

/// Layer-change comment prefixes, longest first
pub const LAYER_MARKERS: [&str; 3] = ["; LAYER:", ";LAYER:", "; layer "];

/// Settings-echo comment carrying the layer thickness
pub const LAYER_THICKNESS_MARKER: &str = "; layerThickness =";

/// Settings-echo comment carrying the first layer thickness
pub const FIRST_LAYER_THICKNESS_MARKER: &str = "; firstLayerThickness =";

/// Per-layer height comment
pub const LAYER_HEIGHT_MARKER: &str = "; LAYER_HEIGHT:";

/// What a single line of G-code is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineKind {
    /// `G0` or `G1`
    LinearMove,
    /// `G90`
    AbsoluteMode,
    /// `G91`
    RelativeMode,
    /// `G92`
    SetPosition,
    /// Any other `G` code, accepted without effect
    OtherG(u32),
    /// Any `M` code, accepted without effect
    MCode(u32),
    /// `T<n>` tool selection
    ToolSelect(usize),
    /// `;` or parenthetical comment
    Comment,
    /// `@` host command
    HostCommand,
    /// Blank line
    Empty,
    /// Leading character this parser does not know
    Unrecognized(char),
}

impl LineKind {
    /// Whether this line is a `G0`/`G1` move
    pub fn is_move(self) -> bool {
        matches!(self, LineKind::LinearMove)
    }
}

/// Classify a line that already had its line number and checksum removed
///
/// Command letters are upper case only; parameter scanning is too, so a
/// lower-case `g1 x10` is reported as unrecognized.
pub fn classify(body: &str) -> LineKind {
    let Some(first) = body.chars().next() else {
        return LineKind::Empty;
    };

    match first {
        ';' | '(' => LineKind::Comment,
        '@' => LineKind::HostCommand,
        'G' => match command_number(body) {
            Some(0 | 1) => LineKind::LinearMove,
            Some(90) => LineKind::AbsoluteMode,
            Some(91) => LineKind::RelativeMode,
            Some(92) => LineKind::SetPosition,
            Some(code) => LineKind::OtherG(code),
            None => LineKind::Unrecognized(first),
        },
        'M' => match command_number(body) {
            Some(code) => LineKind::MCode(code),
            None => LineKind::Unrecognized(first),
        },
        'T' => match command_number(body) {
            Some(tool) => LineKind::ToolSelect(tool as usize),
            None => LineKind::Unrecognized(first),
        },
        other => LineKind::Unrecognized(other),
    }
}

/// The layer marker this comment line starts with, if any
pub fn layer_marker(line: &str) -> Option<&'static str> {
    LAYER_MARKERS
        .iter()
        .copied()
        .find(|marker| line.starts_with(marker))
}

/// Whether any layer marker occurs anywhere in the text
pub fn has_explicit_layers(text: &str) -> bool {
    LAYER_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Digits directly after the command letter (`G01` → 1)
fn command_number(body: &str) -> Option<u32> {
    let digits: &str = {
        let rest = &body[1..];
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        &rest[..len]
    };
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_motion_words() {
        assert_eq!(classify("G0 X1"), LineKind::LinearMove);
        assert_eq!(classify("G01 X1"), LineKind::LinearMove);
        assert_eq!(classify("G1X1Y2"), LineKind::LinearMove);
        assert_eq!(classify("G90"), LineKind::AbsoluteMode);
        assert_eq!(classify("G91 ; relative"), LineKind::RelativeMode);
        assert_eq!(classify("G92 E0"), LineKind::SetPosition);
        assert_eq!(classify("G28"), LineKind::OtherG(28));
    }

    #[test]
    fn test_classify_other_lines() {
        assert_eq!(classify("M104 S200"), LineKind::MCode(104));
        assert_eq!(classify("T1"), LineKind::ToolSelect(1));
        assert_eq!(classify("; comment"), LineKind::Comment);
        assert_eq!(classify("(paren comment)"), LineKind::Comment);
        assert_eq!(classify("@pause"), LineKind::HostCommand);
        assert_eq!(classify(""), LineKind::Empty);
        assert_eq!(classify("X10"), LineKind::Unrecognized('X'));
        assert_eq!(classify("Gfoo"), LineKind::Unrecognized('G'));
    }

    #[test]
    fn test_lower_case_commands_are_unrecognized() {
        assert_eq!(classify("g1 x10 y10 f600"), LineKind::Unrecognized('g'));
        assert_eq!(classify("m104 s200"), LineKind::Unrecognized('m'));
        assert_eq!(classify("t1"), LineKind::Unrecognized('t'));
    }

    #[test]
    fn test_layer_markers() {
        assert_eq!(layer_marker("; LAYER:3"), Some("; LAYER:"));
        assert_eq!(layer_marker(";LAYER:0"), Some(";LAYER:"));
        assert_eq!(layer_marker("; layer 2, Z = 0.6"), Some("; layer "));
        assert_eq!(layer_marker(";layer 2"), None);
        assert_eq!(layer_marker("; LAYER_HEIGHT:0.2"), None);
    }

    #[test]
    fn test_has_explicit_layers() {
        assert!(has_explicit_layers("G1 X0\n;LAYER:0\nG1 X1\n"));
        assert!(!has_explicit_layers("G1 X0\n; LAYER_HEIGHT:0.2\n"));
    }
}
