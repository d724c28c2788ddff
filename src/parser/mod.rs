//! G-code Parser
//!
//! Line-level parsing shared by both document variants: the marker
//! tokenizer and the leading-word classifier.

pub mod lexer;
pub mod line;

pub use lexer::{
    calculate_checksum, first_integer_after, first_number_after, first_number_after_default,
    first_string_after, line_without_checksum, replace_number_after, NumberMatch, DEFAULT_STOP,
};
pub use line::{classify, has_explicit_layers, layer_marker, LineKind};

/// Strip line number and checksum, then classify
///
/// Returns the checksum-free body alongside its kind.
pub fn parse_line(line: &str) -> (&str, LineKind) {
    let body = line_without_checksum(line);
    (body, classify(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbered_line() {
        let (body, kind) = parse_line("N42 G1 X10 Y20*18");
        assert_eq!(body, "G1 X10 Y20");
        assert_eq!(kind, LineKind::LinearMove);
    }

    #[test]
    fn test_parse_comment_only() {
        let (body, kind) = parse_line("; this is a comment");
        assert_eq!(body, "; this is a comment");
        assert_eq!(kind, LineKind::Comment);
    }

    #[test]
    fn test_parse_empty_line() {
        let (_, kind) = parse_line("   ");
        assert_eq!(kind, LineKind::Empty);
    }
}
