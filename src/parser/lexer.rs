//! G-code Lexer
//!
//! Marker-based extraction of numbers and strings from raw lines.
//! Numbers are scanned byte by byte and always use `.` as the decimal
//! separator, independent of the host locale.

/// Comment marker that ends the searchable part of a line by default
pub const DEFAULT_STOP: &str = ";";

/// A number found after a marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberMatch {
    /// Parsed value
    pub value: f64,
    /// Byte offset just past the last character of the number
    pub end: usize,
}

/// Find the first number following `marker` in `line`
///
/// The marker must occur before `stop` (when given and present in the
/// line). A marker followed by something that is not a number yields
/// `None`, exactly like a missing marker.
pub fn first_number_after(marker: &str, line: &str, stop: Option<&str>) -> Option<NumberMatch> {
    let marker_pos = line.find(marker)?;

    if let Some(stop) = stop.filter(|s| !s.is_empty()) {
        if let Some(stop_pos) = line.find(stop) {
            if stop_pos <= marker_pos {
                return None;
            }
        }
    }

    let parsed = scan_number(line, marker_pos + marker.len());
    if parsed.is_none() {
        log::trace!("ignoring malformed value after '{}' in '{}'", marker, line);
    }
    parsed
}

/// [`first_number_after`] with `;` as the stop marker
pub fn first_number_after_default(marker: &str, line: &str) -> Option<f64> {
    first_number_after(marker, line, Some(DEFAULT_STOP)).map(|m| m.value)
}

/// Like [`first_number_after_default`] but truncated to an integer
pub fn first_integer_after(marker: &str, line: &str) -> Option<i64> {
    first_number_after_default(marker, line).map(|v| v.trunc() as i64)
}

/// The text between `marker` and the next `separator`
pub fn first_string_after<'a>(marker: &str, line: &'a str, separator: &str) -> Option<&'a str> {
    let start = line.find(marker)? + marker.len();
    let len = line[start..].find(separator)?;
    Some(&line[start..start + len])
}

/// Strip a leading `N<digits>` line number and a trailing `*<checksum>`
pub fn line_without_checksum(line: &str) -> &str {
    let mut body = line.trim();

    if let Some(rest) = body.strip_prefix('N') {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            body = rest[digits..].trim_start();
        }
    }

    if let Some(star) = body.rfind('*') {
        let checksum = body[star + 1..].trim();
        if !checksum.is_empty() && checksum.bytes().all(|b| b.is_ascii_digit()) {
            body = body[..star].trim_end();
        }
    }

    body
}

/// XOR of every byte in the line, as used by printer firmware line checks
pub fn calculate_checksum(line: &str) -> u8 {
    line.bytes().fold(0, |acc, b| acc ^ b)
}

/// Replace the number following `letter` with `value`
///
/// Returns the line unchanged if the letter does not occur.
pub fn replace_number_after(letter: char, line: &str, value: f64) -> String {
    let Some(pos) = line.find(letter) else {
        return line.to_string();
    };

    let head = &line[..pos + letter.len_utf8()];
    let formatted = format_number(value);
    match line[pos..].find(' ') {
        Some(space) => format!("{}{}{}", head, formatted, &line[pos + space..]),
        None => format!("{}{}", head, formatted),
    }
}

/// Format with at most five decimals and no trailing zeros
pub fn format_number(value: f64) -> String {
    let text = format!("{:.5}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-" | "-0" => "0".to_string(),
        _ => text.to_string(),
    }
}

fn scan_number(line: &str, start: usize) -> Option<NumberMatch> {
    let bytes = line.as_bytes();
    let mut idx = start;

    while idx < bytes.len() && matches!(bytes[idx], b' ' | b'\t') {
        idx += 1;
    }

    let number_start = idx;
    if idx < bytes.len() && matches!(bytes[idx], b'+' | b'-') {
        idx += 1;
    }

    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut digits = idx - int_start;

    if idx < bytes.len() && bytes[idx] == b'.' {
        idx += 1;
        let frac_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        digits += idx - frac_start;
    }

    if digits == 0 {
        return None;
    }

    let text = line[number_start..idx].trim_start_matches('+');
    let value = text.parse::<f64>().ok()?;
    Some(NumberMatch { value, end: idx })
}
