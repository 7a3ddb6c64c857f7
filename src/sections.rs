//! Heading-based section parsing for completion output.
//!
//! The completion is split into a fixed set of named sections by scanning for
//! markdown heading lines. Policy, pinned by tests: blank lines inside a
//! matched section are preserved; content before the first recognized heading
//! is dropped; the `"### "` prefix is strict while the heading text itself is
//! compared case-insensitively after trimming trailing whitespace.

use std::collections::HashMap;

/// Marker that starts a section heading line
pub const HEADING_PREFIX: &str = "### ";

/// The fixed section labels shown to the user, in display order
pub const SECTION_KEYS: [&str; 3] = [
    "Top Pain Points",
    "Top Feature Requests",
    "Recommended Improvements",
];

/// Partition `raw` into per-section bodies.
///
/// Every key is always present in the result, mapped to an empty string when
/// the raw text carried no matching heading. A heading line switches the
/// current section and is not appended to any body; every other line is
/// appended (with its trailing newline) to the current section, or dropped
/// when no heading has been seen yet.
pub fn parse_sections(raw: &str, keys: &[&str]) -> HashMap<String, String> {
    let mut sections: HashMap<String, String> = keys
        .iter()
        .map(|key| (key.to_string(), String::new()))
        .collect();

    let mut current: Option<&str> = None;
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix(HEADING_PREFIX) {
            let heading = rest.trim_end();
            if let Some(key) = keys.iter().find(|key| key.eq_ignore_ascii_case(heading)) {
                current = Some(*key);
                continue;
            }
            // Unrecognized heading text: treat as an ordinary body line.
        }
        if let Some(key) = current
            && let Some(body) = sections.get_mut(key)
        {
            body.push_str(line);
            body.push('\n');
        }
    }

    sections
}

/// Rebuild a parseable document from a section map, in `keys` order.
/// Used by the CLI for plain-text output; also pins the re-parse idempotence
/// of [`parse_sections`].
pub fn render_sections(sections: &HashMap<String, String>, keys: &[&str]) -> String {
    let mut out = String::new();
    for key in keys {
        out.push_str(HEADING_PREFIX);
        out.push_str(key);
        out.push('\n');
        if let Some(body) = sections.get(*key) {
            out.push_str(body);
        }
    }
    out
}
