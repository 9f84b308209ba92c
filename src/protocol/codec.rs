//! Relay board text protocol
//!
//! Commands are query strings against `/genericArgs`: `z=<n>` asserts output
//! `n`, `v=<n>` deasserts it. The board answers `GET /states` with a free-form
//! report containing an `input:` and an `output:` section made of `<N>:<on|off>`
//! tokens (N is 1-based), and `GET /matrix` with a block of fixed-width rows
//! between a `matrix:` line and a `matrix end` line.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use strum::Display;

/// Path every command is sent to.
pub const COMMAND_PATH: &str = "/genericArgs";
/// Query key that asserts (turns on) an output.
pub const ASSERT_KEY: char = 'z';
/// Query key that deasserts (turns off) an output.
pub const DEASSERT_KEY: char = 'v';

pub const INPUT_MARKER: &str = "input:";
pub const OUTPUT_MARKER: &str = "output:";
/// Trailer some firmware revisions print after the output block.
pub const ALL_STATES_MARKER: &str = "all states";

pub const MATRIX_START_MARKER: &str = "matrix:";
pub const MATRIX_END_MARKER: &str = "matrix end";

const SECTION_MARKERS: [&str; 3] = [INPUT_MARKER, OUTPUT_MARKER, ALL_STATES_MARKER];

static STATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+):(on|off)").expect("state token pattern is valid"));

/// Decoded state of one report section, keyed by 0-based number.
pub type StateMap = BTreeMap<u8, bool>;

/// Which section of a states report to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SectionKind {
    Input,
    Output,
}

impl SectionKind {
    pub fn marker(self) -> &'static str {
        match self {
            SectionKind::Input => INPUT_MARKER,
            SectionKind::Output => OUTPUT_MARKER,
        }
    }
}

/// Build the command path that drives output `number` on or off.
pub fn encode_command(number: u8, turn_on: bool) -> String {
    let key = if turn_on { ASSERT_KEY } else { DEASSERT_KEY };
    format!("{COMMAND_PATH}?{key}={number}")
}

/// Locate the body of a section: everything after its marker up to the next
/// section marker or the end of the report.
///
/// Returns `None` when the marker does not occur at all, which callers treat
/// differently from a present-but-empty section.
pub fn find_section(raw: &str, kind: SectionKind) -> Option<&str> {
    let marker = kind.marker();
    let start = raw.find(marker)? + marker.len();
    let rest = &raw[start..];
    let end = SECTION_MARKERS
        .iter()
        .filter(|m| **m != marker)
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Decode one section of a states report into a 0-based state map.
///
/// Input sections may carry several tokens per line and every token counts.
/// Output sections carry one output per line and only the first token on a
/// line is taken. A missing section decodes to an empty map.
pub fn decode_states_report(raw: &str, kind: SectionKind) -> StateMap {
    let mut states = StateMap::new();
    let Some(section) = find_section(raw, kind) else {
        return states;
    };

    for line in section.lines() {
        match kind {
            SectionKind::Input => {
                for caps in STATE_TOKEN.captures_iter(line) {
                    insert_token(&mut states, &caps[1], &caps[2]);
                }
            }
            SectionKind::Output => {
                if let Some(caps) = STATE_TOKEN.captures(line) {
                    insert_token(&mut states, &caps[1], &caps[2]);
                }
            }
        }
    }

    states
}

fn insert_token(states: &mut StateMap, number: &str, value: &str) {
    // The board numbers from 1; anything that does not map onto 0..=255 is noise.
    match number.parse::<u16>().ok().and_then(|n| n.checked_sub(1)) {
        Some(n) if n <= u8::MAX as u16 => {
            states.insert(n as u8, value == "on");
        }
        _ => log::debug!("Ignoring state token {number}:{value}"),
    }
}

/// Extract the trimmed rows of a matrix report.
///
/// Only non-blank lines strictly between the start and end markers are
/// returned; a report without a matrix block yields no rows.
pub fn decode_matrix_report(raw: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut in_matrix = false;

    for line in raw.lines() {
        if line.contains(MATRIX_START_MARKER) {
            in_matrix = true;
            continue;
        }
        if line.contains(MATRIX_END_MARKER) {
            break;
        }
        let trimmed = line.trim();
        if in_matrix && !trimmed.is_empty() {
            rows.push(trimmed.to_string());
        }
    }

    rows
}
