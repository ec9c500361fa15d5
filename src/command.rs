//! `getmusic` command parsing.

use std::collections::HashMap;

/// Command keyword, matched case-insensitively against the first token.
pub const COMMAND: &str = "getmusic";

/// Parse a music command out of free message text.
///
/// Syntax: `getmusic id=<songId> s=<source> [p=<quality>]`, whitespace
/// delimited, `key=value` tokens in any order. Returns `None` when the text
/// is not a getmusic command at all; whether the required parameters are
/// present is the caller's concern.
pub fn parse(text: &str) -> Option<HashMap<String, String>> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 2 || !parts[0].eq_ignore_ascii_case(COMMAND) {
        return None;
    }

    let mut params = HashMap::new();
    for part in &parts[1..] {
        // Tokens without '=' are silently ignored; duplicate keys overwrite.
        if let Some((key, value)) = part.split_once('=') {
            params.insert(key.to_lowercase(), value.to_string());
        }
    }

    Some(params)
}
