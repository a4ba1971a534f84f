//! Short, unique, vendor-safe IDs for ordering sequences.

use regex::Regex;
use std::{collections::HashSet, sync::LazyLock};

pub const DEFAULT_ORDER_ID_MAX_LENGTH: usize = 15;

/// Characters vendors reject, with their readable stand-ins.
pub const DEFAULT_REPLACEMENTS: &[(char, &str)] = &[('\'', "p"), ('*', "s"), ('-', "_")];

static UNSAFE_CHARACTERS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").ok());

/// Applies the replacements, turns every other unsafe character into `_`
/// and truncates to `max_length` characters.
pub fn sanitize_string(string: &str, max_length: usize, replacements: &[(char, &str)]) -> String {
    let mut ret = String::with_capacity(string.len());
    for c in string.chars() {
        match replacements.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => ret.push_str(to),
            None => ret.push(c),
        }
    }
    let Some(re) = UNSAFE_CHARACTERS.as_ref() else {
        return ret.chars().take(max_length).collect();
    };
    // ASCII only from here on
    re.replace_all(&ret, "_").chars().take(max_length).collect()
}

/// One sanitized token per input position, all distinct. A token that was
/// already handed out gets `2`, `3`, ... in place of its trailing
/// characters, never growing past `max_length`.
pub fn sanitize_and_uniquify(
    strings: &[&str],
    max_length: usize,
    replacements: &[(char, &str)],
) -> Vec<(String, String)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut ret = Vec::with_capacity(strings.len());
    for string in strings {
        let base = sanitize_string(string, max_length, replacements);
        let mut token = base.clone();
        let mut i = 1usize;
        while used.contains(&token) {
            i += 1;
            let suffix = i.to_string();
            let keep = base
                .chars()
                .count()
                .saturating_sub(1)
                .min(max_length.saturating_sub(suffix.len()));
            let head: String = base.chars().take(keep).collect();
            token = format!("{head}{suffix}");
        }
        used.insert(token.clone());
        ret.push((string.to_string(), token));
    }
    ret
}
