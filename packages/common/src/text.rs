//! Free-text helpers shared by posts, comments and messages.

const MENTION_MAX_LEN: usize = 18;
const VARIATION_SELECTOR_16: char = '\u{FE0F}';

/// Normalise user-entered text.
///
/// Runs of whitespace inside a line collapse to one space, every line is
/// trimmed, more than one consecutive blank line collapses to a single blank
/// line and the result is trimmed.
pub fn smart_trim(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_newlines = 0usize;

    for line in s.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            pending_newlines += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_newlines > 0 { "\n\n" } else { "\n" });
        }
        pending_newlines = 0;
        out.push_str(&collapsed);
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Extract `@username` mentions in order of first appearance.
///
/// The `@` must not follow a word character, so `bob@site.com` is not a
/// mention. A username starts with an ASCII letter, continues with up to 17
/// of `[A-Za-z0-9_-]` and must not be followed directly by another `@`.
pub fn collect_mentions(s: &str) -> Vec<String> {
    collect_prefixed(s, '@', |first, c| {
        if first {
            c.is_ascii_alphabetic()
        } else {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        }
    }, Some(MENTION_MAX_LEN))
}

/// Extract `#tags` in order of first appearance.
///
/// Tag bodies are Unicode letters, numbers and `_`.
pub fn collect_tags(s: &str) -> Vec<String> {
    collect_prefixed(s, '#', |_, c| is_word_char(c), None)
}

fn collect_prefixed(
    s: &str,
    sigil: char,
    accepts: impl Fn(bool, char) -> bool,
    max_len: Option<usize>,
) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut found: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != sigil || (i > 0 && is_word_char(chars[i - 1])) {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < chars.len() && accepts(end == start, chars[end]) {
            end += 1;
        }

        let len = end - start;
        let too_long = max_len.is_some_and(|max| len > max);
        let glued = chars.get(end) == Some(&sigil);
        if len > 0 && !too_long && !glued {
            let token: String = chars[start..end].iter().collect();
            if !found.contains(&token) {
                found.push(token);
            }
        }
        i = end.max(start);
    }

    found
}

/// Report whether `s` is a single emoji from the Unicode emoji table.
///
/// The emoji presentation selector (U+FE0F) is optional.
pub fn is_valid_emoji(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if emojis::get(s).is_some() {
        return true;
    }
    let stripped: String = s.chars().filter(|&c| c != VARIATION_SELECTOR_16).collect();
    !stripped.is_empty() && emojis::get(&stripped).is_some()
}
