//! Query-aware snippet extraction for search results.

/// Window width in characters.
const SNIPPET_WIDTH: usize = 200;
/// How far before the first matching term the window starts.
const LEAD_CONTEXT: usize = 50;

/// Return a ~200-char window around the first case-insensitive occurrence
/// of any query term, with ellipses marking truncated edges. Falls back to
/// a plain prefix when nothing matches.
pub fn generate(content: &str, query: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    // Per-char lowercasing keeps `lowered` index-aligned with `chars`;
    // one-to-many foldings (a handful of codepoints) fall back to the
    // original char and simply never match.
    let lowered: Vec<char> = chars
        .iter()
        .map(|c| {
            let mut folded = c.to_lowercase();
            match (folded.next(), folded.next()) {
                (Some(single), None) => single,
                _ => *c,
            }
        })
        .collect();

    let hit = query
        .split_whitespace()
        .map(|term| term.to_lowercase())
        .filter(|term| !term.is_empty())
        .filter_map(|term| find_chars(&lowered, &term.chars().collect::<Vec<_>>()))
        .min();

    match hit {
        Some(position) => {
            let start = position.saturating_sub(LEAD_CONTEXT);
            let end = (start + SNIPPET_WIDTH).min(chars.len());
            let mut snippet = String::new();
            if start > 0 {
                snippet.push_str("...");
            }
            snippet.extend(&chars[start..end]);
            if end < chars.len() {
                snippet.push_str("...");
            }
            snippet
        }
        None => {
            if chars.len() <= SNIPPET_WIDTH {
                content.to_string()
            } else {
                let mut snippet: String = chars[..SNIPPET_WIDTH].iter().collect();
                snippet.push_str("...");
                snippet
            }
        }
    }
}

/// First occurrence of `needle` in `haystack`, as a char offset. Operating
/// on chars keeps window arithmetic safe for multi-byte text.
fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
