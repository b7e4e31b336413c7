//! Path key encoding
//!
//! Rules and requests meet in the trie through a shared key format:
//! `"<METHOD>/<segment>/<segment>/…"`. A prefix rule is normalized to end
//! in `/` and extended with `**` so that it matches everything below the
//! prefix. Segmentation drops empty segments, so the leading `/` of a
//! path (and any doubled slashes) never produce phantom segments.

use fluxgate_core::RouteMatch;

/// Encode `(method, path)` into a trie key.
pub fn trie_key(method: &str, path: &str) -> String {
    format!("{}/{}", method, path.trim_start_matches('/'))
}

/// Encode `(method, prefix)` into a trie key covering the whole subtree
/// below the prefix.
pub fn prefix_trie_key(method: &str, prefix: &str) -> String {
    let mut pattern = prefix.to_string();
    if !pattern.ends_with('/') {
        pattern.push('/');
    }
    pattern.push_str("**");
    trie_key(method, &pattern)
}

/// Encode a rule's path discriminator for one method.
pub fn route_trie_key(method: &str, matcher: &RouteMatch) -> String {
    if !matcher.prefix.is_empty() {
        prefix_trie_key(method, &matcher.prefix)
    } else {
        trie_key(method, &matcher.path)
    }
}

/// Split a trie key into its non-empty segments.
pub fn split_segments(key: &str) -> Vec<&str> {
    key.split('/').filter(|s| !s.is_empty()).collect()
}

/// Classification of one key segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Matches itself only.
    Literal(&'a str),
    /// `:name`, `:name(regex)` or `*`: matches exactly one segment. The
    /// name is captured for variable-style declarations.
    Variable(&'a str),
    /// Terminal `**`: matches one or more trailing segments.
    MatchAll,
}

/// Classify a segment by its leading characters.
pub fn classify(segment: &str) -> Segment<'_> {
    if segment == "**" {
        Segment::MatchAll
    } else if segment == "*" {
        Segment::Variable("*")
    } else if let Some(rest) = segment.strip_prefix(':') {
        // A parenthesized constraint (":id(\d+)") contributes the name only.
        let name = rest.split('(').next().unwrap_or(rest);
        Segment::Variable(name)
    } else {
        Segment::Literal(segment)
    }
}
