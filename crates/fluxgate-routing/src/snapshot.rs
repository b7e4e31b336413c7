//! Immutable route snapshots
//!
//! A snapshot is the read-only view the hot path consults: one trie per
//! HTTP method plus a list of compiled header-only rules. It is built in
//! one pass from a cloned rule list and never mutated afterwards — the
//! coordinator swaps whole snapshots through [`SnapshotHolder`] and
//! readers that loaded the previous one simply keep it alive until they
//! are done.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use fluxgate_core::{RouteAction, RouteRequest, RouteRule};

use crate::key::route_trie_key;
use crate::trie::Trie;

/// Process-wide regex compile cache, keyed by pattern text and shared
/// across snapshots so rebuilding the same rule set never recompiles.
/// Store-if-absent; compile failures are cached as `None`.
static REGEX_CACHE: Lazy<DashMap<String, Option<Regex>>> = Lazy::new(DashMap::new);

fn cached_regex(pattern: &str) -> Option<Regex> {
    REGEX_CACHE
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(pattern).ok())
        .clone()
}

/// One compiled matcher for a single request header.
#[derive(Debug, Clone)]
struct CompiledHeader {
    name: String,
    pattern: HeaderPattern,
}

#[derive(Debug, Clone)]
enum HeaderPattern {
    /// Pre-compiled regular expression over the header value.
    Regex(Regex),
    /// OR-set of exact values; an empty set degrades to a presence check.
    Values(Vec<String>),
    /// The declared regex failed to compile; never matches.
    Unmatchable,
}

impl CompiledHeader {
    fn matches(&self, req: &RouteRequest) -> bool {
        let value = match req.header(&self.name) {
            Some(v) if !v.is_empty() => v,
            _ => return false,
        };
        match &self.pattern {
            HeaderPattern::Regex(re) => re.is_match(value),
            HeaderPattern::Values(values) => {
                values.is_empty() || values.iter().any(|v| v == value)
            }
            HeaderPattern::Unmatchable => false,
        }
    }
}

/// A header-only rule, compiled for the read path.
#[derive(Debug, Clone)]
pub struct HeaderRoute {
    methods: Vec<String>,
    headers: Vec<CompiledHeader>,
    action: RouteAction,
}

impl HeaderRoute {
    fn compile(rule: &RouteRule, invalid_patterns: &mut Vec<String>) -> Self {
        let headers = rule
            .matcher
            .headers
            .iter()
            .map(|h| {
                let pattern = if h.regex && !h.values.is_empty() {
                    match cached_regex(&h.values[0]) {
                        Some(re) => HeaderPattern::Regex(re),
                        None => {
                            invalid_patterns
                                .push(format!("{} ({:?})", rule.id, h.values[0]));
                            HeaderPattern::Unmatchable
                        }
                    }
                } else {
                    HeaderPattern::Values(h.values.clone())
                };
                CompiledHeader {
                    name: h.name.clone(),
                    pattern,
                }
            })
            .collect();

        Self {
            methods: rule.matcher.effective_methods(),
            headers,
            action: rule.action.clone(),
        }
    }

    fn matches(&self, req: &RouteRequest) -> bool {
        if !self.methods.iter().any(|m| m == req.method()) {
            return false;
        }
        self.headers.iter().all(|h| h.matches(req))
    }

    pub fn action(&self) -> &RouteAction {
        &self.action
    }
}

/// A frozen route table: per-method tries plus header-only rules.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    method_tries: HashMap<String, Trie<RouteAction>>,
    header_only: Vec<HeaderRoute>,
}

impl RouteSnapshot {
    /// Build a snapshot from a rule list.
    ///
    /// Rules are ordered by id first, which fixes both the header-only
    /// evaluation order and the winner of duplicate trie keys across
    /// rebuilds. Build never fails: duplicate keys keep the earlier rule,
    /// invalid header regexes are disabled and reported in a single
    /// warning.
    pub fn build(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| a.id.cmp(&b.id));

        let header_count = rules
            .iter()
            .filter(|r| r.matcher.is_header_only())
            .count();
        let mut method_tries: HashMap<String, Trie<RouteAction>> = HashMap::new();
        let mut header_only = Vec::with_capacity(header_count);
        let mut invalid_patterns = Vec::new();

        for rule in &rules {
            if rule.matcher.is_header_only() {
                header_only.push(HeaderRoute::compile(rule, &mut invalid_patterns));
                continue;
            }
            // Path-like: header matchers, if any, are ignored.
            for method in rule.matcher.effective_methods() {
                let key = route_trie_key(&method, &rule.matcher);
                let _ = method_tries
                    .entry(method)
                    .or_default()
                    .put(&key, rule.action.clone());
            }
        }

        if !invalid_patterns.is_empty() {
            warn!(
                "disabled header matchers with invalid regex patterns: {}",
                invalid_patterns.join(", ")
            );
        }

        Self {
            method_tries,
            header_only,
        }
    }

    /// The trie serving one HTTP method, if any rule registered it.
    pub fn method_trie(&self, method: &str) -> Option<&Trie<RouteAction>> {
        self.method_tries.get(method)
    }

    /// Header-only rules in evaluation order.
    pub fn header_only(&self) -> &[HeaderRoute] {
        &self.header_only
    }

    /// The first header-only rule admitting the request, if any.
    pub fn route_by_headers(&self, req: &RouteRequest) -> Option<&RouteAction> {
        self.header_only
            .iter()
            .find(|hr| hr.matches(req))
            .map(|hr| &hr.action)
    }
}

/// Atomically swappable cell holding the active snapshot.
///
/// `load` is lock-free and never blocks; `store` replaces the pointer
/// atomically. A reader that loaded the previous snapshot keeps a strong
/// reference, so the old table is released only when its last reader
/// drops it.
#[derive(Debug, Default)]
pub struct SnapshotHolder {
    active: ArcSwapOption<RouteSnapshot>,
}

impl SnapshotHolder {
    pub fn new() -> Self {
        Self {
            active: ArcSwapOption::const_empty(),
        }
    }

    pub fn load(&self) -> Option<Arc<RouteSnapshot>> {
        self.active.load_full()
    }

    pub fn store(&self, snapshot: Arc<RouteSnapshot>) {
        self.active.store(Some(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxgate_core::{HeaderMatcher, RouteMatch};

    fn rule(id: &str, matcher: RouteMatch, cluster: &str) -> RouteRule {
        RouteRule {
            id: id.to_string(),
            matcher,
            action: RouteAction::new(cluster),
        }
    }

    fn header(name: &str, values: &[&str], regex: bool) -> HeaderMatcher {
        HeaderMatcher {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            regex,
        }
    }

    #[test]
    fn test_path_rule_fills_one_trie_per_method() {
        let snapshot = RouteSnapshot::build(vec![rule(
            "r1",
            RouteMatch {
                methods: vec!["GET".to_string(), "POST".to_string()],
                path: "/api/users".to_string(),
                ..Default::default()
            },
            "c",
        )]);

        assert!(snapshot.method_trie("GET").is_some());
        assert!(snapshot.method_trie("POST").is_some());
        assert!(snapshot.method_trie("PUT").is_none());
    }

    #[test]
    fn test_empty_methods_expand_to_default_seven() {
        let snapshot = RouteSnapshot::build(vec![rule(
            "r1",
            RouteMatch {
                path: "/api/users".to_string(),
                ..Default::default()
            },
            "c",
        )]);

        for method in fluxgate_core::DEFAULT_METHODS {
            let trie = snapshot.method_trie(method).unwrap();
            let (node, _) = trie
                .match_path(&crate::key::trie_key(method, "/api/users"))
                .unwrap();
            assert_eq!(node.value(), Some(&RouteAction::new("c")));
        }
    }

    #[test]
    fn test_rule_with_path_and_headers_routes_by_path_only() {
        let snapshot = RouteSnapshot::build(vec![rule(
            "r1",
            RouteMatch {
                methods: vec!["GET".to_string()],
                path: "/api/users".to_string(),
                headers: vec![header("X-Env", &["prod"], false)],
                ..Default::default()
            },
            "c",
        )]);

        assert!(snapshot.header_only().is_empty());
        // The header matcher is gone from the read path entirely: the
        // trie hit does not care about headers.
        assert!(snapshot.method_trie("GET").is_some());
        let req = RouteRequest::new("GET", "/whatever").with_header("X-Env", "prod");
        assert!(snapshot.route_by_headers(&req).is_none());
    }

    #[test]
    fn test_header_only_value_set_matching() {
        let snapshot = RouteSnapshot::build(vec![rule(
            "h1",
            RouteMatch {
                methods: vec!["GET".to_string()],
                headers: vec![header("X-Env", &["prod", "staging"], false)],
                ..Default::default()
            },
            "c-hdr",
        )]);

        let hit = RouteRequest::new("GET", "/x").with_header("X-Env", "staging");
        assert_eq!(
            snapshot.route_by_headers(&hit),
            Some(&RouteAction::new("c-hdr"))
        );

        // Values compare case-sensitively.
        let wrong_case = RouteRequest::new("GET", "/x").with_header("X-Env", "Prod");
        assert!(snapshot.route_by_headers(&wrong_case).is_none());

        let absent = RouteRequest::new("GET", "/x");
        assert!(snapshot.route_by_headers(&absent).is_none());

        let wrong_method = RouteRequest::new("POST", "/x").with_header("X-Env", "prod");
        assert!(snapshot.route_by_headers(&wrong_method).is_none());
    }

    #[test]
    fn test_header_only_regex_matching() {
        let snapshot = RouteSnapshot::build(vec![rule(
            "h1",
            RouteMatch {
                methods: vec!["GET".to_string()],
                headers: vec![header("X-Env", &["^prod|staging$"], true)],
                ..Default::default()
            },
            "c-hdr",
        )]);

        let hit = RouteRequest::new("GET", "/x").with_header("X-Env", "prod");
        assert_eq!(
            snapshot.route_by_headers(&hit),
            Some(&RouteAction::new("c-hdr"))
        );

        let miss = RouteRequest::new("GET", "/x").with_header("X-Env", "dev");
        assert!(snapshot.route_by_headers(&miss).is_none());
    }

    #[test]
    fn test_header_without_values_is_a_presence_check() {
        let snapshot = RouteSnapshot::build(vec![rule(
            "h1",
            RouteMatch {
                methods: vec!["GET".to_string()],
                headers: vec![header("X-Trace", &[], false)],
                ..Default::default()
            },
            "c-hdr",
        )]);

        let present = RouteRequest::new("GET", "/x").with_header("X-Trace", "anything");
        assert!(snapshot.route_by_headers(&present).is_some());

        let absent = RouteRequest::new("GET", "/x");
        assert!(snapshot.route_by_headers(&absent).is_none());

        // An empty value counts as absent.
        let empty = RouteRequest::new("GET", "/x").with_header("X-Trace", "");
        assert!(snapshot.route_by_headers(&empty).is_none());
    }

    #[test]
    fn test_invalid_regex_disables_matcher_without_failing_build() {
        let snapshot = RouteSnapshot::build(vec![
            rule(
                "h1",
                RouteMatch {
                    methods: vec!["GET".to_string()],
                    headers: vec![header("X-Env", &["[invalid(regex"], true)],
                    ..Default::default()
                },
                "c-bad",
            ),
            rule(
                "h2",
                RouteMatch {
                    methods: vec!["GET".to_string()],
                    headers: vec![header("X-Env", &["prod"], false)],
                    ..Default::default()
                },
                "c-good",
            ),
        ]);

        assert_eq!(snapshot.header_only().len(), 2);

        // The broken matcher never fires, even for values that would have
        // matched the intended pattern; the next rule still does.
        let req = RouteRequest::new("GET", "/x").with_header("X-Env", "prod");
        assert_eq!(
            snapshot.route_by_headers(&req),
            Some(&RouteAction::new("c-good"))
        );
    }

    #[test]
    fn test_header_only_rules_evaluate_in_id_order() {
        // Both rules admit the request; the lower id wins regardless of
        // input order.
        let matcher = RouteMatch {
            methods: vec!["GET".to_string()],
            headers: vec![header("X-Env", &["prod"], false)],
            ..Default::default()
        };
        let snapshot = RouteSnapshot::build(vec![
            rule("b", matcher.clone(), "c-second"),
            rule("a", matcher, "c-first"),
        ]);

        let req = RouteRequest::new("GET", "/x").with_header("X-Env", "prod");
        assert_eq!(
            snapshot.route_by_headers(&req),
            Some(&RouteAction::new("c-first"))
        );
    }

    #[test]
    fn test_duplicate_trie_key_keeps_lower_id() {
        let matcher = RouteMatch {
            methods: vec!["GET".to_string()],
            path: "/api/users".to_string(),
            ..Default::default()
        };
        let snapshot = RouteSnapshot::build(vec![
            rule("z", matcher.clone(), "c-late"),
            rule("a", matcher, "c-early"),
        ]);

        let trie = snapshot.method_trie("GET").unwrap();
        let (node, _) = trie.match_path("GET/api/users").unwrap();
        assert_eq!(node.value(), Some(&RouteAction::new("c-early")));
    }

    #[test]
    fn test_regex_cache_handles_repeat_and_invalid_patterns() {
        assert!(cached_regex("^fluxgate-[0-9a-f]{8}$").is_some());
        // Second call is served from the cache.
        assert!(cached_regex("^fluxgate-[0-9a-f]{8}$").is_some());

        assert!(cached_regex("[broken(pattern").is_none());
        assert!(cached_regex("[broken(pattern").is_none());
    }

    #[test]
    fn test_snapshot_holder_swap_keeps_old_readers_valid() {
        let holder = SnapshotHolder::new();
        assert!(holder.load().is_none());

        let first = Arc::new(RouteSnapshot::build(vec![rule(
            "r1",
            RouteMatch {
                methods: vec!["GET".to_string()],
                path: "/one".to_string(),
                ..Default::default()
            },
            "c-one",
        )]));
        holder.store(first);

        // A reader loads the current snapshot and holds on to it.
        let held = holder.load().unwrap();

        let second = Arc::new(RouteSnapshot::build(Vec::new()));
        holder.store(second);

        // The reader still observes the table it loaded.
        assert!(held.method_trie("GET").is_some());
        // New loads observe the replacement.
        assert!(holder.load().unwrap().method_trie("GET").is_none());
    }
}
