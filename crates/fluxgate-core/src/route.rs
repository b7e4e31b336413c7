//! Route rule schema
//!
//! A route rule binds a match condition (methods + one path discriminator
//! + optional header matchers) to an action naming the upstream cluster.
//! Rules are identified by `id`; the coordinator's authoritative store is
//! keyed on it and duplicate ids overwrite.

use serde::{Deserialize, Serialize};

/// The method set a rule expands to when it declares none.
pub const DEFAULT_METHODS: [&str; 7] =
    ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"];

/// Top-level router configuration handed to the coordinator at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Initial rule set; may be empty.
    #[serde(default)]
    pub routes: Vec<RouteRule>,
    /// Whether the host feeds this router from a dynamic control plane.
    /// Carried for the host's benefit; has no effect on matching.
    #[serde(default)]
    pub dynamic: bool,
}

/// A single route rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Stable identifier, primary key in the authoritative store.
    pub id: String,
    /// What the rule matches.
    #[serde(default)]
    pub matcher: RouteMatch,
    /// What a match resolves to.
    pub action: RouteAction,
}

/// Match condition of a rule.
///
/// Exactly one path discriminator applies: `path` (exact segmented
/// pattern, may contain variables and wildcards), `prefix` (matched as
/// `<prefix>/**`), or neither. A rule with neither discriminator and at
/// least one header matcher is header-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMatch {
    /// HTTP methods; empty expands to [`DEFAULT_METHODS`].
    #[serde(default)]
    pub methods: Vec<String>,
    /// Exact segmented path pattern, e.g. `/users/:id` or `/files/**`.
    #[serde(default)]
    pub path: String,
    /// Path prefix; lifted to `<prefix>/**` at build time.
    #[serde(default)]
    pub prefix: String,
    /// Header matchers; consulted only for header-only rules.
    #[serde(default)]
    pub headers: Vec<HeaderMatcher>,
}

impl RouteMatch {
    /// A rule matches on headers alone iff it has no path discriminator
    /// and at least one header matcher. Every other rule is path-like and
    /// its header matchers are ignored.
    pub fn is_header_only(&self) -> bool {
        self.path.is_empty() && self.prefix.is_empty() && !self.headers.is_empty()
    }

    /// The methods this rule applies to, with the empty set expanded to
    /// the default seven.
    pub fn effective_methods(&self) -> Vec<String> {
        if self.methods.is_empty() {
            DEFAULT_METHODS.iter().map(|m| m.to_string()).collect()
        } else {
            self.methods.clone()
        }
    }
}

/// Matches one request header.
///
/// With `regex` set, the first entry of `values` is compiled as a regular
/// expression; otherwise `values` is an OR-set of exact strings. An empty
/// `values` list degrades to a presence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderMatcher {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub regex: bool,
}

/// The payload returned for a matched route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAction {
    /// Name of the upstream cluster to forward to.
    pub cluster: String,
}

impl RouteAction {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }
}
