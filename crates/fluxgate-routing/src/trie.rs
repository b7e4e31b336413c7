//! Segmented path-matching trie
//!
//! One trie per HTTP method, keyed by
//! [`key::trie_key`](crate::key::trie_key) strings. Nodes branch three
//! ways: literal children, a single variable child shared by every
//! `:name`/`*` declared at that level, and a terminal `**` child. The
//! trie is mutable while a snapshot is being built and read-only once the
//! snapshot is published; nothing here synchronizes.
//!
//! Match priority, most to least specific:
//! 1. literal segment
//! 2. variable / `*` (one segment, captured)
//! 3. `**` (one or more trailing segments)
//!
//! A deeper rule beats a shallower one because the descent only falls
//! back to `**` after literal and variable branches are exhausted.

use std::collections::{HashMap, HashSet};

use crate::key::{Segment, classify, split_segments};

/// A node in the trie.
#[derive(Debug)]
pub struct TrieNode<T> {
    /// The literal segment or variable name this node represents.
    match_str: String,
    /// True iff some route terminates here.
    end_of_path: bool,
    /// The routed payload; present iff `end_of_path`.
    value: Option<T>,
    /// Literal segment → child.
    children: HashMap<String, TrieNode<T>>,
    /// Shared child for every variable or `*` declared at this level.
    variable_child: Option<Box<TrieNode<T>>>,
    /// Every variable name ever declared at this level; they all resolve
    /// to `variable_child`.
    variable_names: HashSet<String>,
    /// Terminal `**` child.
    match_all_child: Option<Box<TrieNode<T>>>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            match_str: String::new(),
            end_of_path: false,
            value: None,
            children: HashMap::new(),
            variable_child: None,
            variable_names: HashSet::new(),
            match_all_child: None,
        }
    }
}

impl<T> TrieNode<T> {
    fn named(match_str: &str) -> Self {
        Self {
            match_str: match_str.to_string(),
            ..Self::default()
        }
    }

    /// The literal segment or variable name recorded for this node. For a
    /// shared variable node this is the name from the most recent insert
    /// that terminated here.
    pub fn match_str(&self) -> &str {
        &self.match_str
    }

    /// True iff some route terminates here.
    pub fn is_end_of_path(&self) -> bool {
        self.end_of_path
    }

    /// The payload stored at this node, if a route terminates here.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The variable names declared at this level.
    pub fn variable_names(&self) -> &HashSet<String> {
        &self.variable_names
    }
}

/// Segmented matcher over keys of the form `"<METHOD>/<seg>/<seg>/…"`.
#[derive(Debug)]
pub struct Trie<T> {
    root: TrieNode<T>,
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Trie<T> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let root = &self.root;
        root.children.is_empty()
            && root.variable_child.is_none()
            && root.match_all_child.is_none()
    }

    /// Insert a key with its payload.
    ///
    /// Returns `false` without touching the terminal when another rule
    /// already terminates at the same classified segment sequence: first
    /// write wins. Interior nodes created on the way down are kept.
    pub fn put(&mut self, key: &str, value: T) -> bool {
        let segments = split_segments(key);
        if segments.is_empty() {
            return true;
        }

        let mut node = &mut self.root;
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            let terminal = i == last;
            match classify(segment) {
                Segment::MatchAll => {
                    // ** is only meaningful as the last segment; anything
                    // written after it is unreachable and dropped.
                    let slot = node
                        .match_all_child
                        .get_or_insert_with(|| Box::new(TrieNode::named("**")));
                    if terminal {
                        if slot.end_of_path {
                            return false;
                        }
                        slot.value = Some(value);
                        slot.end_of_path = true;
                    }
                    return true;
                }
                Segment::Variable(name) => {
                    if terminal
                        && node
                            .variable_child
                            .as_deref()
                            .is_some_and(|v| v.end_of_path)
                    {
                        return false;
                    }
                    node.variable_names.insert(name.to_string());
                    let slot = node
                        .variable_child
                        .get_or_insert_with(|| Box::new(TrieNode::default()));
                    if terminal {
                        slot.match_str = name.to_string();
                        slot.value = Some(value);
                        slot.end_of_path = true;
                        return true;
                    }
                    node = &mut **slot;
                }
                Segment::Literal(lit) => {
                    let slot = node
                        .children
                        .entry(lit.to_string())
                        .or_insert_with(|| TrieNode::named(lit));
                    if terminal {
                        if slot.end_of_path {
                            return false;
                        }
                        slot.value = Some(value);
                        slot.end_of_path = true;
                        return true;
                    }
                    node = slot;
                }
            }
        }
        true
    }

    /// Remove a key inserted with [`put`](Self::put).
    ///
    /// Segments must match by classification exactly as inserted. Clears
    /// the terminal marker and payload; the surrounding structure stays.
    /// Returns `true` iff a terminating route was found and cleared.
    pub fn remove(&mut self, key: &str) -> bool {
        let segments = split_segments(key);
        if segments.is_empty() {
            return false;
        }

        let mut node = &mut self.root;
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            let next = match classify(segment) {
                Segment::MatchAll => {
                    // Valid only as the terminal segment.
                    if i != last {
                        return false;
                    }
                    node.match_all_child.as_deref_mut()
                }
                Segment::Variable(_) => node.variable_child.as_deref_mut(),
                Segment::Literal(lit) => node.children.get_mut(lit),
            };
            match next {
                Some(n) => node = n,
                None => return false,
            }
        }

        if !node.end_of_path {
            return false;
        }
        node.end_of_path = false;
        node.value = None;
        true
    }

    /// Match an input key against the trie.
    ///
    /// The key is stripped of any query string before segmentation. On a
    /// hit, returns the terminal node together with the captured variable
    /// values in root-to-leaf order. An empty segment list never matches.
    pub fn match_path(&self, key: &str) -> Option<(&TrieNode<T>, Vec<String>)> {
        let path = key.split('?').next().unwrap_or(key);
        let segments = split_segments(path);
        if segments.is_empty() {
            return None;
        }
        let (node, mut captured) = Self::descend(&self.root, &segments)?;
        // Captures accumulate leaf-to-root on the way back up.
        captured.reverse();
        Some((node, captured))
    }

    fn descend<'a>(
        node: &'a TrieNode<T>,
        segments: &[&str],
    ) -> Option<(&'a TrieNode<T>, Vec<String>)> {
        let segment = segments[0];
        let rest = &segments[1..];

        if rest.is_empty() {
            if let Some(child) = node.children.get(segment) {
                if child.end_of_path {
                    return Some((child, Vec::new()));
                }
            }
            if let Some(var) = node.variable_child.as_deref() {
                if var.end_of_path {
                    return Some((var, vec![segment.to_string()]));
                }
            }
            // No wildcard fallback on the terminal segment: a `**` needs
            // at least one segment of its own, so `/api/**` does not
            // match `/api`.
            return None;
        }

        if let Some(child) = node.children.get(segment) {
            if let Some(hit) = Self::descend(child, rest) {
                return Some(hit);
            }
        }
        if let Some(var) = node.variable_child.as_deref() {
            if let Some((n, mut captured)) = Self::descend(var, rest) {
                captured.push(segment.to_string());
                return Some((n, captured));
            }
        }
        // Literal and variable branches exhausted; the remaining
        // segments can still be swallowed by a match-all one level down
        // (everything after `segment`) or at this level (`segment` and
        // everything after it).
        if let Some(child) = node.children.get(segment) {
            if let Some(all) = child.match_all_child.as_deref() {
                return Some((all, Vec::new()));
            }
        }
        if let Some(all) = node.match_all_child.as_deref() {
            return Some((all, Vec::new()));
        }
        None
    }
}
