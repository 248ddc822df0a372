//! Property paths and select/expand planning
//!
//! A property path is a chain of navigation hops ending in a leaf property,
//! written in slash-joined form (`Customer/Region/Code`). The planner turns a
//! set of selected paths into minimal `$select` and `$expand` lists:
//! redundant prefixes are eliminated and intermediate hops are expanded.

use std::fmt;

use crate::api::metadata::Entity;

/// Marker for "select the entire entity"
pub const WHOLE_ENTITY: &str = "*";

/// Ordered chain of navigation hops followed by a terminal property,
/// compared by its slash-joined string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parse a slash-joined path. `*` (or an empty string) denotes the
    /// whole-entity selection.
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == WHOLE_ENTITY {
            return Self { segments: Vec::new() };
        }
        Self {
            segments: trimmed
                .split('/')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// The whole-entity selection marker
    pub fn entire() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn is_entire(&self) -> bool {
        self.segments.is_empty()
    }

    /// Navigation hops, i.e. all segments before the terminal
    pub fn hops(&self) -> &[String] {
        if self.segments.is_empty() {
            &[]
        } else {
            &self.segments[..self.segments.len() - 1]
        }
    }

    /// Terminal leaf segment
    pub fn terminal(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Slash-joined form, `*` for the whole-entity marker
    pub fn join(&self) -> String {
        if self.is_entire() {
            WHOLE_ENTITY.to_string()
        } else {
            self.segments.join("/")
        }
    }

    /// True when `self` is a strict prefix of `other` at a `/` boundary
    pub fn is_strict_prefix_of(&self, other: &PropertyPath) -> bool {
        !self.is_entire()
            && self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

impl From<&str> for PropertyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Minimal `$select` and `$expand` lists for one entity query. Both empty
/// means the parameters are omitted entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub select: Vec<String>,
    pub expand: Vec<String>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.select.is_empty() && self.expand.is_empty()
    }
}

/// Compute the select and expand lists for a set of selected paths against
/// `root`.
///
/// Rules, in order: duplicate paths collapse; a path that is a strict prefix
/// of a more specific path is dropped; every non-terminal hop prefix of a
/// surviving multi-hop path is expanded; a single-segment path is expanded
/// only when it names a navigation property of `root`; expand entries that
/// are strict prefixes of deeper expand entries are dropped; the whole-entity
/// marker surviving alone suppresses both lists.
pub fn plan(paths: &[PropertyPath], root: &Entity) -> QueryPlan {
    // Dedup by string form, preserving first-appearance order
    let mut unique: Vec<&PropertyPath> = Vec::new();
    for path in paths {
        if !unique.iter().any(|p| p.segments == path.segments) {
            unique.push(path);
        }
    }

    // Strict-prefix elimination: the deeper path subsumes the shallow one
    let survivors: Vec<&PropertyPath> = unique
        .iter()
        .filter(|p| !unique.iter().any(|q| p.is_strict_prefix_of(q)))
        .copied()
        .collect();

    // Whole entity as the only survivor: omit select and expand altogether
    if survivors.iter().all(|p| p.is_entire()) {
        return QueryPlan::default();
    }

    let mut expand: Vec<String> = Vec::new();
    let mut push_expand = |entry: String| {
        if !expand.contains(&entry) {
            expand.push(entry);
        }
    };

    for path in &survivors {
        if path.is_entire() {
            continue;
        }
        if path.segments.len() > 1 {
            // Expand every hop boundary so deep leaves are reachable
            for end in 1..path.segments.len() {
                push_expand(path.segments[..end].join("/"));
            }
        } else if let Some(name) = path.terminal() {
            // A lone segment is an expansion only when it denotes a whole
            // related object, not a plain field
            if root.navigation(name).is_some() {
                push_expand(name.to_string());
            }
        }
    }

    // Deeper expands subsume their prefixes
    let expand: Vec<String> = expand
        .iter()
        .filter(|e| {
            !expand
                .iter()
                .any(|other| other.len() > e.len() && other.starts_with(&format!("{}/", e)))
        })
        .cloned()
        .collect();

    let select = survivors
        .iter()
        .filter(|p| !p.is_entire())
        .map(|p| p.join())
        .collect();

    QueryPlan { select, expand }
}
