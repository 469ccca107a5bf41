#![deny(clippy::inefficient_to_string)]

use std::collections::HashMap;
use std::sync::Arc;

use super::core::{
    parse_segments, strip_trailing_slash, Matcher, Params, RegisteredPattern, SegmentKind,
};
use super::radix::SegmentNode;

/// Result of a nested (full ancestor chain) lookup
#[derive(Debug, Clone)]
pub struct NestedMatches {
    /// Params collected along the deepest match, covering every ancestor
    pub params: Params,
    /// Splat values of the deepest match
    pub splat_values: Vec<String>,
    /// Matched patterns, ascending depth, index patterns last
    pub matches: Vec<Arc<RegisteredPattern>>,
}

impl NestedMatches {
    /// Original patterns in match order
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.original_pattern()).collect()
    }
}

struct Candidate {
    pattern: Arc<RegisteredPattern>,
    params: Params,
    splat_values: Vec<String>,
}

impl Candidate {
    fn bare(pattern: &Arc<RegisteredPattern>) -> Self {
        Self {
            pattern: Arc::clone(pattern),
            params: Params::new(),
            splat_values: Vec::new(),
        }
    }
}

type Candidates = HashMap<String, Candidate>;

const CATCH_ALL: &str = "/*";

impl Matcher {
    /// Find every registered pattern that applies to `real_path`
    ///
    /// The empty-string root applies to all paths. Static prefixes are collected first; if
    /// the full path is not static, the segment tree is searched for dynamic and splat
    /// ancestors. Redundant candidates are then pruned:
    /// - the root splat is dropped when anything else (besides `""`) matched
    /// - shorter index and non-root splat patterns are dropped
    /// - among the deepest candidates an index loses to any other kind, a splat loses to
    ///   a dynamic pattern when the path is exactly as deep, and a dynamic pattern loses
    ///   to a splat when the path is deeper
    ///
    /// # Returns
    ///
    /// `None` when nothing applies, when only `""` matched a non-root path, or when the
    /// deepest match cannot account for every path segment.
    #[must_use]
    pub fn find_nested_matches(&self, real_path: &str) -> Option<NestedMatches> {
        let trimmed = strip_trailing_slash(real_path);
        let segments = parse_segments(trimmed);
        let mut found = Candidates::new();

        let empty_root = self.static_patterns.get("");
        if let Some(rp) = empty_root {
            found.insert(String::new(), Candidate::bare(rp));
        }

        if segments.is_empty() {
            if let Some(rp) = self.static_patterns.get("/") {
                found.insert(rp.normalized_pattern().to_string(), Candidate::bare(rp));
            } else if let Some(rp) = self.dynamic_patterns.get(CATCH_ALL) {
                found.insert(CATCH_ALL.to_string(), Candidate::bare(rp));
            }
            return finalize(found, true, 0);
        }

        let last = segments.len() - 1;
        let mut prefix = String::with_capacity(trimmed.len() + 1);
        let mut found_full_static = false;
        for (i, segment) in segments.iter().enumerate() {
            prefix.push('/');
            prefix.push_str(segment);
            if let Some(rp) = self.static_patterns.get(&prefix) {
                found.insert(rp.normalized_pattern().to_string(), Candidate::bare(rp));
                if i == last {
                    found_full_static = true;
                }
            }
            if i == last {
                prefix.push('/');
                if let Some(rp) = self.static_patterns.get(&prefix) {
                    found.insert(rp.normalized_pattern().to_string(), Candidate::bare(rp));
                }
            }
        }

        if !found_full_static {
            if let Some(rp) = self.dynamic_patterns.get(CATCH_ALL) {
                found.insert(
                    CATCH_ALL.to_string(),
                    Candidate {
                        pattern: Arc::clone(rp),
                        params: Params::new(),
                        splat_values: segments.clone(),
                    },
                );
            }
            let mut params = Params::new();
            collect(&self.root, &segments, 0, false, &mut params, &mut found);
        }

        if found.contains_key(CATCH_ALL) {
            let others_allowed = if empty_root.is_some() { 2 } else { 1 };
            if found.len() > others_allowed {
                found.remove(CATCH_ALL);
            }
        }

        if found.len() < 2 {
            return finalize(found, false, segments.len());
        }

        let longest = found
            .values()
            .map(|c| c.pattern.segment_count())
            .max()
            .unwrap_or(0);
        let mut longest_by_kind: HashMap<Option<SegmentKind>, String> = HashMap::new();
        for (key, c) in &found {
            if c.pattern.segment_count() == longest {
                longest_by_kind.insert(c.pattern.last_segment_kind(), key.clone());
            }
        }

        found.retain(|_, c| {
            c.pattern.segment_count() >= longest
                || !(c.pattern.is_non_root_splat() || c.pattern.is_index())
        });

        if found.len() < 2 {
            return finalize(found, false, segments.len());
        }

        if longest_by_kind.len() > 1 {
            if let Some(key) = longest_by_kind.get(&Some(SegmentKind::Index)) {
                found.remove(key);
            }
            let dynamic = longest_by_kind.get(&Some(SegmentKind::Dynamic));
            let splat = longest_by_kind.get(&Some(SegmentKind::Splat));
            if let (Some(dynamic), Some(splat)) = (dynamic, splat) {
                if segments.len() == longest {
                    found.remove(splat);
                } else if segments.len() > longest {
                    found.remove(dynamic);
                }
            }
        }

        finalize(found, false, segments.len())
    }
}

/// Record dynamic and splat patterns along every viable branch
fn collect(
    node: &SegmentNode,
    segments: &[String],
    depth: usize,
    via_splat: bool,
    params: &mut Params,
    found: &mut Candidates,
) {
    if let Some(rp) = &node.pattern {
        // static patterns come from the prefix walk; the root splat is handled by the caller
        if !rp.is_static() && rp.normalized_pattern() != CATCH_ALL {
            let splat_values = if via_splat && depth < segments.len() {
                segments[depth..].to_vec()
            } else {
                Vec::new()
            };
            found.insert(
                rp.normalized_pattern().to_string(),
                Candidate {
                    pattern: Arc::clone(rp),
                    params: params.clone(),
                    splat_values,
                },
            );
        }
    }

    if depth == segments.len() && !via_splat {
        if let Some(rp) = &node.index {
            if !rp.is_static() {
                found.insert(
                    rp.normalized_pattern().to_string(),
                    Candidate {
                        pattern: Arc::clone(rp),
                        params: params.clone(),
                        splat_values: Vec::new(),
                    },
                );
            }
        }
    }

    if depth >= segments.len() {
        return;
    }

    let segment = &segments[depth];

    if let Some(child) = node.static_children.get(segment) {
        collect(child, segments, depth + 1, false, params, found);
    }

    for (name, child) in &node.dynamic_children {
        let previous = params.insert(name.clone(), segment.clone());
        collect(child, segments, depth + 1, false, params, found);
        match previous {
            Some(v) => {
                params.insert(name.clone(), v);
            }
            None => {
                params.remove(name);
            }
        }
    }

    if let Some(child) = &node.splat_child {
        // a splat consumes the rest without advancing
        collect(child, segments, depth, true, params, found);
    }
}

fn finalize(found: Candidates, is_root_path: bool, real_segment_count: usize) -> Option<NestedMatches> {
    let mut results: Vec<Candidate> = found.into_values().collect();
    results.sort_by(|a, b| {
        a.pattern
            .is_index()
            .cmp(&b.pattern.is_index())
            .then_with(|| a.pattern.segment_count().cmp(&b.pattern.segment_count()))
            .then_with(|| a.pattern.normalized_pattern().cmp(b.pattern.normalized_pattern()))
    });

    let last = results.last()?;

    if !is_root_path && results.len() == 1 && last.pattern.is_empty_root() {
        return None;
    }

    if !last.pattern.is_non_root_splat() && last.pattern.normalized_pattern() != CATCH_ALL {
        let pattern_len = last.pattern.segment_count();
        if pattern_len < real_segment_count {
            return None;
        }
        if pattern_len == real_segment_count
            && last.pattern.dynamic_param_count() > 0
            && last.params.is_empty()
        {
            return None;
        }
    }

    let params = last.params.clone();
    let splat_values = last.splat_values.clone();
    Some(NestedMatches {
        params,
        splat_values,
        matches: results.into_iter().map(|c| c.pattern).collect(),
    })
}
