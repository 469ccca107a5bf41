#![deny(clippy::inefficient_to_string)]

use std::sync::Arc;

use super::core::{parse_segments, Matcher, Params, RegisteredPattern};
use super::radix::SegmentNode;

/// Result of a single-best-match lookup
#[derive(Debug, Clone)]
pub struct BestMatch {
    pattern: Arc<RegisteredPattern>,
    params: Params,
    splat_values: Vec<String>,
}

impl BestMatch {
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &Arc<RegisteredPattern> {
        &self.pattern
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn splat_values(&self) -> &[String] {
        &self.splat_values
    }

    /// Split into `(pattern, params, splat values)`
    #[must_use]
    pub fn into_parts(self) -> (Arc<RegisteredPattern>, Params, Vec<String>) {
        (self.pattern, self.params, self.splat_values)
    }

    fn bare(pattern: &Arc<RegisteredPattern>) -> Self {
        Self {
            pattern: Arc::clone(pattern),
            params: Params::new(),
            splat_values: Vec::new(),
        }
    }
}

impl Matcher {
    /// Find the single most specific pattern matching `real_path`
    ///
    /// Precedence:
    /// 1. an exact static pattern (including a static pattern ending in `/`)
    /// 2. per position, static beats dynamic beats splat, with backtracking
    /// 3. deeper patterns beat shallower ones, so the nearest splat ancestor wins
    ///    for paths longer than any pattern
    /// 4. for `/`, index beats the `""` layout root, which beats the root splat
    ///
    /// A path ending in `/` only matches index patterns or splats beyond an exact static.
    ///
    /// # Returns
    ///
    /// `None` when nothing applies.
    #[must_use]
    pub fn find_best_match(&self, real_path: &str) -> Option<BestMatch> {
        if real_path.is_empty() || real_path == "/" {
            return self.best_root_match();
        }

        if let Some(rp) = self.static_patterns.get(real_path) {
            return Some(BestMatch::bare(rp));
        }

        let segments = parse_segments(real_path);
        if segments.is_empty() {
            return self.best_root_match();
        }
        let trailing_slash = real_path.ends_with('/');
        let mut params = Params::new();

        search(&self.root, &segments, 0, trailing_slash, &mut params).map(
            |(pattern, splat_values)| BestMatch {
                pattern,
                params,
                splat_values,
            },
        )
    }

    fn best_root_match(&self) -> Option<BestMatch> {
        if let Some(rp) = &self.root.index {
            return Some(BestMatch::bare(rp));
        }
        if let Some(rp) = self.static_patterns.get("") {
            return Some(BestMatch::bare(rp));
        }
        self.root.splat_pattern().map(BestMatch::bare)
    }
}

/// Depth-first search in priority order; `params` holds exactly the winning path's params
/// when a match is returned.
fn search(
    node: &SegmentNode,
    segments: &[String],
    depth: usize,
    trailing_slash: bool,
    params: &mut Params,
) -> Option<(Arc<RegisteredPattern>, Vec<String>)> {
    if depth == segments.len() {
        if !trailing_slash {
            if let Some(rp) = &node.pattern {
                return Some((Arc::clone(rp), Vec::new()));
            }
        }
        if let Some(rp) = &node.index {
            return Some((Arc::clone(rp), Vec::new()));
        }
        // a splat captures zero or more segments
        return node
            .splat_pattern()
            .map(|rp| (Arc::clone(rp), Vec::new()));
    }

    let segment = &segments[depth];

    if let Some(child) = node.static_children.get(segment) {
        if let Some(found) = search(child, segments, depth + 1, trailing_slash, params) {
            return Some(found);
        }
    }

    for (name, child) in &node.dynamic_children {
        let previous = params.insert(name.clone(), segment.clone());
        if let Some(found) = search(child, segments, depth + 1, trailing_slash, params) {
            return Some(found);
        }
        // backtrack
        match previous {
            Some(v) => {
                params.insert(name.clone(), v);
            }
            None => {
                params.remove(name);
            }
        }
    }

    node.splat_pattern()
        .map(|rp| (Arc::clone(rp), segments[depth..].to_vec()))
}
