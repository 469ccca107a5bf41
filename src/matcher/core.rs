#![deny(clippy::inefficient_to_string)]

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::radix::SegmentNode;

/// Matched dynamic params, keyed by param name (without the prefix rune)
pub type Params = HashMap<String, String>;

/// Type tag of one normalized pattern segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Static,
    Dynamic,
    Splat,
    Index,
}

/// One normalized pattern segment
///
/// For dynamic segments `value` holds the param name, for splats it is `*`, and for
/// index segments it is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub value: String,
}

/// Options controlling pattern syntax
#[derive(Debug, Clone)]
pub struct MatcherOptions {
    /// Prefix marking a dynamic segment (default `:`)
    pub dynamic_param_prefix: char,
    /// Segment marking a trailing splat (default `*`)
    pub splat_segment: char,
    /// Explicit index marker such as `_index`; empty means "trailing slash"
    pub explicit_index_segment: String,
    /// Suppress duplicate-registration warnings
    pub quiet: bool,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            dynamic_param_prefix: ':',
            splat_segment: '*',
            explicit_index_segment: String::new(),
            quiet: false,
        }
    }
}

/// Errors raised while compiling a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// A splat appeared somewhere other than the last segment
    SplatNotTrailing(String),
    /// The pattern contained an empty segment (`//`)
    EmptySegment(String),
    /// The explicit index segment option contained a slash
    InvalidIndexSegment(String),
    /// The pattern is already registered with a router
    Duplicate(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::SplatNotTrailing(p) => {
                write!(f, "splat segment must be the last segment in pattern '{p}'")
            }
            PatternError::EmptySegment(p) => write!(f, "empty segment in pattern '{p}'"),
            PatternError::InvalidIndexSegment(s) => {
                write!(f, "explicit index segment '{s}' cannot contain a slash")
            }
            PatternError::Duplicate(p) => write!(
                f,
                "Pattern '{p}' is already registered. Each pattern may only be registered once."
            ),
        }
    }
}

impl std::error::Error for PatternError {}

/// A compiled, immutable pattern
#[derive(Debug)]
pub struct RegisteredPattern {
    original: String,
    normalized: String,
    shape: String,
    segments: Vec<Segment>,
    dynamic_param_count: usize,
}

impl RegisteredPattern {
    /// The pattern exactly as it was registered
    #[inline]
    #[must_use]
    pub fn original_pattern(&self) -> &str {
        &self.original
    }

    /// The pattern rewritten with `:`/`*` markers and a trailing slash for indexes
    #[inline]
    #[must_use]
    pub fn normalized_pattern(&self) -> &str {
        &self.normalized
    }

    /// The normalized pattern with param names erased (`/users/:`)
    ///
    /// Two patterns with the same shape match exactly the same paths, so a router only
    /// ever reaches the first of them.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &str {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments; an index marker counts as one
    #[inline]
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn last_segment_kind(&self) -> Option<SegmentKind> {
        self.segments.last().map(|s| s.kind)
    }

    #[must_use]
    pub fn dynamic_param_count(&self) -> usize {
        self.dynamic_param_count
    }

    #[must_use]
    pub fn is_index(&self) -> bool {
        self.last_segment_kind() == Some(SegmentKind::Index)
    }

    #[must_use]
    pub fn is_splat(&self) -> bool {
        self.last_segment_kind() == Some(SegmentKind::Splat)
    }

    /// True for splats below the root, e.g. `/files/*` but not `/*`
    #[must_use]
    pub fn is_non_root_splat(&self) -> bool {
        self.is_splat() && self.segments.len() > 1
    }

    /// True for the universal layout root `""`
    #[must_use]
    pub fn is_empty_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when no segment is dynamic or a splat
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s.kind, SegmentKind::Static | SegmentKind::Index))
    }
}

/// Pattern registry plus the segment tree used for matching
///
/// `Matcher` is `Clone` so owners that publish immutable snapshots can build a new
/// matcher from the current one without touching readers of the old value.
#[derive(Clone)]
pub struct Matcher {
    pub(super) static_patterns: HashMap<String, Arc<RegisteredPattern>>,
    pub(super) dynamic_patterns: HashMap<String, Arc<RegisteredPattern>>,
    pub(super) root: SegmentNode,
    opts: MatcherOptions,
}

impl Matcher {
    /// Create an empty matcher
    ///
    /// An explicit index segment containing `/` cannot be expressed in a path, so it is
    /// discarded with a warning and the matcher falls back to trailing-slash indexes.
    /// Use [`Matcher::try_new`] to surface that as an error instead.
    #[must_use]
    pub fn new(opts: MatcherOptions) -> Self {
        match Self::try_new(opts.clone()) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Ignoring invalid explicit index segment");
                Self::build(MatcherOptions {
                    explicit_index_segment: String::new(),
                    ..opts
                })
            }
        }
    }

    /// Create an empty matcher, validating the options
    pub fn try_new(opts: MatcherOptions) -> Result<Self, PatternError> {
        if opts.explicit_index_segment.contains('/') {
            return Err(PatternError::InvalidIndexSegment(
                opts.explicit_index_segment,
            ));
        }
        Ok(Self::build(opts))
    }

    fn build(opts: MatcherOptions) -> Self {
        Self {
            static_patterns: HashMap::new(),
            dynamic_patterns: HashMap::new(),
            root: SegmentNode::default(),
            opts,
        }
    }

    #[must_use]
    pub fn options(&self) -> &MatcherOptions {
        &self.opts
    }

    #[must_use]
    pub fn explicit_index_segment(&self) -> &str {
        &self.opts.explicit_index_segment
    }

    #[must_use]
    pub fn dynamic_param_prefix(&self) -> char {
        self.opts.dynamic_param_prefix
    }

    #[must_use]
    pub fn splat_segment(&self) -> char {
        self.opts.splat_segment
    }

    /// Number of registered patterns
    #[must_use]
    pub fn len(&self) -> usize {
        self.static_patterns.len() + self.dynamic_patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a registered pattern by its normalized form
    #[must_use]
    pub fn get(&self, normalized: &str) -> Option<&Arc<RegisteredPattern>> {
        self.static_patterns
            .get(normalized)
            .or_else(|| self.dynamic_patterns.get(normalized))
    }

    /// Compile and register a pattern, panicking on a malformed pattern
    ///
    /// # Panics
    ///
    /// Panics when the pattern cannot be compiled; see [`Matcher::try_register_pattern`].
    pub fn register_pattern(&mut self, pattern: &str) -> Arc<RegisteredPattern> {
        match self.try_register_pattern(pattern) {
            Ok(rp) => rp,
            Err(e) => panic!("invalid route pattern: {e}"),
        }
    }

    /// Compile and register a pattern
    ///
    /// Registering a pattern whose normalized form already exists returns the existing
    /// entry and logs a warning unless the matcher is quiet.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] when the pattern cannot be compiled.
    pub fn try_register_pattern(
        &mut self,
        pattern: &str,
    ) -> Result<Arc<RegisteredPattern>, PatternError> {
        let rp = Arc::new(self.compile(pattern)?);

        if let Some(existing) = self.get(rp.normalized_pattern()) {
            if !self.opts.quiet {
                warn!(
                    pattern = %pattern,
                    normalized = %rp.normalized_pattern(),
                    "Pattern already registered"
                );
            }
            return Ok(Arc::clone(existing));
        }

        if !rp.is_empty_root() {
            self.root.insert(rp.segments(), Arc::clone(&rp));
        }

        let map = if rp.is_static() {
            &mut self.static_patterns
        } else {
            &mut self.dynamic_patterns
        };
        map.insert(rp.normalized_pattern().to_string(), Arc::clone(&rp));

        debug!(
            pattern = %pattern,
            normalized = %rp.normalized_pattern(),
            segments = rp.segment_count(),
            "Pattern registered"
        );
        Ok(rp)
    }

    /// Compile a raw pattern into segments without registering it
    pub(crate) fn compile(&self, raw: &str) -> Result<RegisteredPattern, PatternError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(RegisteredPattern {
                original: String::new(),
                normalized: String::new(),
                shape: String::new(),
                segments: Vec::new(),
                dynamic_param_count: 0,
            });
        }

        let mut path = String::with_capacity(raw.len() + 1);
        if !raw.starts_with('/') {
            path.push('/');
        }
        path.push_str(raw);

        let explicit = &self.opts.explicit_index_segment;
        let (base, is_index) = if explicit.is_empty() {
            (path.as_str(), path.ends_with('/'))
        } else if path == "/" {
            // with an explicit index marker a bare slash is the layout root
            ("", false)
        } else if path.len() > explicit.len()
            && path.ends_with(explicit.as_str())
            && path[..path.len() - explicit.len()].ends_with('/')
        {
            (&path[..path.len() - explicit.len()], true)
        } else {
            (path.strip_suffix('/').unwrap_or(&path), false)
        };

        if base.is_empty() {
            return Ok(RegisteredPattern {
                original: raw.to_string(),
                normalized: String::new(),
                shape: String::new(),
                segments: Vec::new(),
                dynamic_param_count: 0,
            });
        }

        let mut body = &base[1..];
        if is_index {
            // the index marker is appended below
            body = body.strip_suffix('/').unwrap_or(body);
        }
        let parts: Vec<&str> = if is_index && body.is_empty() {
            Vec::new()
        } else {
            body.split('/').collect()
        };

        let splat = self.opts.splat_segment;
        let prefix = self.opts.dynamic_param_prefix;
        let mut segments = Vec::with_capacity(parts.len() + usize::from(is_index));
        let mut dynamic_param_count = 0;

        for (i, part) in parts.iter().enumerate() {
            let is_last = i + 1 == parts.len() && !is_index;
            if part.is_empty() {
                return Err(PatternError::EmptySegment(raw.to_string()));
            }
            let mut chars = part.chars();
            let first = chars.next();
            if first == Some(splat) && chars.as_str().is_empty() {
                if !is_last {
                    return Err(PatternError::SplatNotTrailing(raw.to_string()));
                }
                segments.push(Segment {
                    kind: SegmentKind::Splat,
                    value: "*".to_string(),
                });
            } else if first == Some(prefix) {
                // an unnamed param (`:`) still matches exactly one segment
                let name = chars.as_str();
                dynamic_param_count += 1;
                segments.push(Segment {
                    kind: SegmentKind::Dynamic,
                    value: name.to_string(),
                });
            } else {
                segments.push(Segment {
                    kind: SegmentKind::Static,
                    value: (*part).to_string(),
                });
            }
        }

        if is_index {
            segments.push(Segment {
                kind: SegmentKind::Index,
                value: String::new(),
            });
        }

        Ok(RegisteredPattern {
            original: raw.to_string(),
            normalized: normalize(&segments, true),
            shape: normalize(&segments, false),
            segments,
            dynamic_param_count,
        })
    }
}

fn normalize(segments: &[Segment], with_names: bool) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        match seg.kind {
            SegmentKind::Static => out.push_str(&seg.value),
            SegmentKind::Dynamic => {
                out.push(':');
                if with_names {
                    out.push_str(&seg.value);
                }
            }
            SegmentKind::Splat => out.push('*'),
            SegmentKind::Index => {}
        }
    }
    out
}

/// Remove a single trailing slash (`/` becomes the empty root path)
#[inline]
#[must_use]
pub fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Split a request path into its non-empty segments
#[must_use]
pub fn parse_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
