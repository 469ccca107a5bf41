//! # Matcher Module
//!
//! The matcher compiles URL patterns into typed segments and resolves concrete request
//! paths against them. It is the leaf component underneath both the flat
//! [`Router`](crate::router::Router) and the [`NestedRouter`](crate::nested::NestedRouter).
//!
//! ## Pattern Syntax
//!
//! | Pattern          | Meaning                                                  |
//! |------------------|----------------------------------------------------------|
//! | `/users`         | static segment                                           |
//! | `/users/:id`     | dynamic segment, captured as param `id`                  |
//! | `/files/*`       | trailing splat, captures zero or more remaining segments |
//! | `/blog/`         | index of `/blog` (implicit, via trailing slash)          |
//! | `/blog/_index`   | index of `/blog` when an explicit index segment is set   |
//! | `""`             | universal layout root, applies to every path             |
//!
//! The dynamic prefix and splat marker are configurable through [`MatcherOptions`]; stored
//! patterns are always normalized back to `:` and `*`.
//!
//! ## Matching Modes
//!
//! - [`Matcher::find_best_match`] returns the single most specific pattern for a path.
//!   Static segments beat dynamic ones, which beat splats; deeper patterns beat shallower
//!   ones; an index beats the empty-string root, which beats the root splat.
//! - [`Matcher::find_nested_matches`] returns the whole ancestor chain for a path, ordered
//!   by depth with index patterns last, which is what layout hierarchies dispatch on.
//!
//! ## Example
//!
//! ```rust
//! use brrtmux::matcher::{Matcher, MatcherOptions};
//!
//! let mut m = Matcher::new(MatcherOptions::default());
//! m.register_pattern("/users/:id");
//! m.register_pattern("/users/active");
//!
//! let best = m.find_best_match("/users/42").unwrap();
//! assert_eq!(best.params().get("id").map(String::as_str), Some("42"));
//!
//! let best = m.find_best_match("/users/active").unwrap();
//! assert_eq!(best.pattern().original_pattern(), "/users/active");
//! ```
//!
//! ## Performance
//!
//! Both modes walk a segment tree, so lookups cost O(k) in the number of path segments.
//! Fully static paths short-circuit through a hash lookup before the tree is touched.

mod best;
mod core;
mod nested;
mod radix;
#[cfg(test)]
mod tests;

pub use best::BestMatch;
pub use core::{
    parse_segments, strip_trailing_slash, Matcher, MatcherOptions, Params, PatternError,
    RegisteredPattern, Segment, SegmentKind,
};
pub use nested::NestedMatches;
