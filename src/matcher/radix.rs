//! Segment tree shared by both matching modes
//!
//! Every registered pattern except the empty-string root is stored along the path of its
//! segments:
//! - static segments live in a hash map keyed by the literal text
//! - dynamic segments live in an ordered list so distinct param names at the same depth
//!   (e.g. `/users/:id/posts` vs `/users/:user_id/comments`) can coexist
//! - a splat hangs off its parent as a dedicated child
//! - an index pattern is stored on the node of the path it indexes
//!
//! Lookups walk static children first, then dynamic children with backtracking, then the
//! splat child, which gives the priority order the best-match search relies on.

use std::collections::HashMap;
use std::sync::Arc;

use super::core::{RegisteredPattern, Segment, SegmentKind};

#[derive(Clone, Default)]
pub(crate) struct SegmentNode {
    /// Non-index pattern terminating at this node
    pub(crate) pattern: Option<Arc<RegisteredPattern>>,
    /// Index pattern for the path ending at this node
    pub(crate) index: Option<Arc<RegisteredPattern>>,
    pub(crate) static_children: HashMap<String, SegmentNode>,
    /// `(param name, child)` in registration order
    pub(crate) dynamic_children: Vec<(String, SegmentNode)>,
    pub(crate) splat_child: Option<Box<SegmentNode>>,
}

impl SegmentNode {
    pub(crate) fn insert(&mut self, segments: &[Segment], pattern: Arc<RegisteredPattern>) {
        let Some((segment, remaining)) = segments.split_first() else {
            self.pattern = Some(pattern);
            return;
        };

        match segment.kind {
            SegmentKind::Index => {
                self.index = Some(pattern);
            }
            SegmentKind::Static => {
                self.static_children
                    .entry(segment.value.clone())
                    .or_default()
                    .insert(remaining, pattern);
            }
            SegmentKind::Dynamic => {
                if let Some((_, child)) = self
                    .dynamic_children
                    .iter_mut()
                    .find(|(name, _)| *name == segment.value)
                {
                    child.insert(remaining, pattern);
                    return;
                }
                let mut child = SegmentNode::default();
                child.insert(remaining, pattern);
                self.dynamic_children.push((segment.value.clone(), child));
            }
            SegmentKind::Splat => {
                self.splat_child
                    .get_or_insert_with(Box::default)
                    .insert(remaining, pattern);
            }
        }
    }

    /// Pattern registered on this node's splat child, if any
    #[inline]
    pub(crate) fn splat_pattern(&self) -> Option<&Arc<RegisteredPattern>> {
        self.splat_child.as_ref().and_then(|c| c.pattern.as_ref())
    }
}
