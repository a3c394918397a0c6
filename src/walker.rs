//! Depth-first traversal of a submodel tree.
//!
//! Implemented with an explicit frame stack instead of language recursion so
//! that arbitrarily deep payloads cannot blow the call stack. A visited set
//! keyed on node identity guards against revisiting, even though well-formed
//! payloads are acyclic.

use crate::model::Element;
use crate::path::PathContext;
use std::collections::HashSet;
use tracing::warn;

struct Frame<'a> {
    node: &'a Element,
    next_child: usize,
}

/// Visit `root` and every descendant in declared order.
///
/// Each node is pushed onto `ctx` before `on_node` runs for it and popped
/// when its subtree is exhausted, so `ctx` always holds the exact path from
/// the root to the node being visited. The pop happens on every exit path;
/// sibling processing never sees a stale stack.
pub fn walk<'a, F>(ctx: &mut PathContext<'a>, root: &'a Element, mut on_node: F)
where
    F: FnMut(&PathContext<'a>, &'a Element),
{
    let mut visited: HashSet<*const Element> = HashSet::new();
    let mut frames: Vec<Frame<'a>> = Vec::new();

    visited.insert(root as *const Element);
    ctx.offer(root);
    on_node(ctx, root);
    frames.push(Frame {
        node: root,
        next_child: 0,
    });

    while let Some(frame) = frames.last_mut() {
        let children = frame.node.children();
        if frame.next_child < children.len() {
            let child = &children[frame.next_child];
            frame.next_child += 1;

            if !visited.insert(child as *const Element) {
                warn!(
                    id_short = child.id_short.as_deref().unwrap_or("<unnamed>"),
                    "skipping already-visited node in submodel tree"
                );
                continue;
            }

            ctx.offer(child);
            on_node(ctx, child);
            frames.push(Frame {
                node: child,
                next_child: 0,
            });
        } else {
            frames.pop();
            ctx.pop();
        }
    }
}
