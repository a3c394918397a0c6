//! Canonical idShort path resolution.
//!
//! A path is computed from the stack of nodes visited between the submodel
//! root and the current node. The root contributes no segment. A node whose
//! parent is list-valued contributes its positional index (`Docs[2]`),
//! every other node contributes its `idShort` joined with dots.

use crate::model::{Element, ElementValue};
use anyhow::{bail, Result};

/// Visitation stack plus an optional caller-supplied path prefix.
///
/// The stack always mirrors the walk: push on entry, pop on exit, depth
/// equals tree depth. Path computation is a pure function of the current
/// stack contents.
pub struct PathContext<'a> {
    stack: Vec<&'a Element>,
    base_path: Option<String>,
}

impl<'a> PathContext<'a> {
    pub fn new(base_path: Option<&str>) -> Self {
        Self {
            stack: Vec::new(),
            base_path: base_path
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }

    pub fn offer(&mut self, element: &'a Element) {
        self.stack.push(element);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn location_path(&self) -> Result<String> {
        resolve(&self.stack, self.base_path.as_deref())
    }
}

/// Compute the idShort path for the node on top of `stack`.
///
/// Positions inside list-valued parents are found by node identity, never by
/// value equality: duplicate-valued siblings must map to distinct indices.
/// A missing `idShort` at a non-list level and a child that cannot be found
/// in its parent's list are both resolution errors.
pub fn resolve(stack: &[&Element], base_path: Option<&str>) -> Result<String> {
    let mut built = String::new();

    for i in 1..stack.len() {
        let parent = stack[i - 1];
        let node = stack[i];

        if let Some(ElementValue::Elements(siblings)) = &parent.value {
            let Some(idx) = siblings
                .iter()
                .position(|sibling| std::ptr::eq(sibling, node))
            else {
                bail!(
                    "node {:?} not found by identity in list parent {:?}",
                    node.id_short,
                    parent.id_short
                );
            };
            built.push_str(&format!("[{idx}]"));
        } else {
            let Some(name) = node.id_short.as_deref().filter(|n| !n.is_empty()) else {
                bail!(
                    "node at depth {} has no idShort and is not a list item",
                    i
                );
            };
            if !built.is_empty() {
                built.push('.');
            }
            built.push_str(name);
        }
    }

    Ok(match (base_path, built.is_empty()) {
        (Some(base), false) => format!("{base}.{built}"),
        (Some(base), true) => base.to_string(),
        (None, _) => built,
    })
}
