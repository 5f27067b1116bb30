//! Trie of key-code sequences.
//!
//! Every registered combo is a path from the root; the node at its end holds
//! the [`HotkeyEvent`].  Children are kept in a [`SparseTable`] so a node
//! only pays for the code ranges actually used below it.

use super::table::SparseTable;
use crate::error::EngineError;
use std::fmt;

/// A named combo: an ordered sequence of distinct key codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyEvent {
    name: String,
    codes: Vec<u16>,
}

impl HotkeyEvent {
    pub fn new(name: impl Into<String>, codes: Vec<u16>) -> Result<Self, EngineError> {
        let name = name.into();
        if codes.is_empty() {
            return Err(EngineError::invalid(format!("hotkey {:?} has no codes", name)));
        }
        for (i, code) in codes.iter().enumerate() {
            if codes[..i].contains(code) {
                return Err(EngineError::invalid(format!(
                    "hotkey {:?} repeats code {}",
                    name, code
                )));
            }
        }
        Ok(Self { name, codes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codes(&self) -> &[u16] {
        &self.codes
    }
}

impl fmt::Display for HotkeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.name, self.codes)
    }
}

#[derive(Debug, Default)]
pub struct HotkeyDagNode {
    event: Option<HotkeyEvent>,
    children: SparseTable<HotkeyDagNode>,
}

impl HotkeyDagNode {
    /// The combo ending here, if any.
    pub fn event(&self) -> Option<&HotkeyEvent> {
        self.event.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn is_unused(&self) -> bool {
        self.event.is_none() && self.is_leaf()
    }
}

#[derive(Debug, Default)]
pub struct HotkeyDag {
    root: HotkeyDagNode,
}

impl HotkeyDag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &HotkeyDagNode {
        &self.root
    }

    /// Add the path for `event.codes()` and store `event` at its end.
    pub fn insert(&mut self, event: HotkeyEvent) -> Result<(), EngineError> {
        let mut node = &mut self.root;
        for &code in event.codes() {
            node = node.children.get_or_insert_with(code, HotkeyDagNode::default);
        }
        if let Some(existing) = &node.event {
            return Err(EngineError::AlreadyExists(format!(
                "combo {:?} is taken by {:?}",
                event.codes(),
                existing.name()
            )));
        }
        node.event = Some(event);
        Ok(())
    }

    /// One traversal step.  Never modifies the trie.
    pub fn next<'a>(&self, node: &'a HotkeyDagNode, code: u16) -> Option<&'a HotkeyDagNode> {
        node.children.get(code)
    }

    /// The node reached by following `codes` from the root.
    pub fn walk(&self, codes: &[u16]) -> Option<&HotkeyDagNode> {
        codes
            .iter()
            .try_fold(&self.root, |node, &code| self.next(node, code))
    }

    /// Unlink the combo `codes` and prune the nodes it leaves unused.
    pub fn remove(&mut self, codes: &[u16]) -> Result<HotkeyEvent, EngineError> {
        remove_from(&mut self.root, codes)
            .ok_or_else(|| EngineError::not_found(format!("combo {:?}", codes)))
    }
}

fn remove_from(node: &mut HotkeyDagNode, codes: &[u16]) -> Option<HotkeyEvent> {
    let Some((&code, rest)) = codes.split_first() else {
        return node.event.take();
    };
    let child = node.children.get_mut(code)?;
    let event = remove_from(child, rest)?;
    if child.is_unused() {
        node.children.remove(code);
    }
    Some(event)
}
