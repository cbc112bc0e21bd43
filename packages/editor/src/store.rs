//! # Block Store
//!
//! The canonical flat list of blocks for one page, plus the read-only
//! structural queries the renderer and navigator use.
//!
//! The tree is a flat table with a `parent_id` foreign key rather than nodes
//! owning child arrays. Every store handed out by the engine is in canonical
//! form:
//!
//! - sibling groups are numbered densely `0..n-1`
//! - the list is in pre-order (roots by `sort_order`, each followed by its
//!   subtree), so flat indices have a stable meaning

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::block::{Block, BlockId};
use crate::errors::EditorError;

/// A broken structural invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("duplicate block id: {0}")]
    DuplicateId(BlockId),

    #[error("block {child} references missing parent {parent}")]
    DanglingParent { child: BlockId, parent: BlockId },

    #[error("block {0} is its own ancestor")]
    Cycle(BlockId),

    #[error("sibling group under {} is not densely ordered", parent_label(.parent))]
    SparseOrder { parent: Option<BlockId> },

    #[error("selected block {0} is not in the tree")]
    DanglingSelection(BlockId),
}

fn parent_label(parent: &Option<BlockId>) -> String {
    match parent {
        Some(id) => id.to_string(),
        None => "<root>".to_string(),
    }
}

/// Immutable-per-snapshot block list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BlockStore {
    blocks: Vec<Block>,
}

impl BlockStore {
    /// Empty page
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted blocks, validating every invariant
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, InvariantViolation> {
        check_blocks(&blocks)?;
        Ok(Self::normalized(blocks))
    }

    /// Decode and validate a persisted snapshot
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let blocks: Vec<Block> = serde_json::from_str(json)?;
        Ok(Self::from_blocks(blocks)?)
    }

    /// Encode the snapshot handed to the persistence layer
    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string_pretty(&self.blocks)?)
    }

    /// Bring a block list into canonical form.
    ///
    /// Each sibling group is stably sorted by its existing `sort_order`
    /// (ties keep flat-list order) and renumbered densely; the list is then
    /// laid out in pre-order. Blocks unreachable from a root are dropped, so
    /// callers must keep parent references resolvable.
    pub(crate) fn normalized(blocks: Vec<Block>) -> Self {
        let mut groups: HashMap<Option<BlockId>, Vec<usize>> = HashMap::new();
        for (index, block) in blocks.iter().enumerate() {
            groups.entry(block.parent_id.clone()).or_default().push(index);
        }

        let mut rank = vec![0u32; blocks.len()];
        for members in groups.values_mut() {
            members.sort_by_key(|&i| (blocks[i].sort_order, i));
            for (position, &i) in members.iter().enumerate() {
                rank[i] = position as u32;
            }
        }

        let mut order = Vec::with_capacity(blocks.len());
        let mut visited = vec![false; blocks.len()];
        let mut stack: Vec<usize> = groups
            .get(&None)
            .map(|roots| roots.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut visited[i], true) {
                continue;
            }
            order.push(i);
            if let Some(children) = groups.get(&Some(blocks[i].id.clone())) {
                stack.extend(children.iter().rev().copied());
            }
        }

        let mut slots: Vec<Option<Block>> = blocks.into_iter().map(Some).collect();
        let blocks = order
            .into_iter()
            .filter_map(|i| {
                slots[i].take().map(|mut block| {
                    block.sort_order = rank[i];
                    block
                })
            })
            .collect();

        Self { blocks }
    }

    /// All blocks in canonical pre-order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.get(id).is_some()
    }

    /// Flat-list index of a block
    pub fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    /// Children of `parent_id` (`None` for root level), ordered by `sort_order`
    pub fn children_of(&self, parent_id: Option<&BlockId>) -> Vec<&Block> {
        let mut children: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|b| b.parent_id.as_ref() == parent_id)
            .collect();
        children.sort_by_key(|b| b.sort_order);
        children
    }

    /// Root-level blocks in render order
    pub fn roots(&self) -> Vec<&Block> {
        self.children_of(None)
    }

    /// The block itself followed by all nested descendants, pre-order.
    /// Empty if `id` is unknown.
    pub fn descendants_of(&self, id: &BlockId) -> Vec<&Block> {
        let Some(root) = self.get(id) else {
            return Vec::new();
        };

        let mut children: HashMap<&BlockId, Vec<&Block>> = HashMap::new();
        for block in &self.blocks {
            if let Some(parent) = &block.parent_id {
                children.entry(parent).or_default().push(block);
            }
        }
        for group in children.values_mut() {
            group.sort_by_key(|b| b.sort_order);
        }

        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(block) = stack.pop() {
            if !visited.insert(&block.id) {
                continue;
            }
            result.push(block);
            if let Some(group) = children.get(&block.id) {
                stack.extend(group.iter().rev().copied());
            }
        }
        result
    }

    /// IDs of the block and its whole subtree, found by expanding the set
    /// over `parent_id` until it stops growing
    pub fn subtree_ids(&self, id: &BlockId) -> HashSet<BlockId> {
        let mut ids = HashSet::new();
        if !self.contains(id) {
            return ids;
        }
        ids.insert(id.clone());

        loop {
            let before = ids.len();
            for block in &self.blocks {
                if let Some(parent) = &block.parent_id {
                    if ids.contains(parent) && !ids.contains(&block.id) {
                        ids.insert(block.id.clone());
                    }
                }
            }
            if ids.len() == before {
                return ids;
            }
        }
    }

    /// Ancestors of a block, nearest first
    pub fn ancestors_of(&self, id: &BlockId) -> Vec<&Block> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get(id).and_then(|b| b.parent_id.as_ref());

        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            match self.get(parent_id) {
                Some(parent) => {
                    result.push(parent);
                    current = parent.parent_id.as_ref();
                }
                None => break,
            }
        }
        result
    }

    /// Nesting depth, 0 for roots
    pub fn depth_of(&self, id: &BlockId) -> Option<usize> {
        self.get(id).map(|_| self.ancestors_of(id).len())
    }

    /// True if `id` is `ancestor` or sits anywhere beneath it
    pub fn is_within(&self, id: &BlockId, ancestor: &BlockId) -> bool {
        id == ancestor || self.ancestors_of(id).iter().any(|b| &b.id == ancestor)
    }

    /// Check every structural invariant
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        check_blocks(&self.blocks)
    }
}

impl<'a> IntoIterator for &'a BlockStore {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

fn check_blocks(blocks: &[Block]) -> Result<(), InvariantViolation> {
    let mut by_id: HashMap<&BlockId, &Block> = HashMap::with_capacity(blocks.len());
    for block in blocks {
        if by_id.insert(&block.id, block).is_some() {
            return Err(InvariantViolation::DuplicateId(block.id.clone()));
        }
    }

    for block in blocks {
        if let Some(parent) = &block.parent_id {
            if !by_id.contains_key(parent) {
                return Err(InvariantViolation::DanglingParent {
                    child: block.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // A parent chain longer than the block count must revisit something
    for block in blocks {
        let mut current = block.parent_id.as_ref();
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == &block.id || steps > blocks.len() {
                return Err(InvariantViolation::Cycle(block.id.clone()));
            }
            steps += 1;
            current = by_id.get(parent).and_then(|b| b.parent_id.as_ref());
        }
    }

    let mut groups: HashMap<Option<&BlockId>, Vec<u32>> = HashMap::new();
    for block in blocks {
        groups
            .entry(block.parent_id.as_ref())
            .or_default()
            .push(block.sort_order);
    }
    for (parent, mut orders) in groups {
        orders.sort_unstable();
        if orders.iter().enumerate().any(|(i, &o)| o != i as u32) {
            return Err(InvariantViolation::SparseOrder {
                parent: parent.cloned(),
            });
        }
    }

    Ok(())
}
