//! # Block Mutations
//!
//! Every user intent is a [`Mutation`]. [`reduce`] maps the current editor
//! state and one mutation to the next state without touching anything
//! else, so each intent is computed in full before anything is committed.
//!
//! ## Mutation Semantics
//!
//! ### Referential misses
//! - An intent naming a block that no longer exists is a no-op
//! - So is one naming a parent that no longer exists
//!
//! ### Ordering
//! - Insertion indices clamp to `[0, sibling_count]`; `None` appends
//! - Touched sibling groups are renumbered to a dense `0..n-1`, keeping the
//!   relative order of untouched siblings
//!
//! ### Delete / Cut
//! - Removes the block and its whole subtree
//! - Clears the selection if it was inside the removed set
//!
//! ### Duplicate / Paste
//! - Clone a whole subtree under fresh IDs, rewriting internal parent links
//! - The new root lands after the original (duplicate) or at the requested
//!   slot (paste) and becomes selected
//!
//! ### MoveToContainer
//! - Descendants travel with the moved block
//! - Moving a block into itself or its own subtree is rejected

use std::collections::{HashMap, HashSet};

use pagecraft_common::{IdGenerator, UuidGenerator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{Block, BlockId, BlockPatch, Props};
use crate::registry::ComponentRegistry;
use crate::store::BlockStore;

/// Generated IDs that collide with existing blocks are retried this many times
/// before falling back to a random UUID
const MAX_ID_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// User intents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Mutation {
    /// Create a block from registry defaults overridden by `props`
    AddBlock {
        component_name: String,
        insert_at: Option<usize>,
        props: Option<Props>,
        parent_id: Option<BlockId>,
    },

    /// Shallow-merge into a block's props
    UpdateBlock { id: BlockId, props: Props },

    /// Merge top-level fields; props still merge
    UpdateBlockFull { id: BlockId, patch: BlockPatch },

    SetVisibility { id: BlockId, visible: bool },

    /// Remove a block and its subtree
    DeleteBlock { id: BlockId },

    /// Clone a block and its subtree right after the original
    DuplicateBlock { id: BlockId },

    /// Move the block at flat index `start_index` to `end_index`
    ReorderBlocks { start_index: usize, end_index: usize },

    /// Swap with the adjacent sibling
    MoveBlock { id: BlockId, direction: Direction },

    /// Reparent a block (and its subtree); `None` targets root level
    MoveToContainer {
        id: BlockId,
        target_container_id: Option<BlockId>,
        insert_at: Option<usize>,
    },

    CopyBlock { id: BlockId },

    /// Copy, then delete, as one step
    CutBlock { id: BlockId },

    PasteBlock {
        parent_id: Option<BlockId>,
        insert_at: Option<usize>,
    },

    /// Clear the page
    Reset,
}

impl Mutation {
    /// Short name used for history descriptions and logs
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::AddBlock { .. } => "add",
            Mutation::UpdateBlock { .. } => "update",
            Mutation::UpdateBlockFull { .. } => "updateFull",
            Mutation::SetVisibility { .. } => "setVisibility",
            Mutation::DeleteBlock { .. } => "delete",
            Mutation::DuplicateBlock { .. } => "duplicate",
            Mutation::ReorderBlocks { .. } => "reorder",
            Mutation::MoveBlock { .. } => "move",
            Mutation::MoveToContainer { .. } => "moveToContainer",
            Mutation::CopyBlock { .. } => "copy",
            Mutation::CutBlock { .. } => "cut",
            Mutation::PasteBlock { .. } => "paste",
            Mutation::Reset => "reset",
        }
    }

    /// The block this intent acts on, if it names one
    pub fn target(&self) -> Option<&BlockId> {
        match self {
            Mutation::UpdateBlock { id, .. }
            | Mutation::UpdateBlockFull { id, .. }
            | Mutation::SetVisibility { id, .. }
            | Mutation::DeleteBlock { id }
            | Mutation::DuplicateBlock { id }
            | Mutation::MoveBlock { id, .. }
            | Mutation::MoveToContainer { id, .. }
            | Mutation::CopyBlock { id }
            | Mutation::CutBlock { id } => Some(id),
            Mutation::AddBlock { .. }
            | Mutation::ReorderBlocks { .. }
            | Mutation::PasteBlock { .. }
            | Mutation::Reset => None,
        }
    }

    /// Purely visual edits that leave structure and content alone
    pub fn is_cosmetic(&self) -> bool {
        matches!(self, Mutation::SetVisibility { .. })
    }
}

/// Why an intent did not change the tree. `Display` is user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Target container not found: {0}")]
    ParentNotFound(BlockId),

    #[error("Cannot move {block} into its own subtree ({target})")]
    CycleDetected { block: BlockId, target: BlockId },

    #[error("Block {0} cannot contain other blocks")]
    NotAContainer(BlockId),

    #[error("Clipboard is empty")]
    ClipboardEmpty,

    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Block is already at the edge of its group")]
    AtBoundary,

    #[error("Index {index} out of range for {len} blocks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Nothing changed")]
    Unchanged,
}

/// Result of applying a mutation through an [`EditSession`](crate::EditSession)
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    /// Tree changed; `created` lists blocks that did not exist before
    Applied { version: u64, created: Vec<BlockId> },

    /// Clipboard written, tree untouched
    Copied { blocks: usize },

    /// Intent had no effect (stale reference, boundary, empty clipboard)
    Noop { reason: SkipReason },

    /// Intent refused because it would break the tree or lose data
    Rejected { reason: SkipReason },
}

impl MutationResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationResult::Applied { .. })
    }

    /// Blocks created by this mutation (empty unless applied)
    pub fn created(&self) -> &[BlockId] {
        match self {
            MutationResult::Applied { created, .. } => created,
            _ => &[],
        }
    }

    pub fn reason(&self) -> Option<&SkipReason> {
        match self {
            MutationResult::Noop { reason } | MutationResult::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_clipboard_empty(&self) -> bool {
        matches!(
            self,
            MutationResult::Noop {
                reason: SkipReason::ClipboardEmpty
            }
        )
    }
}

/// An intent that leaves the state as it was
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    Noop(SkipReason),
    Rejected(SkipReason),
}

impl From<Skip> for MutationResult {
    fn from(skip: Skip) -> Self {
        match skip {
            Skip::Noop(reason) => MutationResult::Noop { reason },
            Skip::Rejected(reason) => MutationResult::Rejected { reason },
        }
    }
}

/// The tree plus the selection that must stay consistent with it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorState {
    pub blocks: BlockStore,
    pub selected: Option<BlockId>,
}

impl EditorState {
    pub fn new(blocks: BlockStore) -> Self {
        Self {
            blocks,
            selected: None,
        }
    }
}

/// Next state produced by [`reduce`]
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub state: EditorState,
    pub created: Vec<BlockId>,
}

impl Reduction {
    fn new(blocks: BlockStore, selected: Option<BlockId>) -> Self {
        Self {
            state: EditorState { blocks, selected },
            created: Vec::new(),
        }
    }

    fn with_created(mut self, created: Vec<BlockId>) -> Self {
        self.created = created;
        self
    }
}

/// Collaborators a reduction may consult
pub struct ReduceContext<'a> {
    pub ids: &'a mut dyn IdGenerator,
    pub registry: &'a dyn ComponentRegistry,

    /// Refuse to nest blocks under components that cannot have children
    pub enforce_containers: bool,

    /// Captured blocks available to `PasteBlock` (already TTL-checked)
    pub clipboard: Option<&'a [Block]>,
}

/// Compute the state that follows `mutation`.
///
/// `CopyBlock` never changes the tree and `CutBlock` has the tree effect of
/// `DeleteBlock`; writing the clipboard is the caller's job.
pub fn reduce(
    state: &EditorState,
    mutation: &Mutation,
    ctx: &mut ReduceContext<'_>,
) -> Result<Reduction, Skip> {
    match mutation {
        Mutation::AddBlock {
            component_name,
            insert_at,
            props,
            parent_id,
        } => apply_add(
            state,
            component_name,
            *insert_at,
            props.as_ref(),
            parent_id.as_ref(),
            ctx,
        ),

        Mutation::UpdateBlock { id, props } => update_one(state, id, |b| b.merge_props(props)),

        Mutation::UpdateBlockFull { id, patch } => update_one(state, id, |b| b.apply_patch(patch)),

        Mutation::SetVisibility { id, visible } => update_one(state, id, |b| b.is_visible = *visible),

        Mutation::DeleteBlock { id } | Mutation::CutBlock { id } => apply_delete(state, id),

        Mutation::DuplicateBlock { id } => apply_duplicate(state, id, ctx),

        Mutation::ReorderBlocks {
            start_index,
            end_index,
        } => apply_reorder(state, *start_index, *end_index),

        Mutation::MoveBlock { id, direction } => apply_move(state, id, *direction),

        Mutation::MoveToContainer {
            id,
            target_container_id,
            insert_at,
        } => apply_move_to_container(state, id, target_container_id.as_ref(), *insert_at, ctx),

        Mutation::CopyBlock { id } => {
            if state.blocks.contains(id) {
                Err(Skip::Noop(SkipReason::Unchanged))
            } else {
                Err(not_found(id))
            }
        }

        Mutation::PasteBlock {
            parent_id,
            insert_at,
        } => apply_paste(state, parent_id.as_ref(), *insert_at, ctx),

        Mutation::Reset => apply_reset(state),
    }
}

fn not_found(id: &BlockId) -> Skip {
    Skip::Noop(SkipReason::BlockNotFound(id.clone()))
}

fn apply_add(
    state: &EditorState,
    component_name: &str,
    insert_at: Option<usize>,
    props: Option<&Props>,
    parent_id: Option<&BlockId>,
    ctx: &mut ReduceContext<'_>,
) -> Result<Reduction, Skip> {
    if let Some(parent) = parent_id {
        check_container(state, parent, ctx)?;
    }

    let id = fresh_id(ctx, &state.blocks, &HashSet::new());
    let mut block = Block::new(id.clone(), component_name);
    block.props = ctx.registry.default_props(component_name);
    if let Some(props) = props {
        block.merge_props(props);
    }
    block.parent_id = parent_id.cloned();

    let mut blocks = state.blocks.blocks().to_vec();
    blocks.push(block);
    place(&mut blocks, &id, insert_at);

    Ok(Reduction::new(BlockStore::normalized(blocks), Some(id.clone())).with_created(vec![id]))
}

fn update_one(
    state: &EditorState,
    id: &BlockId,
    edit: impl FnOnce(&mut Block),
) -> Result<Reduction, Skip> {
    let mut blocks = state.blocks.blocks().to_vec();
    let block = blocks
        .iter_mut()
        .find(|b| &b.id == id)
        .ok_or_else(|| not_found(id))?;
    edit(block);

    Ok(Reduction::new(
        BlockStore::normalized(blocks),
        state.selected.clone(),
    ))
}

fn apply_delete(state: &EditorState, id: &BlockId) -> Result<Reduction, Skip> {
    let doomed = state.blocks.subtree_ids(id);
    if doomed.is_empty() {
        return Err(not_found(id));
    }

    let blocks = state
        .blocks
        .iter()
        .filter(|b| !doomed.contains(&b.id))
        .cloned()
        .collect();
    let selected = state.selected.clone().filter(|s| !doomed.contains(s));

    Ok(Reduction::new(BlockStore::normalized(blocks), selected))
}

fn apply_duplicate(
    state: &EditorState,
    id: &BlockId,
    ctx: &mut ReduceContext<'_>,
) -> Result<Reduction, Skip> {
    let original = state.blocks.get(id).ok_or_else(|| not_found(id))?;

    let subtree: Vec<Block> = state.blocks.descendants_of(id).into_iter().cloned().collect();
    let mut copies = remap_ids(&subtree, &state.blocks, ctx);
    let Some(root) = copies.first_mut() else {
        return Err(not_found(id));
    };
    root.parent_id = original.parent_id.clone();
    let new_root = root.id.clone();
    let created = copies.iter().map(|b| b.id.clone()).collect();

    let mut blocks = state.blocks.blocks().to_vec();
    blocks.extend(copies);
    place(&mut blocks, &new_root, Some(original.sort_order as usize + 1));

    Ok(Reduction::new(BlockStore::normalized(blocks), Some(new_root)).with_created(created))
}

fn apply_reorder(state: &EditorState, start: usize, end: usize) -> Result<Reduction, Skip> {
    let len = state.blocks.len();
    if start >= len {
        return Err(Skip::Noop(SkipReason::IndexOutOfRange { index: start, len }));
    }
    let end = end.min(len - 1);
    if start == end {
        return Err(Skip::Noop(SkipReason::Unchanged));
    }

    let mut blocks = state.blocks.blocks().to_vec();
    let moved = blocks.remove(start);
    blocks.insert(end, moved);

    // Flat position becomes the sort key; normalizing densifies each group
    for (position, block) in blocks.iter_mut().enumerate() {
        block.sort_order = position as u32;
    }

    Ok(Reduction::new(
        BlockStore::normalized(blocks),
        state.selected.clone(),
    ))
}

fn apply_move(state: &EditorState, id: &BlockId, direction: Direction) -> Result<Reduction, Skip> {
    let block = state.blocks.get(id).ok_or_else(|| not_found(id))?;
    let siblings = state.blocks.children_of(block.parent_id.as_ref());
    let position = siblings
        .iter()
        .position(|b| &b.id == id)
        .ok_or_else(|| not_found(id))?;

    let neighbor = match direction {
        Direction::Up => position.checked_sub(1),
        Direction::Down => Some(position + 1).filter(|&n| n < siblings.len()),
    }
    .ok_or(Skip::Noop(SkipReason::AtBoundary))?;
    let neighbor_id = siblings[neighbor].id.clone();

    let mut blocks = state.blocks.blocks().to_vec();
    for b in blocks.iter_mut() {
        if &b.id == id {
            b.sort_order = neighbor as u32;
        } else if b.id == neighbor_id {
            b.sort_order = position as u32;
        }
    }

    Ok(Reduction::new(
        BlockStore::normalized(blocks),
        state.selected.clone(),
    ))
}

fn apply_move_to_container(
    state: &EditorState,
    id: &BlockId,
    target: Option<&BlockId>,
    insert_at: Option<usize>,
    ctx: &ReduceContext<'_>,
) -> Result<Reduction, Skip> {
    if !state.blocks.contains(id) {
        return Err(not_found(id));
    }
    if let Some(target) = target {
        if !state.blocks.contains(target) {
            return Err(Skip::Noop(SkipReason::ParentNotFound(target.clone())));
        }
        // Walk up from the target; meeting `id` means the move would close a loop
        if state.blocks.is_within(target, id) {
            return Err(Skip::Rejected(SkipReason::CycleDetected {
                block: id.clone(),
                target: target.clone(),
            }));
        }
        check_container(state, target, ctx)?;
    }

    let mut blocks = state.blocks.blocks().to_vec();
    if let Some(block) = blocks.iter_mut().find(|b| &b.id == id) {
        block.parent_id = target.cloned();
    }
    place(&mut blocks, id, insert_at);

    Ok(Reduction::new(
        BlockStore::normalized(blocks),
        state.selected.clone(),
    ))
}

fn apply_paste(
    state: &EditorState,
    parent_id: Option<&BlockId>,
    insert_at: Option<usize>,
    ctx: &mut ReduceContext<'_>,
) -> Result<Reduction, Skip> {
    let captured = ctx
        .clipboard
        .filter(|blocks| !blocks.is_empty())
        .ok_or(Skip::Noop(SkipReason::ClipboardEmpty))?;
    if let Some(parent) = parent_id {
        check_container(state, parent, ctx)?;
    }

    let mut pasted = remap_ids(captured, &state.blocks, ctx);
    let created = pasted.iter().map(|b| b.id.clone()).collect();

    let mut roots = Vec::new();
    for block in pasted.iter_mut().filter(|b| b.parent_id.is_none()) {
        block.parent_id = parent_id.cloned();
        // Park after every existing sibling until placed
        block.sort_order = u32::MAX;
        roots.push(block.id.clone());
    }

    let mut blocks = state.blocks.blocks().to_vec();
    blocks.extend(pasted);
    for (offset, root) in roots.iter().enumerate() {
        place(&mut blocks, root, insert_at.map(|at| at.saturating_add(offset)));
    }

    Ok(Reduction::new(BlockStore::normalized(blocks), roots.into_iter().next()).with_created(created))
}

fn apply_reset(state: &EditorState) -> Result<Reduction, Skip> {
    if state.blocks.is_empty() && state.selected.is_none() {
        return Err(Skip::Noop(SkipReason::Unchanged));
    }
    Ok(Reduction::new(BlockStore::new(), None))
}

/// The parent must exist and, when enforced, be allowed to have children
fn check_container(
    state: &EditorState,
    parent: &BlockId,
    ctx: &ReduceContext<'_>,
) -> Result<(), Skip> {
    let block = state
        .blocks
        .get(parent)
        .ok_or_else(|| Skip::Noop(SkipReason::ParentNotFound(parent.clone())))?;

    if ctx.enforce_containers && !ctx.registry.can_have_children(&block.component_name) {
        return Err(Skip::Rejected(SkipReason::NotAContainer(parent.clone())));
    }
    Ok(())
}

/// Position `id` at `insert_at` within its sibling group (clamped; `None`
/// appends) and renumber the group densely
fn place(blocks: &mut [Block], id: &BlockId, insert_at: Option<usize>) {
    let Some(target) = blocks.iter().position(|b| &b.id == id) else {
        return;
    };
    let parent = blocks[target].parent_id.clone();

    let mut siblings: Vec<(u32, usize)> = blocks
        .iter()
        .enumerate()
        .filter(|(i, b)| *i != target && b.parent_id == parent)
        .map(|(i, b)| (b.sort_order, i))
        .collect();
    siblings.sort_unstable();

    let mut order: Vec<usize> = siblings.into_iter().map(|(_, i)| i).collect();
    let at = insert_at.unwrap_or(order.len()).min(order.len());
    order.insert(at, target);

    for (rank, i) in order.into_iter().enumerate() {
        blocks[i].sort_order = rank as u32;
    }
}

fn fresh_id(ctx: &mut ReduceContext<'_>, store: &BlockStore, taken: &HashSet<BlockId>) -> BlockId {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = BlockId::new(ctx.ids.next_id());
        if !store.contains(&id) && !taken.contains(&id) {
            return id;
        }
    }
    BlockId::new(UuidGenerator.next_id())
}

/// Clone `blocks` under fresh IDs through one old-to-new mapping.
///
/// Parent links inside the set follow the mapping; links that leave the set
/// become `None`, marking the clone's roots. Repeated IDs keep their first
/// occurrence.
pub(crate) fn remap_ids(
    blocks: &[Block],
    store: &BlockStore,
    ctx: &mut ReduceContext<'_>,
) -> Vec<Block> {
    let mut mapping: HashMap<&BlockId, BlockId> = HashMap::with_capacity(blocks.len());
    let mut taken = HashSet::with_capacity(blocks.len());
    let mut unique = Vec::with_capacity(blocks.len());

    for block in blocks {
        if mapping.contains_key(&block.id) {
            continue;
        }
        let id = fresh_id(ctx, store, &taken);
        taken.insert(id.clone());
        mapping.insert(&block.id, id);
        unique.push(block);
    }

    unique
        .into_iter()
        .filter_map(|block| {
            let id = mapping.get(&block.id)?.clone();
            let mut copy = block.clone();
            copy.id = id;
            copy.parent_id = block
                .parent_id
                .as_ref()
                .and_then(|parent| mapping.get(parent).cloned());
            Some(copy)
        })
        .collect()
}
