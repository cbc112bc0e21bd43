//! # Edit Session
//!
//! One page being edited: the live tree, the current selection, the
//! undo history and the clipboard.
//!
//! Every intent enters through [`EditSession::apply`] (the typed helpers
//! just build a [`Mutation`] and call it). The host serializes gestures, so
//! exactly one mutation is in flight at a time and each one is computed in
//! full before it replaces the live state. Compound intents (cut, paste)
//! are single steps: callers never observe the tree between their parts.

use std::sync::Arc;

use pagecraft_common::{Clock, IdGenerator, SystemClock, UuidGenerator};
use tracing::{debug, info, instrument, warn};

use crate::block::{Block, BlockId, BlockPatch, Props};
use crate::clipboard::{Clipboard, ClipboardStore, FileClipboardStore, MemoryClipboardStore};
use crate::config::EditorConfig;
use crate::errors::EditorError;
use crate::history::History;
use crate::mutations::{
    reduce, Direction, EditorState, Mutation, MutationResult, ReduceContext, Skip, SkipReason,
};
use crate::registry::{ComponentRegistry, EmptyRegistry};
use crate::store::{BlockStore, InvariantViolation};

/// Editing engine for one page
pub struct EditSession {
    state: EditorState,
    history: History,
    clipboard: Clipboard,
    registry: Arc<dyn ComponentRegistry>,
    ids: Box<dyn IdGenerator>,
    config: EditorConfig,

    /// Increments whenever the live state changes
    version: u64,
}

/// Assembles an [`EditSession`] with its collaborators
pub struct EditSessionBuilder {
    config: EditorConfig,
    blocks: BlockStore,
    registry: Option<Arc<dyn ComponentRegistry>>,
    ids: Option<Box<dyn IdGenerator>>,
    clock: Option<Arc<dyn Clock>>,
    clipboard_store: Option<Arc<dyn ClipboardStore>>,
}

impl EditSessionBuilder {
    /// Start from an existing (already validated) tree
    pub fn with_blocks(mut self, blocks: BlockStore) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Share a clipboard store between sessions
    pub fn with_clipboard_store(mut self, store: Arc<dyn ClipboardStore>) -> Self {
        self.clipboard_store = Some(store);
        self
    }

    pub fn build(self) -> EditSession {
        let clock = self.clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let store = match self.clipboard_store {
            Some(store) => store,
            None => match &self.config.clipboard_path {
                Some(path) => Arc::new(FileClipboardStore::new(path.clone())) as Arc<dyn ClipboardStore>,
                None => Arc::new(MemoryClipboardStore::new()) as Arc<dyn ClipboardStore>,
            },
        };

        EditSession {
            history: History::new(self.blocks.clone(), self.config.history_limit),
            state: EditorState::new(self.blocks),
            clipboard: Clipboard::new(store, clock, self.config.clipboard_ttl()),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(EmptyRegistry) as Arc<dyn ComponentRegistry>),
            ids: self
                .ids
                .unwrap_or_else(|| Box::new(UuidGenerator) as Box<dyn IdGenerator>),
            config: self.config,
            version: 0,
        }
    }
}

impl EditSession {
    /// Empty page with default collaborators
    pub fn new(config: EditorConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: EditorConfig) -> EditSessionBuilder {
        EditSessionBuilder {
            config,
            blocks: BlockStore::new(),
            registry: None,
            ids: None,
            clock: None,
            clipboard_store: None,
        }
    }

    /// Apply one intent
    #[instrument(skip(self, mutation), fields(mutation = mutation.name()))]
    pub fn apply(&mut self, mutation: Mutation) -> MutationResult {
        match &mutation {
            Mutation::CopyBlock { id } => self.copy(id),
            Mutation::CutBlock { id } => self.cut(&mutation, id),
            Mutation::PasteBlock { .. } => self.paste(&mutation),
            _ => self.commit(&mutation, None),
        }
    }

    fn copy(&mut self, id: &BlockId) -> MutationResult {
        let Some(entry) = self.clipboard.capture(&self.state.blocks, id) else {
            debug!(block_id = %id, "copy skipped, block not found");
            return Skip::Noop(SkipReason::BlockNotFound(id.clone())).into();
        };

        match self.clipboard.put(&entry) {
            Ok(()) => {
                debug!(block_id = %id, blocks = entry.blocks.len(), "copied subtree");
                MutationResult::Copied {
                    blocks: entry.blocks.len(),
                }
            }
            Err(e) => {
                warn!(block_id = %id, error = %e, "clipboard write failed");
                Skip::Rejected(SkipReason::ClipboardUnavailable(e.to_string())).into()
            }
        }
    }

    /// The delete only happens once the subtree is safely on the clipboard
    fn cut(&mut self, mutation: &Mutation, id: &BlockId) -> MutationResult {
        match self.copy(id) {
            MutationResult::Copied { .. } => self.commit(mutation, None),
            other => other,
        }
    }

    fn paste(&mut self, mutation: &Mutation) -> MutationResult {
        let entry = match self.clipboard.current() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "clipboard read failed");
                return Skip::Rejected(SkipReason::ClipboardUnavailable(e.to_string())).into();
            }
        };

        self.commit(mutation, entry.as_ref().map(|e| e.blocks.as_slice()))
    }

    fn commit(&mut self, mutation: &Mutation, clipboard: Option<&[Block]>) -> MutationResult {
        let mut ctx = ReduceContext {
            ids: self.ids.as_mut(),
            registry: self.registry.as_ref(),
            enforce_containers: self.config.enforce_containers,
            clipboard,
        };

        let reduction = match reduce(&self.state, mutation, &mut ctx) {
            Ok(reduction) => reduction,
            Err(skip) => {
                debug!(target_block = ?mutation.target(), ?skip, "mutation skipped");
                return skip.into();
            }
        };
        if reduction.state == self.state {
            return Skip::Noop(SkipReason::Unchanged).into();
        }

        let tree_changed = reduction.state.blocks != self.state.blocks;
        self.state = reduction.state;
        self.version += 1;
        if matches!(mutation, Mutation::Reset) {
            info!(version = self.version, "page reset");
        }

        if tree_changed && (self.config.record_cosmetic_edits || !mutation.is_cosmetic()) {
            self.history
                .commit(self.state.blocks.clone(), mutation.name());
        }

        debug!(
            target_block = ?mutation.target(),
            version = self.version,
            blocks = self.state.blocks.len(),
            "mutation applied"
        );

        MutationResult::Applied {
            version: self.version,
            created: reduction.created,
        }
    }

    // ---- Intents ---------------------------------------------------------

    pub fn add_block(
        &mut self,
        component_name: impl Into<String>,
        insert_at: Option<usize>,
        props: Option<Props>,
        parent_id: Option<&BlockId>,
    ) -> MutationResult {
        self.apply(Mutation::AddBlock {
            component_name: component_name.into(),
            insert_at,
            props,
            parent_id: parent_id.cloned(),
        })
    }

    pub fn update_block(&mut self, id: &BlockId, props: Props) -> MutationResult {
        self.apply(Mutation::UpdateBlock {
            id: id.clone(),
            props,
        })
    }

    pub fn update_block_full(&mut self, id: &BlockId, patch: BlockPatch) -> MutationResult {
        self.apply(Mutation::UpdateBlockFull {
            id: id.clone(),
            patch,
        })
    }

    pub fn set_visibility(&mut self, id: &BlockId, visible: bool) -> MutationResult {
        self.apply(Mutation::SetVisibility {
            id: id.clone(),
            visible,
        })
    }

    pub fn delete_block(&mut self, id: &BlockId) -> MutationResult {
        self.apply(Mutation::DeleteBlock { id: id.clone() })
    }

    pub fn duplicate_block(&mut self, id: &BlockId) -> MutationResult {
        self.apply(Mutation::DuplicateBlock { id: id.clone() })
    }

    pub fn reorder_blocks(&mut self, start_index: usize, end_index: usize) -> MutationResult {
        self.apply(Mutation::ReorderBlocks {
            start_index,
            end_index,
        })
    }

    pub fn move_block(&mut self, id: &BlockId, direction: Direction) -> MutationResult {
        self.apply(Mutation::MoveBlock {
            id: id.clone(),
            direction,
        })
    }

    pub fn move_to_container(
        &mut self,
        id: &BlockId,
        target_container_id: Option<&BlockId>,
        insert_at: Option<usize>,
    ) -> MutationResult {
        self.apply(Mutation::MoveToContainer {
            id: id.clone(),
            target_container_id: target_container_id.cloned(),
            insert_at,
        })
    }

    pub fn copy_block(&mut self, id: &BlockId) -> MutationResult {
        self.apply(Mutation::CopyBlock { id: id.clone() })
    }

    pub fn cut_block(&mut self, id: &BlockId) -> MutationResult {
        self.apply(Mutation::CutBlock { id: id.clone() })
    }

    pub fn paste_block(&mut self, parent_id: Option<&BlockId>, insert_at: Option<usize>) -> MutationResult {
        self.apply(Mutation::PasteBlock {
            parent_id: parent_id.cloned(),
            insert_at,
        })
    }

    pub fn reset(&mut self) -> MutationResult {
        self.apply(Mutation::Reset)
    }

    // ---- History ---------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        self.restore(snapshot);
        debug!(version = self.version, "undo");
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        self.restore(snapshot);
        debug!(version = self.version, "redo");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn restore(&mut self, blocks: BlockStore) {
        let keep_selection = self
            .state
            .selected
            .as_ref()
            .is_some_and(|id| blocks.contains(id));
        if !keep_selection {
            self.state.selected = None;
        }
        self.state.blocks = blocks;
        self.version += 1;
    }

    // ---- Selection -------------------------------------------------------

    /// Select a block; unknown IDs leave the selection unchanged
    pub fn select(&mut self, id: &BlockId) -> bool {
        if !self.state.blocks.contains(id) {
            return false;
        }
        self.state.selected = Some(id.clone());
        true
    }

    pub fn clear_selection(&mut self) {
        self.state.selected = None;
    }

    pub fn selected_block_id(&self) -> Option<&BlockId> {
        self.state.selected.as_ref()
    }

    pub fn selected_block(&self) -> Option<&Block> {
        self.state
            .selected
            .as_ref()
            .and_then(|id| self.state.blocks.get(id))
    }

    // ---- Derived views ---------------------------------------------------

    pub fn blocks(&self) -> &BlockStore {
        &self.state.blocks
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn children_of(&self, parent_id: Option<&BlockId>) -> Vec<&Block> {
        self.state.blocks.children_of(parent_id)
    }

    pub fn roots(&self) -> Vec<&Block> {
        self.state.blocks.roots()
    }

    pub fn descendants_of(&self, id: &BlockId) -> Vec<&Block> {
        self.state.blocks.descendants_of(id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ---- Clipboard -------------------------------------------------------

    /// A live (unexpired) entry is waiting to be pasted
    pub fn has_clipboard(&self) -> bool {
        self.clipboard.has_content()
    }

    pub fn clear_clipboard(&self) -> Result<(), EditorError> {
        self.clipboard.clear()
    }

    // ---- Persistence -----------------------------------------------------

    /// Flat block list for the persistence layer
    pub fn snapshot(&self) -> Vec<Block> {
        self.state.blocks.blocks().to_vec()
    }

    pub fn to_json(&self) -> Result<String, EditorError> {
        self.state.blocks.to_json()
    }

    /// Replace the tree wholesale, clearing selection and history
    pub fn load_snapshot(&mut self, blocks: BlockStore) {
        info!(blocks = blocks.len(), "loading page snapshot");
        self.history.reset(blocks.clone());
        self.state = EditorState::new(blocks);
        self.version += 1;
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), EditorError> {
        let blocks = BlockStore::from_json(json)?;
        self.load_snapshot(blocks);
        Ok(())
    }

    /// Structural invariants plus selection consistency
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.state.blocks.check_invariants()?;
        match &self.state.selected {
            Some(id) if !self.state.blocks.contains(id) => {
                Err(InvariantViolation::DanglingSelection(id.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardEntry;
    use pagecraft_common::{ManualClock, SequentialIds};

    fn session() -> EditSession {
        EditSession::builder(EditorConfig::default())
            .with_id_generator(SequentialIds::from_seed("b"))
            .with_clock(ManualClock::default())
            .build()
    }

    #[test]
    fn test_session_creation() {
        let session = session();
        assert!(session.blocks().is_empty());
        assert_eq!(session.selected_block_id(), None);
        assert!(!session.can_undo());
        assert!(!session.has_clipboard());
        assert_eq!(session.version(), 0);
    }

    #[test]
    fn test_apply_bumps_version_and_history() {
        let mut session = session();
        let result = session.add_block("text", None, None, None);

        assert_eq!(
            result,
            MutationResult::Applied {
                version: 1,
                created: vec!["b-1".into()]
            }
        );
        assert!(session.can_undo());
        assert_eq!(session.undo_description(), Some("add"));
    }

    #[test]
    fn test_unchanged_update_is_not_recorded() {
        let mut session = session();
        session.add_block("text", None, None, None);
        let id = BlockId::from("b-1");

        let result = session.update_block(&id, Props::new());
        assert_eq!(result, MutationResult::Noop { reason: SkipReason::Unchanged });
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_cosmetic_edits_can_skip_history() {
        let config = EditorConfig {
            record_cosmetic_edits: false,
            ..EditorConfig::default()
        };
        let mut session = EditSession::builder(config)
            .with_id_generator(SequentialIds::from_seed("b"))
            .build();
        session.add_block("text", None, None, None);

        assert!(session.set_visibility(&"b-1".into(), false).is_applied());
        assert_eq!(session.history().len(), 2);
        assert!(!session.blocks().get(&"b-1".into()).unwrap().is_visible);
    }

    #[test]
    fn test_select_unknown_block() {
        let mut session = session();
        assert!(!session.select(&"ghost".into()));
        session.add_block("text", None, None, None);
        session.clear_selection();
        assert!(session.select(&"b-1".into()));
        assert_eq!(session.selected_block().unwrap().component_name, "text");
    }

    #[test]
    fn test_undo_clears_vanished_selection() {
        let mut session = session();
        session.add_block("text", None, None, None);
        assert_eq!(session.selected_block_id(), Some(&BlockId::from("b-1")));

        assert!(session.undo());
        assert_eq!(session.selected_block_id(), None);
        session.check_invariants().unwrap();
    }

    #[test]
    fn test_load_snapshot_resets_history() {
        let mut session = session();
        session.add_block("text", None, None, None);

        let blocks = BlockStore::from_blocks(vec![Block::new("x", "image")]).unwrap();
        session.load_snapshot(blocks);

        assert!(!session.can_undo());
        assert_eq!(session.roots()[0].id, BlockId::from("x"));
        assert_eq!(session.selected_block_id(), None);
    }

    #[test]
    fn test_failing_clipboard_keeps_tree_on_cut() {
        struct BrokenStore;

        impl ClipboardStore for BrokenStore {
            fn read(&self) -> Result<Option<ClipboardEntry>, EditorError> {
                Err(EditorError::ClipboardStorage("disk gone".to_string()))
            }
            fn write(&self, _entry: &ClipboardEntry) -> Result<(), EditorError> {
                Err(EditorError::ClipboardStorage("disk gone".to_string()))
            }
            fn clear(&self) -> Result<(), EditorError> {
                Ok(())
            }
        }

        let mut session = EditSession::builder(EditorConfig::default())
            .with_id_generator(SequentialIds::from_seed("b"))
            .with_clipboard_store(Arc::new(BrokenStore))
            .build();
        session.add_block("text", None, None, None);

        let result = session.cut_block(&"b-1".into());
        assert!(matches!(
            result,
            MutationResult::Rejected {
                reason: SkipReason::ClipboardUnavailable(_)
            }
        ));
        assert_eq!(session.blocks().len(), 1);

        let result = session.paste_block(None, None);
        assert!(matches!(result, MutationResult::Rejected { .. }));
        assert_eq!(session.blocks().len(), 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_reset_logs_at_info() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut session = session();
            session.add_block("text", None, None, None);
            assert!(!logs.contents().contains("page reset"));

            assert!(session.reset().is_applied());
        });

        let output = logs.contents();
        assert!(output.contains("INFO"));
        assert!(output.contains("page reset"));
    }
}
