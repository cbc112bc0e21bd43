//! # Pagecraft Editor
//!
//! Block-tree editing engine for the Pagecraft page builder.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host: canvas, drag & drop, panels           │
//! └─────────────────────────────────────────────┘
//!                     ↓ Mutation
//! ┌─────────────────────────────────────────────┐
//! │ editor: EditSession                         │
//! │  - reduce(state, mutation) → next state     │
//! │  - bounded snapshot history (undo/redo)     │
//! │  - clipboard with TTL, durable store        │
//! │  - selection kept consistent with the tree  │
//! └─────────────────────────────────────────────┘
//!                     ↓ BlockStore
//! ┌─────────────────────────────────────────────┐
//! │ renderer / navigator / persistence          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Flat table, not a node graph**: blocks point at their parent by ID
//! 2. **Pure reductions**: each intent computes a whole new state, then commits
//! 3. **Edits never throw**: stale references and invalid moves are no-ops
//! 4. **Invariants always hold**: acyclic, dense sibling order, no dangling
//!    parents or selection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagecraft_editor::{EditSession, EditorConfig};
//!
//! let mut session = EditSession::new(EditorConfig::default());
//!
//! let section = session.add_block("section", None, None, None).created()[0].clone();
//! session.add_block("text", None, None, Some(&section));
//!
//! session.copy_block(&section);
//! session.paste_block(None, None);
//!
//! session.undo();
//! let json = session.to_json()?;
//! ```

mod block;
mod clipboard;
mod config;
mod errors;
mod history;
mod mutations;
mod registry;
mod session;
mod store;

pub use block::{Block, BlockId, BlockPatch, Props};
pub use clipboard::{
    Clipboard, ClipboardEntry, ClipboardStore, FileClipboardStore, MemoryClipboardStore,
    DEFAULT_CLIPBOARD_TTL,
};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use errors::EditorError;
pub use history::{History, HistoryEntry, DEFAULT_HISTORY_LIMIT};
pub use mutations::{
    reduce, Direction, EditorState, Mutation, MutationResult, ReduceContext, Reduction, Skip,
    SkipReason,
};
pub use registry::{ComponentRegistry, ComponentSpec, EmptyRegistry, StaticRegistry};
pub use session::{EditSession, EditSessionBuilder};
pub use store::{BlockStore, InvariantViolation};

// Re-export common types for convenience
pub use pagecraft_common::{Clock, IdGenerator, ManualClock, SequentialIds, SystemClock, UuidGenerator};
