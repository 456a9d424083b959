#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const QUILT_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod condition;
pub mod config;
pub mod constraint;
pub mod editor;
pub mod error;
pub mod human_sort;
pub mod invariant;
pub mod loader;
pub mod manager;
pub mod patch;
pub mod snapshot;
pub mod store;
pub mod token;

// Re-exports for convenience
pub use condition::{ConditionDictionary, ConditionFactory, ConditionKey, ConditionType};
pub use config::{ConfigField, ConfigToken};
pub use constraint::ConstraintSet;
pub use editor::{EditError, EditorKind, EditorRegistry, EntryKey, KeyValueEditor, MoveResult};
pub use error::{ConflictError, DefinitionError, TokenError};
pub use invariant::{Caseless, InvariantSet};
pub use loader::{PackLoadReport, load_pack_def, load_snapshot, load_user_config};
pub use manager::{AssetStore, PatchManager, RefreshReport};
pub use patch::{ApplyIssue, ApplyReport, Patch, PatchAction};
pub use snapshot::GameSnapshot;
pub use store::MemoryStore;
pub use token::{Scope, Token, TokenContext, TokenLookup, TokenString};
