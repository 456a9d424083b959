//! Key/value editors -- one editing interface over every kind of data asset.
//!
//! A patch never touches an asset directly. The asset store wraps the asset in the
//! editor matching its shape (dictionary, ordered list, record-like model or
//! delimited string) and hands the patch a `&mut dyn KeyValueEditor`. Entry values
//! cross the interface as [`serde_json::Value`].

pub mod delimited;
pub mod dictionary;
pub mod list;
pub mod model;
pub mod registry;

pub use delimited::DelimitedEditor;
pub use dictionary::{DictionaryAsset, DictionaryEditor};
pub use list::{ListEditor, ListKeyFn};
pub use model::{ModelEditor, ModelSchema};
pub use registry::EditorRegistry;

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use quilt_data::MovePosition;

/// The closed set of editor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorKind {
    Dictionary,
    List,
    Model,
    Delimited,
}

impl fmt::Display for EditorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditorKind::Dictionary => "dictionary",
            EditorKind::List => "list",
            EditorKind::Model => "model",
            EditorKind::Delimited => "delimited string",
        };
        f.write_str(name)
    }
}

/// An entry key after parsing by an editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Key(String),
    Index(usize),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Key(key) => f.write_str(key),
            EntryKey::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Outcome of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Success,
    TargetNotFound,
    AnchorNotFound,
    /// The anchor is the entry being moved.
    AnchorIsMain,
}

impl fmt::Display for MoveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MoveResult::Success => "moved",
            MoveResult::TargetNotFound => "entry to move was not found",
            MoveResult::AnchorNotFound => "anchor entry was not found",
            MoveResult::AnchorIsMain => "entry can't be moved relative to itself",
        };
        f.write_str(text)
    }
}

/// Editor failures other than move outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("{editor} editor does not support {operation}")]
    Unsupported { editor: EditorKind, operation: &'static str },
    #[error("no list key accessor registered for {0}")]
    NoKeyAccessor(&'static str),
    #[error("no model schema registered for {0}")]
    NoModelSchema(&'static str),
    #[error("entry '{0}' not found")]
    EntryNotFound(String),
}

/// Uniform editing interface over a borrowed asset.
pub trait KeyValueEditor {
    fn kind(&self) -> EditorKind;

    fn can_add_entries(&self) -> bool {
        true
    }

    fn can_move_entries(&self) -> bool {
        false
    }

    /// Parse a key as written in a patch.
    ///
    /// # Errors
    /// - `InvalidKey` if the text can't address an entry of this asset
    fn parse_key(&self, raw: &str) -> Result<EntryKey, EditError>;

    fn has_entry(&self, key: &EntryKey) -> bool;

    /// Current value of an entry, or `None` if it doesn't exist.
    ///
    /// # Errors
    /// - if the entry can't be represented as a JSON value
    fn get_entry(&self, key: &EntryKey) -> Result<Option<Value>, EditError>;

    /// JSON type name of an entry (`"string"`, `"object"`, ...).
    fn get_entry_type(&self, key: &EntryKey) -> Option<&'static str> {
        self.get_entry(key).ok().flatten().as_ref().map(value_type)
    }

    /// Remove an entry. Returns false if it didn't exist.
    ///
    /// # Errors
    /// - if the asset can't drop the entry
    fn remove_entry(&mut self, key: &EntryKey) -> Result<bool, EditError>;

    /// Add or replace an entry.
    ///
    /// # Errors
    /// - `InvalidValue` if the value doesn't fit the entry type
    /// - `EntryNotFound` if the entry doesn't exist and the editor can't add entries
    fn set_entry(&mut self, key: &EntryKey, value: Value) -> Result<(), EditError>;

    /// Move an entry to the top or bottom.
    ///
    /// # Errors
    /// - `Unsupported` for editors without an entry order
    fn move_entry(&mut self, key: &EntryKey, position: MovePosition) -> Result<MoveResult, EditError> {
        let _ = (key, position);
        Err(EditError::Unsupported {
            editor: self.kind(),
            operation: "moving entries",
        })
    }

    /// Move an entry directly before (or after) an anchor entry.
    ///
    /// # Errors
    /// - `Unsupported` for editors without an entry order
    fn move_entry_relative(&mut self, key: &EntryKey, anchor: &EntryKey, after: bool) -> Result<MoveResult, EditError> {
        let _ = (key, anchor, after);
        Err(EditError::Unsupported {
            editor: self.kind(),
            operation: "moving entries",
        })
    }
}

/// JSON type name of a value.
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn to_value<T: serde::Serialize>(key: &EntryKey, item: &T) -> Result<Value, EditError> {
    serde_json::to_value(item).map_err(|err| EditError::InvalidValue {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

pub(crate) fn from_value<T: serde::de::DeserializeOwned>(key: &EntryKey, value: Value) -> Result<T, EditError> {
    serde_json::from_value(value).map_err(|err| EditError::InvalidValue {
        key: key.to_string(),
        reason: err.to_string(),
    })
}
