use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Top-level declaration of a content pack, as authored by a pack creator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ContentPackDef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config_schema: BTreeMap<String, ConfigFieldDef>,
    #[serde(default)]
    pub dynamic_tokens: Vec<DynamicTokenDef>,
    #[serde(default)]
    pub changes: Vec<PatchDef>,
}

/// One configurable field exposed to players.
///
/// `AllowValues` and `Default` are comma-delimited lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFieldDef {
    #[serde(default)]
    pub allow_values: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default = "default_true")]
    pub allow_blank: bool,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for ConfigFieldDef {
    fn default() -> Self {
        Self {
            allow_values: None,
            default: None,
            allow_blank: true,
            allow_multiple: false,
            description: None,
        }
    }
}

/// A pack-local token whose value is chosen by conditions.
///
/// A name may be declared several times; the last entry whose `When` matches wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DynamicTokenDef {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub when: BTreeMap<String, String>,
}

/// Kind of change a patch makes to its target asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Load,
    EditData,
    EditImage,
    EditMap,
}

/// A single entry in a pack's `Changes` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatchDef {
    pub action: ActionKind,
    pub target: String,
    #[serde(default)]
    pub log_name: Option<String>,
    #[serde(default)]
    pub when: BTreeMap<String, String>,
    #[serde(default)]
    pub from_file: Option<String>,

    // EditData
    /// Entry key to new value; `null` removes the entry.
    #[serde(default)]
    pub entries: Map<String, Value>,
    /// Entry key to a map of field key to new value.
    #[serde(default)]
    pub fields: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub move_entries: Vec<MoveEntryDef>,
    #[serde(default)]
    pub text_operations: Vec<TextOperationDef>,

    // EditImage / EditMap
    #[serde(default)]
    pub from_area: Option<AreaDef>,
    #[serde(default)]
    pub to_area: Option<AreaDef>,
    #[serde(default)]
    pub patch_mode: Option<PatchMode>,
}

impl PatchDef {
    /// Create an empty patch of the given kind for a target.
    pub fn new(action: ActionKind, target: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            log_name: None,
            when: BTreeMap::new(),
            from_file: None,
            entries: Map::new(),
            fields: BTreeMap::new(),
            move_entries: Vec::new(),
            text_operations: Vec::new(),
            from_area: None,
            to_area: None,
            patch_mode: None,
        }
    }

    /// True if the patch carries at least one data edit.
    pub fn has_data_edits(&self) -> bool {
        !self.entries.is_empty()
            || !self.fields.is_empty()
            || !self.move_entries.is_empty()
            || !self.text_operations.is_empty()
    }
}

/// Reorders one entry of a list asset.
///
/// Exactly one of `BeforeID`, `AfterID` or `ToPosition` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveEntryDef {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "BeforeID", default)]
    pub before_id: Option<String>,
    #[serde(rename = "AfterID", default)]
    pub after_id: Option<String>,
    #[serde(rename = "ToPosition", default)]
    pub to_position: Option<MovePosition>,
}

impl MoveEntryDef {
    /// Number of move targets set on this entry (valid entries have exactly one).
    pub fn target_count(&self) -> usize {
        usize::from(self.before_id.is_some()) + usize::from(self.after_id.is_some()) + usize::from(self.to_position.is_some())
    }
}

/// Absolute position for a moved list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovePosition {
    Top,
    Bottom,
}

/// Text operation kinds available on string entries and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextOperationKind {
    Append,
    Prepend,
    RemoveDelimited,
}

/// Which occurrences `RemoveDelimited` should remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplaceMode {
    First,
    Last,
    #[default]
    All,
}

/// A text edit applied to an entry (`["Entries", key]`) or field (`["Fields", key, field]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextOperationDef {
    pub operation: TextOperationKind,
    pub target: Vec<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub replace_mode: Option<ReplaceMode>,
}

/// Pixel or tile rectangle used by image and map patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AreaDef {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// How image and map patches merge with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchMode {
    Replace,
    Overlay,
    ReplaceByLayer,
}

/// Split a comma-delimited value list, trimming entries and dropping blanks.
///
/// ```
/// assert_eq!(quilt_data::split_values(" Spring, summer ,,Fall"), vec!["Spring", "summer", "Fall"]);
/// ```
pub fn split_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_true() -> bool {
    true
}
