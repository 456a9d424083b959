//! Patch module --
//!
//! A [`Patch`] is one entry of a content pack's `Changes` list after its token
//! strings and conditions have been resolved against the pack's token scope. The
//! patch caches whether it is ready and matching; the
//! [`PatchManager`](crate::manager::PatchManager) decides when to refresh it and
//! applies it through the asset store.

pub mod edit_data;
pub mod text;

pub use edit_data::{ApplyIssue, ApplyReport, EditDataPatch, EntryEdit, FieldEdit, MoveEntry, MoveTarget};
pub use text::{TextOperation, TextTarget};

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use quilt_data::{ActionKind, AreaDef, PatchDef, PatchMode};

use crate::condition::{ConditionDictionary, ConditionFactory};
use crate::error::DefinitionError;
use crate::invariant::{Caseless, InvariantSet};
use crate::token::{Contextual, Scope, TokenContext, TokenLookup, TokenString};

/// Normalize an asset name for comparison: trimmed, forward slashes only, no
/// leading, trailing or doubled separators.
///
/// ```
/// assert_eq!(quilt_engine::patch::normalize_asset_name(" Data\\\\Objects/ "), "Data/Objects");
/// ```
pub fn normalize_asset_name(name: &str) -> String {
    name.trim()
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A JSON value whose string leaves are token strings.
#[derive(Debug, Clone)]
pub struct TokenizedJson {
    template: Value,
    strings: Vec<TokenString>,
    resolved: Option<Value>,
}

impl TokenizedJson {
    pub fn parse(template: &Value, tokens: &dyn TokenLookup) -> TokenizedJson {
        let mut strings = Vec::new();
        collect_strings(template, tokens, &mut strings);
        TokenizedJson {
            template: template.clone(),
            strings,
            resolved: None,
        }
    }

    /// The value with every placeholder substituted; `None` until ready.
    pub fn value(&self) -> Option<&Value> {
        self.resolved.as_ref()
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    pub fn is_null(&self) -> bool {
        self.template.is_null()
    }

    pub(crate) fn strings(&self) -> &[TokenString] {
        &self.strings
    }

    fn render(&self) -> Option<Value> {
        let mut strings = self.strings.iter();
        substitute(&self.template, &mut strings)
    }
}

fn collect_strings(value: &Value, tokens: &dyn TokenLookup, out: &mut Vec<TokenString>) {
    match value {
        Value::String(text) => out.push(TokenString::parse(text, tokens)),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, tokens, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, tokens, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {},
    }
}

fn substitute<'s>(template: &Value, strings: &mut impl Iterator<Item = &'s TokenString>) -> Option<Value> {
    match template {
        Value::String(_) => strings.next()?.value().map(|text| Value::String(text.to_string())),
        Value::Array(items) => items
            .iter()
            .map(|item| substitute(item, strings))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| Some((key.clone(), substitute(item, strings)?)))
            .collect::<Option<Map<_, _>>>()
            .map(Value::Object),
        other => Some(other.clone()),
    }
}

impl Contextual for TokenizedJson {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        self.strings.update(tokens);
        let resolved = self.render();
        let changed = resolved != self.resolved;
        self.resolved = resolved;
        changed
    }

    fn is_ready(&self) -> bool {
        self.resolved.is_some()
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        self.strings.collect_tokens(out);
    }
}

/// Payload of an image or map patch, passed to the asset store untouched apart
/// from token substitution.
#[derive(Debug, Clone)]
pub struct AreaEdit {
    pub from_file: Option<TokenString>,
    pub from_area: Option<AreaDef>,
    pub to_area: Option<AreaDef>,
    pub patch_mode: Option<PatchMode>,
}

impl AreaEdit {
    /// The payload with its file path resolved; `None` until ready.
    pub fn resolve(&self) -> Option<AreaPatch> {
        let from_file = match &self.from_file {
            Some(file) => Some(normalize_asset_name(file.value()?)),
            None => None,
        };
        Some(AreaPatch {
            from_file,
            from_area: self.from_area,
            to_area: self.to_area,
            patch_mode: self.patch_mode,
        })
    }
}

/// A resolved image or map edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaPatch {
    pub from_file: Option<String>,
    pub from_area: Option<AreaDef>,
    pub to_area: Option<AreaDef>,
    pub patch_mode: Option<PatchMode>,
}

/// What a patch does to its target.
#[derive(Debug, Clone)]
pub enum PatchAction {
    Load { from_file: TokenString },
    EditData(EditDataPatch),
    EditImage(AreaEdit),
    EditMap(AreaEdit),
}

impl PatchAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PatchAction::Load { .. } => ActionKind::Load,
            PatchAction::EditData(_) => ActionKind::EditData,
            PatchAction::EditImage(_) => ActionKind::EditImage,
            PatchAction::EditMap(_) => ActionKind::EditMap,
        }
    }

    fn strings(&self) -> Vec<&TokenString> {
        match self {
            PatchAction::Load { from_file } => vec![from_file],
            PatchAction::EditData(data) => data.strings(),
            PatchAction::EditImage(area) | PatchAction::EditMap(area) => area.from_file.iter().collect(),
        }
    }
}

impl Contextual for PatchAction {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        match self {
            PatchAction::Load { from_file } => from_file.update(tokens),
            PatchAction::EditData(data) => data.update(tokens),
            PatchAction::EditImage(area) | PatchAction::EditMap(area) => area.from_file.update(tokens),
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            PatchAction::Load { from_file } => from_file.is_ready(),
            PatchAction::EditData(data) => data.is_ready(),
            PatchAction::EditImage(area) | PatchAction::EditMap(area) => area.from_file.is_ready(),
        }
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        match self {
            PatchAction::EditData(data) => data.collect_tokens(out),
            _ => {
                for string in self.strings() {
                    string.collect_tokens(out);
                }
            },
        }
    }
}

/// One loaded patch.
#[derive(Debug, Clone)]
pub struct Patch {
    log_name: String,
    pack_id: String,
    order: usize,
    target: TokenString,
    conditions: ConditionDictionary,
    action: PatchAction,
    ready: bool,
    matching: bool,
    revision: u64,
    dirty: bool,
    tokens: BTreeSet<Caseless>,
}

impl Patch {
    /// Build a patch from its declaration, resolving names in the pack's scope.
    ///
    /// # Errors
    /// - any condition error from [`ConditionFactory::parse_conditions`]
    /// - `InvalidTokens` if a token string has placeholders that can't be resolved
    /// - `InvalidPatch` if the action's payload is incomplete
    pub fn from_def(def: &PatchDef, pack_id: &str, order: usize, tokens: &TokenContext) -> Result<Patch, DefinitionError> {
        let scope = Scope::Pack(pack_id);
        let lookup = tokens.lookup(scope);
        let log_name = def
            .log_name
            .clone()
            .unwrap_or_else(|| format!("{pack_id} > {:?} {}", def.action, def.target.trim()));
        let invalid = |reason: &str| DefinitionError::InvalidPatch {
            context: format!("patch '{log_name}'"),
            reason: reason.to_string(),
        };

        let conditions = ConditionFactory::new(tokens, scope).parse_conditions(&def.when)?;
        let target = TokenString::parse(def.target.trim(), &lookup);
        if target.raw().is_empty() {
            return Err(invalid("Target is empty"));
        }

        let area = || AreaEdit {
            from_file: def.from_file.as_deref().map(|file| TokenString::parse(file, &lookup)),
            from_area: def.from_area,
            to_area: def.to_area,
            patch_mode: def.patch_mode,
        };
        let action = match def.action {
            ActionKind::Load => {
                let file = def.from_file.as_deref().ok_or_else(|| invalid("Load patch has no FromFile"))?;
                PatchAction::Load {
                    from_file: TokenString::parse(file, &lookup),
                }
            },
            ActionKind::EditData => {
                PatchAction::EditData(EditDataPatch::from_def(def, &lookup).map_err(|reason| invalid(&reason))?)
            },
            ActionKind::EditImage => {
                if def.from_file.is_none() {
                    return Err(invalid("EditImage patch has no FromFile"));
                }
                PatchAction::EditImage(area())
            },
            ActionKind::EditMap => PatchAction::EditMap(area()),
        };

        let mut bad = InvariantSet::new();
        for string in std::iter::once(&target).chain(action.strings()) {
            for name in string.invalid_tokens() {
                bad.insert(name);
            }
        }
        if !bad.is_empty() {
            return Err(DefinitionError::InvalidTokens {
                context: format!("patch '{log_name}'"),
                tokens: bad.to_vec(),
            });
        }

        let mut used = conditions.token_names();
        target.collect_tokens(&mut used);
        action.collect_tokens(&mut used);

        Ok(Patch {
            log_name,
            pack_id: pack_id.to_string(),
            order,
            target,
            conditions,
            action,
            ready: false,
            matching: false,
            revision: 0,
            dirty: true,
            tokens: used,
        })
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn pack_id(&self) -> &str {
        &self.pack_id
    }

    /// Position of the patch in its pack's `Changes` list.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn target(&self) -> &TokenString {
        &self.target
    }

    /// Normalized target asset name, once the target is ready.
    pub fn target_name(&self) -> Option<String> {
        self.target.value().map(normalize_asset_name)
    }

    pub fn conditions(&self) -> &ConditionDictionary {
        &self.conditions
    }

    pub fn action(&self) -> &PatchAction {
        &self.action
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True if the patch is ready and its conditions match.
    pub fn is_matching(&self) -> bool {
        self.matching
    }

    /// Bumped every time the resolved content of the patch changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True until the patch has been updated at least once.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Names of every token the patch reads.
    pub fn tokens(&self) -> &BTreeSet<Caseless> {
        &self.tokens
    }

    /// Re-resolve token strings and conditions. Returns true if readiness, matching
    /// or content changed.
    pub fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        let mut content = self.target.update(tokens);
        content |= self.action.update(tokens);
        if content {
            self.revision += 1;
        }

        let evaluation = self.conditions.evaluate(tokens);
        let ready = self.target.is_ready() && self.action.is_ready() && evaluation.is_some();
        let matching = ready && evaluation == Some(true);
        let flags = ready != self.ready || matching != self.matching;
        self.ready = ready;
        self.matching = matching;
        self.dirty = false;
        content || flags
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_name)
    }
}
