//! EditData patches -- entry, field, text and move edits applied through a
//! [`KeyValueEditor`].
//!
//! Edits run in four phases (Entries, Fields, TextOperations, MoveEntries). Each
//! operation is independent: a failure is recorded in the [`ApplyReport`] and the
//! rest of the patch still applies.

use std::collections::BTreeSet;
use std::fmt;

use log::warn;
use serde_json::{Map, Value};

use quilt_data::{MovePosition, PatchDef};

use crate::editor::{DelimitedEditor, DictionaryEditor, EntryKey, KeyValueEditor, MoveResult, value_type};
use crate::invariant::Caseless;
use crate::token::{Contextual, TokenLookup, TokenString};

use super::TokenizedJson;
use super::text::{TextOperation, TextTarget};

/// Separator of fields inside string entries.
pub const FIELD_DELIMITER: char = '/';

/// Set (or, with a null value, remove) one entry.
#[derive(Debug, Clone)]
pub struct EntryEdit {
    pub key: TokenString,
    pub value: TokenizedJson,
}

/// Set (or remove) fields inside one entry.
#[derive(Debug, Clone)]
pub struct FieldEdit {
    pub key: TokenString,
    pub fields: Vec<(TokenString, TokenizedJson)>,
}

#[derive(Debug, Clone)]
pub enum MoveTarget {
    Before(TokenString),
    After(TokenString),
    Position(MovePosition),
}

#[derive(Debug, Clone)]
pub struct MoveEntry {
    pub id: TokenString,
    pub target: MoveTarget,
}

/// One operation that couldn't be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyIssue {
    pub patch: String,
    pub entry: String,
    pub reason: String,
}

impl fmt::Display for ApplyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: can't edit '{}': {}", self.patch, self.entry, self.reason)
    }
}

/// Outcome of applying one patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Number of operations applied.
    pub applied: usize,
    pub issues: Vec<ApplyIssue>,
}

impl ApplyReport {
    pub fn merge(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.issues.extend(other.issues);
    }

    fn issue(&mut self, patch: &str, entry: impl fmt::Display, reason: impl fmt::Display) {
        let issue = ApplyIssue {
            patch: patch.to_string(),
            entry: entry.to_string(),
            reason: reason.to_string(),
        };
        warn!("{issue}");
        self.issues.push(issue);
    }
}

#[derive(Debug, Clone, Default)]
pub struct EditDataPatch {
    pub entries: Vec<EntryEdit>,
    pub fields: Vec<FieldEdit>,
    pub text_operations: Vec<TextOperation>,
    pub move_entries: Vec<MoveEntry>,
}

impl EditDataPatch {
    /// Build the edits from a patch declaration.
    ///
    /// # Errors
    /// - a description of the first malformed text operation or move
    pub fn from_def(def: &PatchDef, tokens: &dyn TokenLookup) -> Result<EditDataPatch, String> {
        let parse = |raw: &str| TokenString::parse(raw, tokens);

        let entries = def
            .entries
            .iter()
            .map(|(key, value)| EntryEdit {
                key: parse(key),
                value: TokenizedJson::parse(value, tokens),
            })
            .collect();

        let fields = def
            .fields
            .iter()
            .map(|(key, fields)| FieldEdit {
                key: parse(key),
                fields: fields
                    .iter()
                    .map(|(field, value)| (parse(field), TokenizedJson::parse(value, tokens)))
                    .collect(),
            })
            .collect();

        let mut text_operations = Vec::with_capacity(def.text_operations.len());
        for operation in &def.text_operations {
            let parsed = TextOperation::from_def(operation, tokens).ok_or_else(|| {
                format!(
                    "text operation target [{}] must be [Entries, key] or [Fields, key, field]",
                    operation.target.join(", ")
                )
            })?;
            text_operations.push(parsed);
        }

        let mut move_entries = Vec::with_capacity(def.move_entries.len());
        for movement in &def.move_entries {
            let target = match (&movement.before_id, &movement.after_id, movement.to_position) {
                (Some(before), None, None) => MoveTarget::Before(parse(before)),
                (None, Some(after), None) => MoveTarget::After(parse(after)),
                (None, None, Some(position)) => MoveTarget::Position(position),
                _ => {
                    return Err(format!(
                        "move of '{}' must set exactly one of BeforeID, AfterID or ToPosition",
                        movement.id
                    ));
                },
            };
            move_entries.push(MoveEntry {
                id: parse(&movement.id),
                target,
            });
        }

        Ok(EditDataPatch {
            entries,
            fields,
            text_operations,
            move_entries,
        })
    }

    /// Every token string in the patch, including string leaves of JSON values.
    pub(crate) fn strings(&self) -> Vec<&TokenString> {
        let mut strings = Vec::new();
        for entry in &self.entries {
            strings.push(&entry.key);
            strings.extend(entry.value.strings());
        }
        for edit in &self.fields {
            strings.push(&edit.key);
            for (field, value) in &edit.fields {
                strings.push(field);
                strings.extend(value.strings());
            }
        }
        for operation in &self.text_operations {
            strings.extend(operation.strings());
        }
        for movement in &self.move_entries {
            strings.push(&movement.id);
            if let MoveTarget::Before(anchor) | MoveTarget::After(anchor) = &movement.target {
                strings.push(anchor);
            }
        }
        strings
    }

    /// Apply every edit to the asset behind `editor`.
    pub fn apply(&self, patch: &str, editor: &mut dyn KeyValueEditor) -> ApplyReport {
        let mut report = ApplyReport::default();
        for edit in &self.entries {
            apply_entry(patch, edit, editor, &mut report);
        }
        for edit in &self.fields {
            apply_fields(patch, edit, editor, &mut report);
        }
        for operation in &self.text_operations {
            apply_text(patch, operation, editor, &mut report);
        }
        for movement in &self.move_entries {
            apply_move(patch, movement, editor, &mut report);
        }
        report
    }
}

impl Contextual for EditDataPatch {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        let mut changed = false;
        for entry in &mut self.entries {
            changed |= entry.key.update(tokens);
            changed |= entry.value.update(tokens);
        }
        for edit in &mut self.fields {
            changed |= edit.key.update(tokens);
            for (field, value) in &mut edit.fields {
                changed |= field.update(tokens);
                changed |= value.update(tokens);
            }
        }
        changed |= self.text_operations.update(tokens);
        for movement in &mut self.move_entries {
            changed |= movement.id.update(tokens);
            if let MoveTarget::Before(anchor) | MoveTarget::After(anchor) = &mut movement.target {
                changed |= anchor.update(tokens);
            }
        }
        changed
    }

    fn is_ready(&self) -> bool {
        self.entries.iter().all(|entry| entry.key.is_ready() && entry.value.is_ready())
            && self
                .fields
                .iter()
                .all(|edit| edit.key.is_ready() && edit.fields.iter().all(|(f, v)| f.is_ready() && v.is_ready()))
            && self.text_operations.is_ready()
            && self.move_entries.iter().all(|movement| match &movement.target {
                MoveTarget::Before(anchor) | MoveTarget::After(anchor) => movement.id.is_ready() && anchor.is_ready(),
                MoveTarget::Position(_) => movement.id.is_ready(),
            })
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        for string in self.strings() {
            string.collect_tokens(out);
        }
    }
}

/// Resolved text of a token string, or an issue if it isn't ready.
fn resolved<'s>(patch: &str, string: &'s TokenString, report: &mut ApplyReport) -> Option<&'s str> {
    let value = string.value();
    if value.is_none() {
        report.issue(patch, string.raw(), "tokens are not ready");
    }
    value
}

fn parse_key(patch: &str, editor: &dyn KeyValueEditor, string: &TokenString, report: &mut ApplyReport) -> Option<EntryKey> {
    let raw = resolved(patch, string, report)?;
    match editor.parse_key(raw) {
        Ok(key) => Some(key),
        Err(err) => {
            report.issue(patch, raw, err);
            None
        },
    }
}

fn apply_entry(patch: &str, edit: &EntryEdit, editor: &mut dyn KeyValueEditor, report: &mut ApplyReport) {
    let Some(key) = parse_key(patch, editor, &edit.key, report) else {
        return;
    };
    let Some(value) = edit.value.value() else {
        report.issue(patch, &key, "value tokens are not ready");
        return;
    };
    let result = if value.is_null() {
        editor.remove_entry(&key).map(|_| ())
    } else {
        editor.set_entry(&key, value.clone())
    };
    match result {
        Ok(()) => report.applied += 1,
        Err(err) => report.issue(patch, &key, err),
    }
}

/// Edit the fields of one entry through a nested editor, then write the entry back.
///
/// String entries are treated as delimited strings and object entries as
/// dictionaries.
fn with_entry_editor(
    editor: &mut dyn KeyValueEditor,
    key: &EntryKey,
    edit: impl FnOnce(&mut dyn KeyValueEditor),
) -> Result<(), String> {
    let current = editor
        .get_entry(key)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "entry not found".to_string())?;
    let updated = match current {
        Value::String(mut text) => {
            edit(&mut DelimitedEditor::new(&mut text, FIELD_DELIMITER));
            Value::String(text)
        },
        Value::Object(mut map) => {
            edit(&mut DictionaryEditor::<Map<String, Value>>::new(&mut map));
            Value::Object(map)
        },
        other => {
            return Err(format!(
                "entry is a {}; fields need an object or a delimited string",
                value_type(&other)
            ));
        },
    };
    editor.set_entry(key, updated).map_err(|err| err.to_string())
}

fn apply_fields(patch: &str, edit: &FieldEdit, editor: &mut dyn KeyValueEditor, report: &mut ApplyReport) {
    let Some(key) = parse_key(patch, editor, &edit.key, report) else {
        return;
    };
    let mut nested = ApplyReport::default();
    let written = with_entry_editor(editor, &key, |fields| {
        for (field, value) in &edit.fields {
            let Some(field_key) = parse_key(patch, fields, field, &mut nested) else {
                continue;
            };
            let label = format!("{key}/{field_key}");
            let Some(value) = value.value() else {
                nested.issue(patch, label, "value tokens are not ready");
                continue;
            };
            let result = if value.is_null() {
                fields.remove_entry(&field_key).map(|_| ())
            } else {
                fields.set_entry(&field_key, value.clone())
            };
            match result {
                Ok(()) => nested.applied += 1,
                Err(err) => nested.issue(patch, label, err),
            }
        }
    });
    match written {
        Ok(()) => report.merge(nested),
        Err(reason) => report.issue(patch, &key, reason),
    }
}

/// Current text of an entry or field; a missing one reads as empty.
fn current_text(editor: &dyn KeyValueEditor, key: &EntryKey) -> Result<String, String> {
    match editor.get_entry(key).map_err(|err| err.to_string())? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(format!("{} is a {}, not text", key, value_type(&other))),
    }
}

fn apply_text(patch: &str, operation: &TextOperation, editor: &mut dyn KeyValueEditor, report: &mut ApplyReport) {
    fn edit_text(editor: &mut dyn KeyValueEditor, key: &EntryKey, operation: &TextOperation) -> Result<(), String> {
        let current = current_text(editor, key)?;
        let updated = operation
            .apply_to(&current)
            .ok_or_else(|| "text operation tokens are not ready".to_string())?;
        editor.set_entry(key, Value::String(updated)).map_err(|err| err.to_string())
    }

    match &operation.target {
        TextTarget::Entry(entry) => {
            let Some(key) = parse_key(patch, editor, entry, report) else {
                return;
            };
            match edit_text(editor, &key, operation) {
                Ok(()) => report.applied += 1,
                Err(reason) => report.issue(patch, &key, reason),
            }
        },
        TextTarget::Field { entry, field } => {
            let Some(key) = parse_key(patch, editor, entry, report) else {
                return;
            };
            let mut nested = ApplyReport::default();
            let written = with_entry_editor(editor, &key, |fields| {
                let Some(field_key) = parse_key(patch, fields, field, &mut nested) else {
                    return;
                };
                match edit_text(fields, &field_key, operation) {
                    Ok(()) => nested.applied += 1,
                    Err(reason) => nested.issue(patch, format!("{key}/{field_key}"), reason),
                }
            });
            match written {
                Ok(()) => report.merge(nested),
                Err(reason) => report.issue(patch, &key, reason),
            }
        },
    }
}

fn apply_move(patch: &str, movement: &MoveEntry, editor: &mut dyn KeyValueEditor, report: &mut ApplyReport) {
    if !editor.can_move_entries() {
        report.issue(
            patch,
            movement.id.raw(),
            format!("{} assets don't have an entry order", editor.kind()),
        );
        return;
    }
    let Some(key) = parse_key(patch, editor, &movement.id, report) else {
        return;
    };
    let result = match &movement.target {
        MoveTarget::Position(position) => editor.move_entry(&key, *position),
        MoveTarget::Before(anchor) | MoveTarget::After(anchor) => {
            let Some(anchor_key) = parse_key(patch, editor, anchor, report) else {
                return;
            };
            let after = matches!(movement.target, MoveTarget::After(_));
            editor.move_entry_relative(&key, &anchor_key, after)
        },
    };
    match result {
        Ok(MoveResult::Success) => report.applied += 1,
        Ok(outcome) => report.issue(patch, &key, outcome),
        Err(err) => report.issue(patch, &key, err),
    }
}
