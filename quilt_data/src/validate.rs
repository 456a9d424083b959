use std::collections::HashSet;
use std::fmt;

use crate::*;

/// Structural problem found in a content pack declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateName { kind: &'static str, name: String },
    MissingField { field: &'static str, context: String },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateName { kind, name } => {
                write!(f, "duplicate {kind} name '{name}'")
            },
            ValidationError::MissingField { field, context } => {
                write!(f, "missing required field '{field}' ({context})")
            },
            ValidationError::InvalidValue { context } => {
                write!(f, "invalid value ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate the shape of a content pack before the engine builds anything from it.
///
/// Token names and condition keys are not resolved here; the engine reports those
/// when it registers the pack, since they depend on the tokens available at runtime.
///
/// ```
/// use quilt_data::{ActionKind, ContentPackDef, PatchDef, validate_pack};
///
/// let mut patch = PatchDef::new(ActionKind::Load, "Portraits/Abigail");
/// patch.from_file = Some("assets/abigail.png".into());
/// let pack = ContentPackDef {
///     id: "Example.Portraits".into(),
///     changes: vec![patch],
///     ..ContentPackDef::default()
/// };
/// assert!(validate_pack(&pack).is_empty());
/// ```
pub fn validate_pack(pack: &ContentPackDef) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if pack.id.trim().is_empty() {
        errors.push(ValidationError::MissingField {
            field: "Id",
            context: "content pack".to_string(),
        });
    }

    let mut config_names = HashSet::new();
    for (name, field) in &pack.config_schema {
        if !config_names.insert(name.to_lowercase()) {
            errors.push(ValidationError::DuplicateName {
                kind: "config field",
                name: name.clone(),
            });
        }
        validate_config_field(name, field, &mut errors);
    }

    for token in &pack.dynamic_tokens {
        if token.name.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "Name",
                context: "dynamic token".to_string(),
            });
        } else if config_names.contains(&token.name.to_lowercase()) {
            errors.push(ValidationError::DuplicateName {
                kind: "token",
                name: token.name.clone(),
            });
        }
    }

    for (index, patch) in pack.changes.iter().enumerate() {
        let context = patch_context(index, patch);
        validate_patch(patch, &context, &mut errors);
    }

    errors
}

/// Check one config field declaration, appending any problems to `errors`.
pub fn validate_config_field(name: &str, field: &ConfigFieldDef, errors: &mut Vec<ValidationError>) {
    let allowed: HashSet<String> = field
        .allow_values
        .as_deref()
        .map(split_values)
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.to_lowercase())
        .collect();
    let defaults = field.default.as_deref().map(split_values).unwrap_or_default();

    if !allowed.is_empty() {
        for value in &defaults {
            if !allowed.contains(&value.to_lowercase()) {
                errors.push(ValidationError::InvalidValue {
                    context: format!("config field '{name}' default '{value}' is not an allowed value"),
                });
            }
        }
    }
    if !field.allow_multiple && defaults.len() > 1 {
        errors.push(ValidationError::InvalidValue {
            context: format!("config field '{name}' has multiple defaults but AllowMultiple is false"),
        });
    }
    if !field.allow_blank && defaults.is_empty() {
        errors.push(ValidationError::InvalidValue {
            context: format!("config field '{name}' has no default but AllowBlank is false"),
        });
    }
}

/// Check one patch declaration, appending any problems to `errors`.
///
/// `context` names the patch in error messages (see [`patch_context`]).
pub fn validate_patch(patch: &PatchDef, context: &str, errors: &mut Vec<ValidationError>) {
    if patch.target.trim().is_empty() {
        errors.push(ValidationError::MissingField {
            field: "Target",
            context: context.to_string(),
        });
    }

    match patch.action {
        ActionKind::Load | ActionKind::EditImage => {
            if patch.from_file.as_deref().is_none_or(|file| file.trim().is_empty()) {
                errors.push(ValidationError::MissingField {
                    field: "FromFile",
                    context: context.to_string(),
                });
            }
        },
        ActionKind::EditData => {
            if !patch.has_data_edits() {
                errors.push(ValidationError::InvalidValue {
                    context: format!("{context}: EditData patch has no Entries, Fields, MoveEntries or TextOperations"),
                });
            }
        },
        ActionKind::EditMap => {},
    }

    for (entry, fields) in &patch.fields {
        if fields.is_empty() {
            errors.push(ValidationError::InvalidValue {
                context: format!("{context}: Fields for entry '{entry}' is empty"),
            });
        }
    }

    for movement in &patch.move_entries {
        if movement.id.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "ID",
                context: format!("{context} MoveEntries"),
            });
        }
        if movement.target_count() != 1 {
            errors.push(ValidationError::InvalidValue {
                context: format!(
                    "{context}: MoveEntries entry '{}' must set exactly one of BeforeID, AfterID or ToPosition",
                    movement.id
                ),
            });
        }
    }

    for operation in &patch.text_operations {
        validate_text_operation(operation, context, errors);
    }
}

fn validate_text_operation(operation: &TextOperationDef, context: &str, errors: &mut Vec<ValidationError>) {
    let root = operation.target.first().map(|s| s.to_lowercase());
    let valid_path = match root.as_deref() {
        Some("entries") => operation.target.len() == 2,
        Some("fields") => operation.target.len() == 3,
        _ => false,
    };
    if !valid_path {
        errors.push(ValidationError::InvalidValue {
            context: format!(
                "{context}: TextOperations target [{}] must be [Entries, key] or [Fields, key, field]",
                operation.target.join(", ")
            ),
        });
    }

    match operation.operation {
        TextOperationKind::Append | TextOperationKind::Prepend => {
            if operation.value.is_none() {
                errors.push(ValidationError::MissingField {
                    field: "Value",
                    context: format!("{context} TextOperations"),
                });
            }
        },
        TextOperationKind::RemoveDelimited => {
            if operation.search.is_none() {
                errors.push(ValidationError::MissingField {
                    field: "Search",
                    context: format!("{context} TextOperations"),
                });
            }
            if operation.delimiter.as_deref().is_none_or(str::is_empty) {
                errors.push(ValidationError::MissingField {
                    field: "Delimiter",
                    context: format!("{context} TextOperations"),
                });
            }
        },
    }
}

/// Human-readable name for a patch: its `LogName`, or its position and target.
pub fn patch_context(index: usize, patch: &PatchDef) -> String {
    match &patch.log_name {
        Some(name) => format!("patch '{name}'"),
        None => format!("patch #{index} ({:?} {})", patch.action, patch.target),
    }
}
