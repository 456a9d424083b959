//! Text operations on string entries and delimited fields.

use std::collections::BTreeSet;

use quilt_data::{ReplaceMode, TextOperationDef, TextOperationKind};

use crate::invariant::Caseless;
use crate::token::{Contextual, TokenLookup, TokenString};

/// Where a text operation writes.
#[derive(Debug, Clone)]
pub enum TextTarget {
    /// `["Entries", key]`
    Entry(TokenString),
    /// `["Fields", key, field]`
    Field { entry: TokenString, field: TokenString },
}

/// A text operation with its token strings.
#[derive(Debug, Clone)]
pub struct TextOperation {
    pub kind: TextOperationKind,
    pub target: TextTarget,
    pub value: Option<TokenString>,
    pub search: Option<TokenString>,
    pub delimiter: String,
    pub replace_mode: ReplaceMode,
}

impl TextOperation {
    /// Build from a validated declaration; `None` if the target path is malformed.
    pub fn from_def(def: &TextOperationDef, tokens: &dyn TokenLookup) -> Option<TextOperation> {
        let parse = |raw: &str| TokenString::parse(raw, tokens);
        let target = match def.target.as_slice() {
            [root, key] if root.eq_ignore_ascii_case("entries") => TextTarget::Entry(parse(key)),
            [root, key, field] if root.eq_ignore_ascii_case("fields") => TextTarget::Field {
                entry: parse(key),
                field: parse(field),
            },
            _ => return None,
        };
        Some(TextOperation {
            kind: def.operation,
            target,
            value: def.value.as_deref().map(parse),
            search: def.search.as_deref().map(parse),
            delimiter: def.delimiter.clone().unwrap_or_default(),
            replace_mode: def.replace_mode.unwrap_or_default(),
        })
    }

    /// Every token string in the operation.
    pub(crate) fn strings(&self) -> Vec<&TokenString> {
        let mut strings = match &self.target {
            TextTarget::Entry(key) => vec![key],
            TextTarget::Field { entry, field } => vec![entry, field],
        };
        strings.extend(self.value.iter());
        strings.extend(self.search.iter());
        strings
    }

    /// Apply the operation to the current text; `None` if its tokens aren't ready.
    pub fn apply_to(&self, current: &str) -> Option<String> {
        match self.kind {
            TextOperationKind::Append => {
                let value = self.value.as_ref()?.value()?;
                Some(join_nonempty(current, &self.delimiter, value))
            },
            TextOperationKind::Prepend => {
                let value = self.value.as_ref()?.value()?;
                Some(join_nonempty(value, &self.delimiter, current))
            },
            TextOperationKind::RemoveDelimited => {
                let search = self.search.as_ref()?.value()?;
                Some(remove_delimited(current, &self.delimiter, search, self.replace_mode))
            },
        }
    }
}

impl Contextual for TextOperation {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        let mut changed = false;
        match &mut self.target {
            TextTarget::Entry(key) => changed |= key.update(tokens),
            TextTarget::Field { entry, field } => {
                changed |= entry.update(tokens);
                changed |= field.update(tokens);
            },
        }
        changed |= self.value.update(tokens);
        changed |= self.search.update(tokens);
        changed
    }

    fn is_ready(&self) -> bool {
        self.strings().into_iter().all(Contextual::is_ready)
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        for string in self.strings() {
            string.collect_tokens(out);
        }
    }
}

fn join_nonempty(left: &str, delimiter: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left}{delimiter}{right}"),
    }
}

/// Remove delimited values equal to `search` (ignoring case and surrounding whitespace).
pub fn remove_delimited(text: &str, delimiter: &str, search: &str, mode: ReplaceMode) -> String {
    if delimiter.is_empty() {
        return text.to_string();
    }
    let mut parts: Vec<&str> = text.split(delimiter).collect();
    let matches = |part: &&str| part.trim().eq_ignore_ascii_case(search.trim());
    match mode {
        ReplaceMode::All => parts.retain(|part| !matches(part)),
        ReplaceMode::First => {
            if let Some(i) = parts.iter().position(matches) {
                parts.remove(i);
            }
        },
        ReplaceMode::Last => {
            if let Some(i) = parts.iter().rposition(matches) {
                parts.remove(i);
            }
        },
    }
    parts.join(delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenContext;
    use crate::token::Scope;

    fn operation(kind: TextOperationKind, value: Option<&str>, search: Option<&str>, delimiter: &str) -> TextOperation {
        let context = TokenContext::new();
        let def = TextOperationDef {
            operation: kind,
            target: vec!["Entries".into(), "key".into()],
            value: value.map(str::to_string),
            search: search.map(str::to_string),
            delimiter: Some(delimiter.to_string()),
            replace_mode: None,
        };
        let mut op = TextOperation::from_def(&def, &context.lookup(Scope::Global)).unwrap();
        op.update(&context.lookup(Scope::Global));
        op
    }

    #[test]
    fn append_and_prepend_skip_the_delimiter_on_empty_text() {
        let append = operation(TextOperationKind::Append, Some("c"), None, ", ");
        assert_eq!(append.apply_to("a, b").as_deref(), Some("a, b, c"));
        assert_eq!(append.apply_to("").as_deref(), Some("c"));

        let prepend = operation(TextOperationKind::Prepend, Some("z"), None, "/");
        assert_eq!(prepend.apply_to("a/b").as_deref(), Some("z/a/b"));
    }

    #[test]
    fn remove_delimited_modes() {
        assert_eq!(remove_delimited("a b a c a", " ", "A", ReplaceMode::All), "b c");
        assert_eq!(remove_delimited("a b a c a", " ", "a", ReplaceMode::First), "b a c a");
        assert_eq!(remove_delimited("a b a c a", " ", "a", ReplaceMode::Last), "a b a c");
        assert_eq!(remove_delimited("a b", " ", "z", ReplaceMode::All), "a b");

        let op = operation(TextOperationKind::RemoveDelimited, None, Some("x"), ",");
        assert_eq!(op.apply_to("x,y,x").as_deref(), Some("y"));
    }

    #[test]
    fn malformed_targets_are_rejected() {
        let context = TokenContext::new();
        let def = TextOperationDef {
            operation: TextOperationKind::Append,
            target: vec!["Entries".into()],
            value: Some("x".into()),
            search: None,
            delimiter: None,
            replace_mode: None,
        };
        assert!(TextOperation::from_def(&def, &context.lookup(Scope::Global)).is_none());
    }
}
