//! Delimited-string editor: fields of a `/`-style delimited string, numbered from 1.

use serde_json::Value;

use super::{EditError, EditorKind, EntryKey, KeyValueEditor};

/// How many empty fields a single set may pad onto the end of the string.
pub const MAX_FIELD_PADDING: usize = 256;

/// Editor over a borrowed delimited string.
///
/// Field numbers in keys start at 1. Setting a field past the end pads the string
/// with empty fields, and removing a field blanks it so later fields keep their
/// positions.
pub struct DelimitedEditor<'a> {
    text: &'a mut String,
    delimiter: char,
}

impl<'a> DelimitedEditor<'a> {
    pub fn new(text: &'a mut String, delimiter: char) -> Self {
        Self { text, delimiter }
    }

    fn fields(&self) -> Vec<&str> {
        self.text.split(self.delimiter).collect()
    }

    fn store(&mut self, fields: &[String]) {
        let mut delimiter = [0u8; 4];
        *self.text = fields.join(&*self.delimiter.encode_utf8(&mut delimiter));
    }

    fn index(key: &EntryKey) -> Result<usize, EditError> {
        match key {
            EntryKey::Index(index) => Ok(*index),
            EntryKey::Key(raw) => Err(EditError::InvalidKey {
                key: raw.clone(),
                reason: "delimited fields are addressed by number".to_string(),
            }),
        }
    }
}

impl KeyValueEditor for DelimitedEditor<'_> {
    fn kind(&self) -> EditorKind {
        EditorKind::Delimited
    }

    fn parse_key(&self, raw: &str) -> Result<EntryKey, EditError> {
        match raw.trim().parse::<usize>() {
            Ok(position) if position >= 1 => Ok(EntryKey::Index(position - 1)),
            _ => Err(EditError::InvalidKey {
                key: raw.to_string(),
                reason: "field number must be 1 or higher".to_string(),
            }),
        }
    }

    fn has_entry(&self, key: &EntryKey) -> bool {
        Self::index(key).is_ok_and(|index| index < self.fields().len())
    }

    fn get_entry(&self, key: &EntryKey) -> Result<Option<Value>, EditError> {
        let index = Self::index(key)?;
        Ok(self.fields().get(index).map(|field| Value::String((*field).to_string())))
    }

    fn get_entry_type(&self, key: &EntryKey) -> Option<&'static str> {
        self.has_entry(key).then_some("string")
    }

    /// Blank the field; later fields keep their positions.
    fn remove_entry(&mut self, key: &EntryKey) -> Result<bool, EditError> {
        let index = Self::index(key)?;
        let mut fields: Vec<String> = self.fields().into_iter().map(str::to_string).collect();
        let Some(field) = fields.get_mut(index) else {
            return Ok(false);
        };
        field.clear();
        self.store(&fields);
        Ok(true)
    }

    fn set_entry(&mut self, key: &EntryKey, value: Value) -> Result<(), EditError> {
        let index = Self::index(key)?;
        let value = match value {
            Value::String(text) => text,
            Value::Null => String::new(),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(EditError::InvalidValue {
                    key: key.to_string(),
                    reason: "delimited fields only hold text".to_string(),
                });
            },
        };
        if value.contains(self.delimiter) {
            return Err(EditError::InvalidValue {
                key: key.to_string(),
                reason: format!("value contains the delimiter '{}'", self.delimiter),
            });
        }
        let mut fields: Vec<String> = self.fields().into_iter().map(str::to_string).collect();
        if index >= fields.len() {
            if index - fields.len() > MAX_FIELD_PADDING {
                return Err(EditError::InvalidKey {
                    key: key.to_string(),
                    reason: format!("field is more than {MAX_FIELD_PADDING} past the end of the text"),
                });
            }
            fields.resize(index + 1, String::new());
        }
        fields[index] = value;
        self.store(&fields);
        Ok(())
    }
}
