//! Model editor: edits the fields of a record type through a registered schema.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{EditError, EditorKind, EntryKey, KeyValueEditor, from_value, to_value};

type Getter<T> = Box<dyn Fn(&T, &EntryKey) -> Result<Value, EditError>>;
type Setter<T> = Box<dyn Fn(&mut T, &EntryKey, Value) -> Result<(), EditError>>;

struct ModelField<T> {
    name: String,
    get: Getter<T>,
    set: Setter<T>,
}

/// Field accessors for a record type, built once and registered with the
/// [`EditorRegistry`](super::EditorRegistry).
pub struct ModelSchema<T> {
    fields: Vec<ModelField<T>>,
}

impl<T: 'static> Default for ModelSchema<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T: 'static> ModelSchema<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a field under `name` (matched ignoring case).
    #[must_use]
    pub fn field<F>(mut self, name: &str, get: fn(&T) -> &F, get_mut: fn(&mut T) -> &mut F) -> Self
    where
        F: Serialize + DeserializeOwned + 'static,
    {
        self.fields.push(ModelField {
            name: name.to_string(),
            get: Box::new(move |model, key| to_value(key, get(model))),
            set: Box::new(move |model, key, value| {
                *get_mut(model) = from_value(key, value)?;
                Ok(())
            }),
        });
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    fn find(&self, name: &str) -> Option<&ModelField<T>> {
        self.fields.iter().find(|field| field.name.eq_ignore_ascii_case(name))
    }
}

/// Editor over one borrowed record.
pub struct ModelEditor<'a, T> {
    model: &'a mut T,
    schema: &'a ModelSchema<T>,
}

impl<'a, T: 'static> ModelEditor<'a, T> {
    pub fn new(model: &'a mut T, schema: &'a ModelSchema<T>) -> Self {
        Self { model, schema }
    }

    fn field(&self, key: &EntryKey) -> Option<&'a ModelField<T>> {
        match key {
            EntryKey::Key(name) => self.schema.find(name),
            EntryKey::Index(_) => None,
        }
    }
}

impl<T: 'static> KeyValueEditor for ModelEditor<'_, T> {
    fn kind(&self) -> EditorKind {
        EditorKind::Model
    }

    fn can_add_entries(&self) -> bool {
        false
    }

    fn parse_key(&self, raw: &str) -> Result<EntryKey, EditError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EditError::InvalidKey {
                key: raw.to_string(),
                reason: "field name is empty".to_string(),
            });
        }
        Ok(EntryKey::Key(raw.to_string()))
    }

    fn has_entry(&self, key: &EntryKey) -> bool {
        self.field(key).is_some()
    }

    fn get_entry(&self, key: &EntryKey) -> Result<Option<Value>, EditError> {
        self.field(key).map(|field| (field.get)(&*self.model, key)).transpose()
    }

    /// Fields can't be dropped, so removing one sets it to null.
    fn remove_entry(&mut self, key: &EntryKey) -> Result<bool, EditError> {
        let Some(field) = self.field(key) else {
            return Ok(false);
        };
        (field.set)(&mut *self.model, key, Value::Null).map_err(|_| EditError::InvalidValue {
            key: key.to_string(),
            reason: "field can't be cleared because it can't hold null".to_string(),
        })?;
        Ok(true)
    }

    fn set_entry(&mut self, key: &EntryKey, value: Value) -> Result<(), EditError> {
        let field = self.field(key).ok_or_else(|| EditError::EntryNotFound(key.to_string()))?;
        (field.set)(&mut *self.model, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Npc {
        name: String,
        age: u32,
        spouse: Option<String>,
    }

    fn schema() -> ModelSchema<Npc> {
        ModelSchema::new()
            .field("Name", |n: &Npc| &n.name, |n: &mut Npc| &mut n.name)
            .field("Age", |n: &Npc| &n.age, |n: &mut Npc| &mut n.age)
            .field("Spouse", |n: &Npc| &n.spouse, |n: &mut Npc| &mut n.spouse)
    }

    #[test]
    fn fields_are_read_and_written_ignoring_case() {
        let schema = schema();
        let mut npc = Npc {
            name: "Abigail".into(),
            age: 20,
            spouse: None,
        };
        let mut editor = ModelEditor::new(&mut npc, &schema);
        let age = editor.parse_key("age").unwrap();
        assert_eq!(editor.get_entry(&age).unwrap(), Some(json!(20)));
        assert_eq!(editor.get_entry_type(&age), Some("number"));
        editor.set_entry(&age, json!(21)).unwrap();
        assert!(editor.set_entry(&age, json!("old")).is_err());
        assert_eq!(npc.age, 21);
    }

    #[test]
    fn unknown_fields_cannot_be_added() {
        let schema = schema();
        let mut npc = Npc::default();
        let mut editor = ModelEditor::new(&mut npc, &schema);
        let key = editor.parse_key("Height").unwrap();
        assert!(!editor.has_entry(&key));
        assert!(!editor.can_add_entries());
        assert_eq!(
            editor.set_entry(&key, json!(1)),
            Err(EditError::EntryNotFound("Height".into()))
        );
    }

    #[test]
    fn removing_sets_null_where_possible() {
        let schema = schema();
        let mut npc = Npc {
            name: "Sam".into(),
            age: 22,
            spouse: Some("Penny".into()),
        };
        let mut editor = ModelEditor::new(&mut npc, &schema);
        let spouse = editor.parse_key("spouse").unwrap();
        assert!(editor.remove_entry(&spouse).unwrap());
        let age = editor.parse_key("Age").unwrap();
        assert!(matches!(editor.remove_entry(&age), Err(EditError::InvalidValue { .. })));
        assert_eq!(npc.spouse, None);
        assert_eq!(npc.age, 22);
    }
}
