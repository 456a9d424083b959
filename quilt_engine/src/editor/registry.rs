//! Registry of list-key accessors and model schemas, keyed by asset type.
//!
//! Editors never inspect types at runtime. The host registers how to read a list
//! item's ID and which fields a record exposes, and the registry hands those to
//! editors built for that type.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{EditError, ListEditor, ListKeyFn, ModelEditor, ModelSchema};

#[derive(Default)]
pub struct EditorRegistry {
    list_keys: HashMap<TypeId, Box<dyn Any>>,
    models: HashMap<TypeId, Box<dyn Any>>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how to read the ID of a list item of type `T`.
    pub fn register_list_key<T: 'static>(&mut self, key_of: ListKeyFn<T>) -> &mut Self {
        self.list_keys.insert(TypeId::of::<T>(), Box::new(key_of));
        self
    }

    /// Register the editable fields of record type `T`.
    pub fn register_model<T: 'static>(&mut self, schema: ModelSchema<T>) -> &mut Self {
        self.models.insert(TypeId::of::<T>(), Box::new(schema));
        self
    }

    pub fn list_key<T: 'static>(&self) -> Option<ListKeyFn<T>> {
        self.list_keys
            .get(&TypeId::of::<T>())
            .and_then(|key_of| key_of.downcast_ref::<ListKeyFn<T>>())
            .copied()
    }

    pub fn model<T: 'static>(&self) -> Option<&ModelSchema<T>> {
        self.models
            .get(&TypeId::of::<T>())
            .and_then(|schema| schema.downcast_ref::<ModelSchema<T>>())
    }

    /// Build a list editor using the accessor registered for `T`.
    ///
    /// # Errors
    /// - `NoKeyAccessor` if no accessor was registered for `T`
    pub fn list_editor<'a, T>(&self, list: &'a mut Vec<T>) -> Result<ListEditor<'a, T>, EditError>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let key_of = self.list_key::<T>().ok_or(EditError::NoKeyAccessor(type_name::<T>()))?;
        Ok(ListEditor::new(list, key_of))
    }

    /// Build a model editor using the schema registered for `T`.
    ///
    /// # Errors
    /// - `NoModelSchema` if no schema was registered for `T`
    pub fn model_editor<'a, T: 'static>(&'a self, model: &'a mut T) -> Result<ModelEditor<'a, T>, EditError> {
        let schema = self.model::<T>().ok_or(EditError::NoModelSchema(type_name::<T>()))?;
        Ok(ModelEditor::new(model, schema))
    }
}
