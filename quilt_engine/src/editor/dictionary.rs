//! Dictionary editor over map-like assets.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{EditError, EditorKind, EntryKey, KeyValueEditor, from_value, to_value};

/// A map which can be edited through a [`DictionaryEditor`].
pub trait DictionaryAsset {
    type Key: FromStr;
    type Value: Serialize + DeserializeOwned;

    fn get_value(&self, key: &Self::Key) -> Option<&Self::Value>;
    fn insert_value(&mut self, key: Self::Key, value: Self::Value);
    fn remove_value(&mut self, key: &Self::Key) -> bool;
}

impl<K, V, S> DictionaryAsset for HashMap<K, V, S>
where
    K: Eq + Hash + FromStr,
    V: Serialize + DeserializeOwned,
    S: BuildHasher,
{
    type Key = K;
    type Value = V;

    fn get_value(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn insert_value(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn remove_value(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }
}

impl<K, V> DictionaryAsset for BTreeMap<K, V>
where
    K: Ord + FromStr,
    V: Serialize + DeserializeOwned,
{
    type Key = K;
    type Value = V;

    fn get_value(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn insert_value(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    fn remove_value(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }
}

impl DictionaryAsset for Map<String, Value> {
    type Key = String;
    type Value = Value;

    fn get_value(&self, key: &String) -> Option<&Value> {
        self.get(key)
    }

    fn insert_value(&mut self, key: String, value: Value) {
        self.insert(key, value);
    }

    fn remove_value(&mut self, key: &String) -> bool {
        self.shift_remove(key).is_some()
    }
}

/// Editor over a borrowed dictionary; keys are parsed into the map's key type.
pub struct DictionaryEditor<'a, D: DictionaryAsset> {
    data: &'a mut D,
}

impl<'a, D: DictionaryAsset> DictionaryEditor<'a, D> {
    pub fn new(data: &'a mut D) -> Self {
        Self { data }
    }

    fn native_key(&self, key: &EntryKey) -> Result<D::Key, EditError> {
        let raw = match key {
            EntryKey::Key(raw) => raw.clone(),
            EntryKey::Index(index) => index.to_string(),
        };
        raw.parse().map_err(|_| EditError::InvalidKey {
            key: raw.clone(),
            reason: format!("can't be parsed as {}", std::any::type_name::<D::Key>()),
        })
    }
}

impl<D: DictionaryAsset> KeyValueEditor for DictionaryEditor<'_, D> {
    fn kind(&self) -> EditorKind {
        EditorKind::Dictionary
    }

    fn parse_key(&self, raw: &str) -> Result<EntryKey, EditError> {
        let key = EntryKey::Key(raw.to_string());
        self.native_key(&key)?;
        Ok(key)
    }

    fn has_entry(&self, key: &EntryKey) -> bool {
        self.native_key(key).is_ok_and(|native| self.data.get_value(&native).is_some())
    }

    fn get_entry(&self, key: &EntryKey) -> Result<Option<Value>, EditError> {
        let native = self.native_key(key)?;
        self.data.get_value(&native).map(|value| to_value(key, value)).transpose()
    }

    fn remove_entry(&mut self, key: &EntryKey) -> Result<bool, EditError> {
        let native = self.native_key(key)?;
        Ok(self.data.remove_value(&native))
    }

    fn set_entry(&mut self, key: &EntryKey, value: Value) -> Result<(), EditError> {
        let native = self.native_key(key)?;
        let value = from_value(key, value)?;
        self.data.insert_value(native, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quilt_data::MovePosition;
    use serde_json::json;

    #[test]
    fn edits_string_keyed_maps() {
        let mut data: HashMap<String, String> = HashMap::new();
        data.insert("greeting".into(), "hello".into());
        let mut editor = DictionaryEditor::new(&mut data);
        let key = editor.parse_key("greeting").unwrap();
        assert!(editor.has_entry(&key));
        assert_eq!(editor.get_entry_type(&key), Some("string"));
        editor.set_entry(&key, json!("hi")).unwrap();
        let added = editor.parse_key("farewell").unwrap();
        editor.set_entry(&added, json!("bye")).unwrap();
        assert!(editor.remove_entry(&key).unwrap());
        assert!(!editor.remove_entry(&key).unwrap());
        assert_eq!(data.get("farewell").map(String::as_str), Some("bye"));
        assert!(!data.contains_key("greeting"));
    }

    #[test]
    fn keys_are_parsed_into_the_native_type() {
        let mut data: BTreeMap<u32, String> = BTreeMap::new();
        let mut editor = DictionaryEditor::new(&mut data);
        assert!(matches!(editor.parse_key("abc"), Err(EditError::InvalidKey { .. })));
        let key = editor.parse_key("42").unwrap();
        editor.set_entry(&key, json!("answer")).unwrap();
        assert_eq!(data.get(&42).map(String::as_str), Some("answer"));
    }

    #[test]
    fn values_must_fit_the_value_type() {
        let mut data: BTreeMap<String, u8> = BTreeMap::new();
        let mut editor = DictionaryEditor::new(&mut data);
        let key = editor.parse_key("count").unwrap();
        let err = editor.set_entry(&key, json!("not a number")).unwrap_err();
        assert!(matches!(err, EditError::InvalidValue { .. }));
    }

    #[test]
    fn json_maps_and_unsupported_moves() {
        let mut data = Map::new();
        let mut editor = DictionaryEditor::new(&mut data);
        let key = editor.parse_key("Town").unwrap();
        editor.set_entry(&key, json!({"x": 1})).unwrap();
        assert_eq!(editor.get_entry(&key).unwrap(), Some(json!({"x": 1})));
        assert!(!editor.can_move_entries());
        assert!(matches!(
            editor.move_entry(&key, MovePosition::Top),
            Err(EditError::Unsupported { editor: EditorKind::Dictionary, .. })
        ));
    }
}
