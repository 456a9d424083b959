//! Ordered-list editor: entries addressed by ID or by `#index`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use quilt_data::MovePosition;

use crate::human_sort::compare_ignore_case;

use super::{EditError, EditorKind, EntryKey, KeyValueEditor, MoveResult, from_value, to_value};

/// Reads the ID of a list item.
pub type ListKeyFn<T> = fn(&T) -> String;

/// Editor over a borrowed `Vec<T>`.
///
/// IDs come from the accessor registered for `T`, looked up once when the editor is
/// built, and are matched ignoring case.
pub struct ListEditor<'a, T> {
    list: &'a mut Vec<T>,
    key_of: ListKeyFn<T>,
}

impl<'a, T> ListEditor<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(list: &'a mut Vec<T>, key_of: ListKeyFn<T>) -> Self {
        Self { list, key_of }
    }

    fn position(&self, key: &EntryKey) -> Option<usize> {
        match key {
            EntryKey::Index(index) => (*index < self.list.len()).then_some(*index),
            EntryKey::Key(id) => self
                .list
                .iter()
                .position(|item| compare_ignore_case(&(self.key_of)(item), id).is_eq()),
        }
    }
}

impl<T> KeyValueEditor for ListEditor<'_, T>
where
    T: Serialize + DeserializeOwned,
{
    fn kind(&self) -> EditorKind {
        EditorKind::List
    }

    fn can_move_entries(&self) -> bool {
        true
    }

    fn parse_key(&self, raw: &str) -> Result<EntryKey, EditError> {
        let raw = raw.trim();
        if let Some(index) = raw.strip_prefix('#') {
            return index.parse().map(EntryKey::Index).map_err(|_| EditError::InvalidKey {
                key: raw.to_string(),
                reason: "index must be a non-negative number".to_string(),
            });
        }
        if raw.is_empty() {
            return Err(EditError::InvalidKey {
                key: raw.to_string(),
                reason: "list entry ID is empty".to_string(),
            });
        }
        Ok(EntryKey::Key(raw.to_string()))
    }

    fn has_entry(&self, key: &EntryKey) -> bool {
        self.position(key).is_some()
    }

    fn get_entry(&self, key: &EntryKey) -> Result<Option<Value>, EditError> {
        self.position(key).map(|i| to_value(key, &self.list[i])).transpose()
    }

    fn remove_entry(&mut self, key: &EntryKey) -> Result<bool, EditError> {
        Ok(self.position(key).map(|i| self.list.remove(i)).is_some())
    }

    /// Replace an entry in place; an unknown ID is appended.
    ///
    /// An appended item must carry the ID it was set under, or it couldn't be
    /// found by that ID again.
    fn set_entry(&mut self, key: &EntryKey, value: Value) -> Result<(), EditError> {
        let item: T = from_value(key, value)?;
        match (self.position(key), key) {
            (Some(i), _) => self.list[i] = item,
            (None, EntryKey::Key(id)) => {
                let item_id = (self.key_of)(&item);
                if compare_ignore_case(&item_id, id).is_ne() {
                    return Err(EditError::InvalidValue {
                        key: key.to_string(),
                        reason: format!("new entry has ID '{item_id}'"),
                    });
                }
                self.list.push(item);
            },
            (None, EntryKey::Index(_)) => return Err(EditError::EntryNotFound(key.to_string())),
        }
        Ok(())
    }

    fn move_entry(&mut self, key: &EntryKey, position: MovePosition) -> Result<MoveResult, EditError> {
        let Some(from) = self.position(key) else {
            return Ok(MoveResult::TargetNotFound);
        };
        let item = self.list.remove(from);
        match position {
            MovePosition::Top => self.list.insert(0, item),
            MovePosition::Bottom => self.list.push(item),
        }
        Ok(MoveResult::Success)
    }

    fn move_entry_relative(&mut self, key: &EntryKey, anchor: &EntryKey, after: bool) -> Result<MoveResult, EditError> {
        let Some(from) = self.position(key) else {
            return Ok(MoveResult::TargetNotFound);
        };
        let Some(anchor_at) = self.position(anchor) else {
            return Ok(MoveResult::AnchorNotFound);
        };
        if from == anchor_at {
            return Ok(MoveResult::AnchorIsMain);
        }
        let item = self.list.remove(from);
        let anchor_at = if from < anchor_at { anchor_at - 1 } else { anchor_at };
        let to = if after { anchor_at + 1 } else { anchor_at };
        self.list.insert(to, item);
        Ok(MoveResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shop {
        id: String,
        price: u32,
    }

    fn shop_id(shop: &Shop) -> String {
        shop.id.clone()
    }

    fn shops(ids: &[&str]) -> Vec<Shop> {
        ids.iter()
            .map(|id| Shop {
                id: (*id).to_string(),
                price: 1,
            })
            .collect()
    }

    fn ids(list: &[Shop]) -> Vec<&str> {
        list.iter().map(|shop| shop.id.as_str()).collect()
    }

    #[test]
    fn move_to_top_keeps_the_rest_in_order() {
        let mut list = shops(&["A", "B", "X", "C", "D"]);
        let mut editor = ListEditor::new(&mut list, shop_id);
        let key = editor.parse_key("x").unwrap();
        assert_eq!(editor.move_entry(&key, MovePosition::Top), Ok(MoveResult::Success));
        assert_eq!(ids(&list), vec!["X", "A", "B", "C", "D"]);
    }

    #[test]
    fn relative_moves() {
        let mut list = shops(&["A", "B", "C", "D"]);
        let mut editor = ListEditor::new(&mut list, shop_id);
        let a = editor.parse_key("A").unwrap();
        let c = editor.parse_key("C").unwrap();
        assert_eq!(editor.move_entry_relative(&a, &c, true), Ok(MoveResult::Success));
        assert_eq!(editor.move_entry_relative(&a, &a, false), Ok(MoveResult::AnchorIsMain));
        let missing = editor.parse_key("Z").unwrap();
        assert_eq!(editor.move_entry_relative(&missing, &a, false), Ok(MoveResult::TargetNotFound));
        assert_eq!(editor.move_entry_relative(&a, &missing, false), Ok(MoveResult::AnchorNotFound));
        let d = editor.parse_key("D").unwrap();
        let b = editor.parse_key("B").unwrap();
        assert_eq!(editor.move_entry_relative(&d, &b, false), Ok(MoveResult::Success));
        assert_eq!(ids(&list), vec!["D", "B", "C", "A"]);
    }

    #[test]
    fn set_replaces_by_id_and_appends_unknown_ids() {
        let mut list = shops(&["A", "B"]);
        let mut editor = ListEditor::new(&mut list, shop_id);
        let b = editor.parse_key("b").unwrap();
        editor.set_entry(&b, json!({"id": "B", "price": 9})).unwrap();
        let new = editor.parse_key("New").unwrap();
        editor.set_entry(&new, json!({"id": "New", "price": 3})).unwrap();
        let err = editor
            .set_entry(&EntryKey::Index(7), json!({"id": "Z", "price": 0}))
            .unwrap_err();
        assert_eq!(err, EditError::EntryNotFound("#7".into()));
        assert_eq!(list[1].price, 9);
        assert_eq!(ids(&list), vec!["A", "B", "New"]);
    }

    #[test]
    fn appended_items_must_carry_their_id() {
        let mut list = shops(&["A"]);
        let mut editor = ListEditor::new(&mut list, shop_id);
        let new = editor.parse_key("New").unwrap();
        let err = editor.set_entry(&new, json!({"id": "Other", "price": 3})).unwrap_err();
        assert!(matches!(err, EditError::InvalidValue { .. }));
        assert!(!editor.has_entry(&new));
        editor.set_entry(&new, json!({"id": "NEW", "price": 3})).unwrap();
        assert!(editor.has_entry(&new));
        assert_eq!(ids(&list), vec!["A", "NEW"]);
    }

    #[test]
    fn index_keys_and_removal() {
        let mut list = shops(&["A", "B", "C"]);
        let mut editor = ListEditor::new(&mut list, shop_id);
        let first = editor.parse_key("#0").unwrap();
        assert_eq!(first, EntryKey::Index(0));
        assert_eq!(editor.get_entry(&first).unwrap(), Some(json!({"id": "A", "price": 1})));
        assert!(editor.parse_key("#-1").is_err());
        let b = editor.parse_key("B").unwrap();
        assert!(editor.remove_entry(&b).unwrap());
        assert!(!editor.has_entry(&EntryKey::Index(2)));
        assert_eq!(ids(&list), vec!["A", "C"]);
    }
}
