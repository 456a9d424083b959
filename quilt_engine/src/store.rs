//! store.rs -- an in-memory [`AssetStore`] over JSON assets.
//!
//! Used by the `quilt` CLI to dry-run packs and by tests. Assets are JSON objects
//! (edited as dictionaries), arrays (edited as ordered lists keyed by each item's
//! `Id`/`ID` field) or strings (edited as `/`-delimited fields). Image and map
//! patches are recorded but not applied.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde_json::Value;

use crate::editor::{DelimitedEditor, DictionaryEditor, EditorRegistry, KeyValueEditor};
use crate::invariant::Caseless;
use crate::loader::parse_by_extension;
use crate::manager::AssetStore;
use crate::patch::{AreaPatch, normalize_asset_name};

/// ID of an item in a JSON list asset: its `Id`/`ID` field, or the item itself if
/// it's a string.
pub fn json_item_id(item: &Value) -> String {
    let id = match item {
        Value::Object(map) => map
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("id"))
            .map(|(_, value)| value),
        other => Some(other),
    };
    match id {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// An image or map patch forwarded to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaEditRecord {
    pub asset: String,
    pub pack_id: String,
    pub map: bool,
    pub patch: AreaPatch,
}

pub struct MemoryStore {
    originals: BTreeMap<Caseless, Value>,
    assets: BTreeMap<Caseless, Value>,
    pack_roots: HashMap<Caseless, PathBuf>,
    registry: EditorRegistry,
    area_edits: Vec<AreaEditRecord>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let mut registry = EditorRegistry::new();
        registry.register_list_key::<Value>(json_item_id);
        Self {
            originals: BTreeMap::new(),
            assets: BTreeMap::new(),
            pack_roots: HashMap::new(),
            registry,
            area_edits: Vec::new(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unpatched asset.
    pub fn insert_original(&mut self, asset: &str, value: Value) {
        let name = Caseless::from(normalize_asset_name(asset));
        self.assets.insert(name.clone(), value.clone());
        self.originals.insert(name, value);
    }

    /// Load every `.json`, `.toml` or `.ron` file under `dir` as an unpatched asset
    /// named by its path relative to `dir`, without extension.
    ///
    /// # Errors
    /// - if a directory can't be read or a file doesn't parse
    pub fn load_originals(&mut self, dir: &Path) -> Result<usize> {
        let mut files = Vec::new();
        collect_files(dir, &mut files).with_context(|| format!("reading assets from '{}'", dir.display()))?;
        for path in &files {
            let relative = path.strip_prefix(dir).unwrap_or(path).with_extension("");
            let asset = relative.to_string_lossy().to_string();
            let text = fs::read_to_string(path).with_context(|| format!("reading asset from '{}'", path.display()))?;
            let value: Value = parse_by_extension(path, &text, "asset")?;
            self.insert_original(&asset, value);
        }
        info!("{} assets loaded from '{}'", files.len(), dir.display());
        Ok(files.len())
    }

    /// Set the directory `FromFile` paths of a pack are relative to.
    pub fn set_pack_root(&mut self, pack_id: &str, root: impl Into<PathBuf>) {
        self.pack_roots.insert(Caseless::from(pack_id), root.into());
    }

    pub fn asset(&self, asset: &str) -> Option<&Value> {
        self.assets.get(&Caseless::from(normalize_asset_name(asset)))
    }

    /// Assets which differ from their unpatched state.
    pub fn changed_assets(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.assets
            .iter()
            .filter(|(name, value)| self.originals.get(*name) != Some(*value))
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Image and map patches received so far.
    pub fn area_edits(&self) -> &[AreaEditRecord] {
        &self.area_edits
    }

    fn pack_file(&self, pack_id: &str, from_file: &str) -> PathBuf {
        match self.pack_roots.get(&Caseless::from(pack_id)) {
            Some(root) => root.join(from_file),
            None => PathBuf::from(from_file),
        }
    }

    fn record_area(&mut self, asset: &str, pack_id: &str, map: bool, patch: &AreaPatch) {
        debug!("recorded {} patch for '{asset}' from pack '{pack_id}'", if map { "map" } else { "image" });
        self.area_edits.push(AreaEditRecord {
            asset: asset.to_string(),
            pack_id: pack_id.to_string(),
            map,
            patch: patch.clone(),
        });
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path())).collect::<Result<_, _>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ["json", "toml", "ron"].iter().any(|known| ext.eq_ignore_ascii_case(known)))
        {
            out.push(path);
        }
    }
    Ok(())
}

impl AssetStore for MemoryStore {
    fn reset(&mut self, asset: &str) -> Result<()> {
        let name = Caseless::from(asset);
        match self.originals.get(&name) {
            Some(original) => {
                self.assets.insert(name, original.clone());
            },
            None => {
                self.assets.remove(&name);
            },
        }
        self.area_edits.retain(|edit| !edit.asset.eq_ignore_ascii_case(asset));
        Ok(())
    }

    fn load(&mut self, asset: &str, pack_id: &str, from_file: &str) -> Result<()> {
        let path = self.pack_file(pack_id, from_file);
        let text = fs::read_to_string(&path).with_context(|| format!("reading '{}' for '{asset}'", path.display()))?;
        let value: Value = parse_by_extension(&path, &text, "asset")?;
        self.assets.insert(Caseless::from(asset), value);
        Ok(())
    }

    fn edit_data(&mut self, asset: &str, edit: &mut dyn FnMut(&mut dyn KeyValueEditor)) -> Result<()> {
        let Some(value) = self.assets.get_mut(&Caseless::from(asset)) else {
            bail!("asset '{asset}' doesn't exist");
        };
        match value {
            Value::Object(map) => edit(&mut DictionaryEditor::new(map)),
            Value::Array(items) => edit(&mut self.registry.list_editor(items)?),
            Value::String(text) => edit(&mut DelimitedEditor::new(text, '/')),
            other => bail!("asset '{asset}' is a {} and can't be edited", crate::editor::value_type(other)),
        }
        Ok(())
    }

    fn edit_image(&mut self, asset: &str, pack_id: &str, patch: &AreaPatch) -> Result<()> {
        self.record_area(asset, pack_id, false, patch);
        Ok(())
    }

    fn edit_map(&mut self, asset: &str, pack_id: &str, patch: &AreaPatch) -> Result<()> {
        self.record_area(asset, pack_id, true, patch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_items_are_keyed_by_id() {
        assert_eq!(json_item_id(&json!({"ID": "Salad", "Price": 3})), "Salad");
        assert_eq!(json_item_id(&json!({"id": 7})), "7");
        assert_eq!(json_item_id(&json!("Plain")), "Plain");
        assert_eq!(json_item_id(&json!([1])), "");
    }

    #[test]
    fn each_asset_shape_gets_its_editor() {
        let mut store = MemoryStore::new();
        store.insert_original("Data/Objects", json!({"a": 1}));
        store.insert_original("Data/Shop", json!([{"Id": "A"}, {"Id": "B"}]));
        store.insert_original("Strings/Line", json!("x/y"));
        store.insert_original("Data/Count", json!(3));

        let mut kinds = Vec::new();
        for asset in ["Data/Objects", "Data/Shop", "Strings/Line"] {
            store.edit_data(asset, &mut |editor: &mut dyn KeyValueEditor| kinds.push(editor.kind())).unwrap();
        }
        assert_eq!(
            kinds,
            vec![crate::editor::EditorKind::Dictionary, crate::editor::EditorKind::List, crate::editor::EditorKind::Delimited]
        );
        assert!(store.edit_data("Data/Count", &mut |_: &mut dyn KeyValueEditor| {}).is_err());
        assert!(store.edit_data("Data/Missing", &mut |_: &mut dyn KeyValueEditor| {}).is_err());
    }

    #[test]
    fn originals_load_from_a_directory_and_reset_restores_them() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Data")).unwrap();
        fs::write(dir.path().join("Data/Objects.json"), r#"{"a": "1"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut store = MemoryStore::new();
        assert_eq!(store.load_originals(dir.path()).unwrap(), 1);
        store
            .edit_data("data/objects", &mut |editor: &mut dyn KeyValueEditor| {
                let key = editor.parse_key("b").unwrap();
                editor.set_entry(&key, json!("2")).unwrap();
            })
            .unwrap();
        assert_eq!(store.changed_assets().count(), 1);
        store.reset("Data/Objects").unwrap();
        assert_eq!(store.asset("Data/Objects"), Some(&json!({"a": "1"})));
        assert_eq!(store.changed_assets().count(), 0);
    }

    #[test]
    fn loads_read_files_relative_to_the_pack() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("portrait.json"), r#"{"frames": 4}"#).unwrap();
        let mut store = MemoryStore::new();
        store.set_pack_root("Pack", dir.path());
        store.load("Portraits/Abigail", "pack", "portrait.json").unwrap();
        assert_eq!(store.asset("portraits/abigail"), Some(&json!({"frames": 4})));
        assert!(store.load("Portraits/Sam", "Other", "portrait.json").is_err());
    }
}
