use quilt_engine as qe;

use std::collections::BTreeMap;
use std::fs;

use qe::snapshot::{Season, Weather};
use qe::{AssetStore, GameSnapshot, MemoryStore, PatchManager};
use serde_json::json;

const FURNITURE_PACK: &str = r#"
Id = "Example.Furniture"
Name = "Seasonal furniture"

[ConfigSchema.Material]
AllowValues = "Wood, Stone"
Default = "Wood"

[[DynamicTokens]]
Name = "Style"
Value = "Rustic"

[[DynamicTokens]]
Name = "Style"
Value = "Frosted"
When = { Season = "Winter" }

[[Changes]]
Action = "EditData"
Target = "Data/Furniture"
LogName = "chair"
Entries = { Chair = "{{Style}} {{Material}} chair/50" }

[[Changes]]
Action = "EditData"
Target = "Data/Furniture"
LogName = "rainy price"
When = { Weather = "Rain" }
Fields = { Chair = { "2" = "75" } }

[[Changes]]
Action = "EditData"
Target = "Data/Shop"
LogName = "shop order"
MoveEntries = [ { ID = "Lamp", ToPosition = "Top" } ]

[[Changes]]
Action = "Load"
Target = "Portraits/{{Material}}Golem"
FromFile = "golem.json"

[[Changes]]
Action = "EditImage"
Target = "Maps/Town"
FromFile = "overlay.png"
FromArea = { X = 0, Y = 0, Width = 16, Height = 16 }
PatchMode = "Overlay"
"#;

fn snapshot(season: Season, weather: Weather) -> GameSnapshot {
    GameSnapshot {
        season,
        weather,
        ..GameSnapshot::default()
    }
}

fn setup(config: &BTreeMap<String, String>) -> (tempfile::TempDir, PatchManager, MemoryStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pack_path = dir.path().join("content.toml");
    fs::write(&pack_path, FURNITURE_PACK).expect("write pack");
    fs::write(dir.path().join("golem.json"), r#"{"Frames": 4}"#).expect("write golem");

    let mut manager = PatchManager::new();
    let report = manager.load_pack_file(&pack_path, config).expect("pack loads");
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);
    assert_eq!(report.patches, 5);

    let mut store = MemoryStore::new();
    store.set_pack_root(&report.pack_id, dir.path());
    store.insert_original("Data/Furniture", json!({"Table": "Oak table/40"}));
    store.insert_original("Data/Shop", json!([{"Id": "Rug"}, {"Id": "Lamp"}]));
    (dir, manager, store)
}

#[test]
fn patches_follow_the_game_context() {
    let (_dir, mut manager, mut store) = setup(&BTreeMap::new());

    let report = manager.refresh(snapshot(Season::Spring, Weather::Sun), &mut store);
    assert!(report.issues.is_empty(), "{:?}", report.issues);
    assert_eq!(
        store.asset("Data/Furniture"),
        Some(&json!({"Table": "Oak table/40", "Chair": "Rustic Wood chair/50"}))
    );
    assert_eq!(store.asset("Data/Shop"), Some(&json!([{"Id": "Lamp"}, {"Id": "Rug"}])));
    assert_eq!(store.asset("Portraits/WoodGolem"), Some(&json!({"Frames": 4})));
    assert_eq!(store.area_edits().len(), 1);
    assert_eq!(store.area_edits()[0].patch.from_file.as_deref(), Some("overlay.png"));

    manager.refresh(snapshot(Season::Winter, Weather::Rain), &mut store);
    assert_eq!(
        store.asset("Data/Furniture").and_then(|asset| asset.get("Chair")),
        Some(&json!("Frosted Wood chair/75"))
    );

    let report = manager.refresh(snapshot(Season::Winter, Weather::Rain), &mut store);
    assert!(report.tokens.changed.is_empty());
    assert!(report.assets_applied.is_empty());
}

#[test]
fn player_config_changes_targets_and_values() {
    let config = BTreeMap::from([("Material".to_string(), "Stone".to_string())]);
    let (_dir, mut manager, mut store) = setup(&config);
    manager.refresh(snapshot(Season::Summer, Weather::Sun), &mut store);

    assert!(store.asset("Portraits/StoneGolem").is_some());
    assert!(store.asset("Portraits/WoodGolem").is_none());
    assert_eq!(
        store.asset("Data/Furniture").and_then(|asset| asset.get("Chair")),
        Some(&json!("Rustic Stone chair/50"))
    );
}

#[test]
fn patches_wait_for_a_loaded_save() {
    let (_dir, mut manager, mut store) = setup(&BTreeMap::new());
    let report = manager.refresh(GameSnapshot::title_screen(), &mut store);

    let rainy = manager
        .patches()
        .iter()
        .find(|patch| patch.log_name() == "rainy price")
        .expect("patch exists");
    assert!(!rainy.is_ready());
    assert!(!rainy.is_matching());
    assert!(!report.assets_applied.iter().any(|asset| asset == "Data/Furniture"));
}

#[test]
fn reset_restores_unpatched_assets() {
    let (_dir, mut manager, mut store) = setup(&BTreeMap::new());
    manager.refresh(snapshot(Season::Spring, Weather::Sun), &mut store);
    store.reset("Data/Furniture").expect("reset");
    assert_eq!(store.asset("Data/Furniture"), Some(&json!({"Table": "Oak table/40"})));
}
