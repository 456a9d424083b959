//! Loader utilities for reading content packs and registering them with a
//! [`PatchManager`].
//!
//! Pack declarations and player config files may be TOML, JSON or RON (picked by
//! file extension). A bad config field, dynamic token or patch is skipped and
//! reported; the rest of the pack still loads.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use quilt_data::{ContentPackDef, DynamicTokenDef, ValidationError, patch_context, validate_config_field, validate_patch};

use crate::condition::ConditionFactory;
use crate::config::{ConfigField, ConfigToken};
use crate::error::DefinitionError;
use crate::invariant::Caseless;
use crate::manager::PatchManager;
use crate::patch::Patch;
use crate::snapshot::GameSnapshot;
use crate::token::{DynamicToken, DynamicValue, Scope, TokenString};

/// Parse `text` according to the extension of `path`.
pub(crate) fn parse_by_extension<T: DeserializeOwned>(path: &Path, text: &str, what: &str) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "toml" => toml::from_str(text).with_context(|| format!("parsing {what} TOML from '{}'", path.display())),
        "json" => serde_json::from_str(text).with_context(|| format!("parsing {what} JSON from '{}'", path.display())),
        "ron" => ron::from_str(text).with_context(|| format!("parsing {what} RON from '{}'", path.display())),
        _ => bail!("'{}' is not a .toml, .json or .ron file", path.display()),
    }
}

/// Load a content pack declaration from a file.
///
/// # Errors
/// - if the file can't be read, has an unknown extension or doesn't parse
pub fn load_pack_def(path: &Path) -> Result<ContentPackDef> {
    let text = fs::read_to_string(path).with_context(|| format!("reading content pack from '{}'", path.display()))?;
    parse_by_extension(path, &text, "content pack")
}

/// Load a game context snapshot, e.g. for checking packs outside the game.
///
/// # Errors
/// - if the file can't be read, has an unknown extension or doesn't parse
pub fn load_snapshot(path: &Path) -> Result<GameSnapshot> {
    let text = fs::read_to_string(path).with_context(|| format!("reading game context from '{}'", path.display()))?;
    parse_by_extension(path, &text, "game context")
}

/// A value in a player config file; lists are joined into a comma-delimited value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawConfigValue {
    Text(String),
    Flag(bool),
    Number(i64),
    List(Vec<String>),
}

impl RawConfigValue {
    fn into_value(self) -> String {
        match self {
            RawConfigValue::Text(text) => text,
            RawConfigValue::Flag(flag) => flag.to_string(),
            RawConfigValue::Number(number) => number.to_string(),
            RawConfigValue::List(items) => items.join(", "),
        }
    }
}

/// Load a player's config values for one pack (field name to value).
///
/// # Errors
/// - if the file can't be read, has an unknown extension or doesn't parse
pub fn load_user_config(path: &Path) -> Result<BTreeMap<String, String>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading pack config from '{}'", path.display()))?;
    let raw: BTreeMap<String, RawConfigValue> = parse_by_extension(path, &text, "pack config")?;
    Ok(raw.into_iter().map(|(key, value)| (key, value.into_value())).collect())
}

/// A declaration left out of a pack, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub entry: String,
    pub reason: String,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped {}: {}", self.entry, self.reason)
    }
}

/// Summary of one [`PatchManager::add_pack`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackLoadReport {
    pub pack_id: String,
    pub config_fields: usize,
    pub dynamic_tokens: usize,
    pub patches: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl PackLoadReport {
    fn skip(&mut self, entry: String, reason: impl fmt::Display) {
        let skipped = SkippedEntry {
            entry,
            reason: reason.to_string(),
        };
        warn!("pack '{}': {skipped}", self.pack_id);
        self.skipped.push(skipped);
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Dynamic token declarations grouped by name (ignoring case), in order of first
/// appearance.
fn group_dynamic_tokens(defs: &[DynamicTokenDef]) -> Vec<(String, Vec<&DynamicTokenDef>)> {
    let mut groups: Vec<(String, Vec<&DynamicTokenDef>)> = Vec::new();
    for def in defs {
        let name = def.name.trim();
        match groups.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
            Some((_, group)) => group.push(def),
            None => groups.push((name.to_string(), vec![def])),
        }
    }
    groups
}

impl PatchManager {
    /// Register a pack's config fields, dynamic tokens and patches.
    ///
    /// `user_config` holds the player's values for the pack's config fields.
    ///
    /// # Errors
    /// - if the pack has no id or a pack with the same id is already loaded
    pub fn add_pack(&mut self, pack: &ContentPackDef, user_config: &BTreeMap<String, String>) -> Result<PackLoadReport> {
        let pack_id = pack.id.trim();
        if pack_id.is_empty() {
            bail!("content pack has no Id");
        }
        if self.packs.iter().any(|id| id.eq_ignore_ascii_case(pack_id)) {
            bail!("content pack '{pack_id}' is already loaded");
        }
        let mut report = PackLoadReport {
            pack_id: pack_id.to_string(),
            ..PackLoadReport::default()
        };
        let user_config: BTreeMap<Caseless, &String> =
            user_config.iter().map(|(key, value)| (Caseless::from(key.as_str()), value)).collect();

        for (name, def) in &pack.config_schema {
            let mut errors = Vec::new();
            validate_config_field(name, def, &mut errors);
            if !errors.is_empty() {
                report.skip(format!("config field '{name}'"), join_errors(&errors));
                continue;
            }
            let registered = ConfigField::from_def(name, def).and_then(|mut field| {
                if let Some(value) = user_config.get(&Caseless::from(name.as_str())) {
                    field.apply_user_value(value);
                }
                self.tokens.register(Scope::Pack(pack_id), Box::new(ConfigToken::new(field)))
            });
            match registered {
                Ok(()) => report.config_fields += 1,
                Err(err) => report.skip(format!("config field '{name}'"), err),
            }
        }
        for name in user_config.keys() {
            if !pack.config_schema.keys().any(|field| Caseless::from(field.as_str()) == *name) {
                warn!("pack '{pack_id}': ignoring config value for unknown field '{name}'");
            }
        }

        for (name, defs) in group_dynamic_tokens(&pack.dynamic_tokens) {
            match self.build_dynamic_token(pack_id, &name, &defs) {
                Ok(token) => match self.tokens.register(Scope::Pack(pack_id), Box::new(token)) {
                    Ok(()) => report.dynamic_tokens += 1,
                    Err(err) => report.skip(format!("dynamic token '{name}'"), err),
                },
                Err(err) => report.skip(format!("dynamic token '{name}'"), err),
            }
        }

        for (index, def) in pack.changes.iter().enumerate() {
            let context = patch_context(index, def);
            let mut errors = Vec::new();
            validate_patch(def, &context, &mut errors);
            if !errors.is_empty() {
                report.skip(context, join_errors(&errors));
                continue;
            }
            match Patch::from_def(def, pack_id, index, &self.tokens) {
                Ok(patch) => {
                    self.patches.push(patch);
                    report.patches += 1;
                },
                Err(err) => report.skip(context, err),
            }
        }

        self.packs.push(pack_id.to_string());
        info!(
            "pack '{pack_id}' loaded: {} config fields, {} dynamic tokens, {} patches ({} skipped)",
            report.config_fields,
            report.dynamic_tokens,
            report.patches,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Read a pack file and register it.
    ///
    /// # Errors
    /// - if the file can't be loaded or the pack can't be added
    pub fn load_pack_file(&mut self, path: &Path, user_config: &BTreeMap<String, String>) -> Result<PackLoadReport> {
        let pack = load_pack_def(path)?;
        self.add_pack(&pack, user_config)
            .with_context(|| format!("while adding content pack from '{}'", path.display()))
    }

    fn build_dynamic_token(&self, pack_id: &str, name: &str, defs: &[&DynamicTokenDef]) -> Result<DynamicToken, DefinitionError> {
        let scope = Scope::Pack(pack_id);
        let factory = ConditionFactory::new(&self.tokens, scope);
        let lookup = self.tokens.lookup(scope);
        let mut definitions = Vec::with_capacity(defs.len());
        for def in defs {
            let value = TokenString::parse(&def.value, &lookup);
            if !value.invalid_tokens().is_empty() {
                return Err(DefinitionError::InvalidTokens {
                    context: format!("dynamic token '{name}'"),
                    tokens: value.invalid_tokens().to_vec(),
                });
            }
            definitions.push(DynamicValue {
                value,
                conditions: factory.parse_conditions(&def.when)?,
            });
        }
        Ok(DynamicToken::new(name, definitions))
    }
}
