//! manager.rs -- owns the token context and every loaded patch, and keeps assets in
//! sync with the game context.
//!
//! On each [`PatchManager::refresh`] the manager updates tokens, refreshes the
//! patches that read a changed token, groups matching patches by target asset and
//! re-applies every asset whose set of matching patches (or their resolved content)
//! changed. Assets are always rebuilt from scratch: the store resets the asset,
//! then the load patch runs, then edits in load order.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Result, bail};
use log::{debug, info, warn};

use crate::condition::{ConditionDictionary, ConditionFactory};
use crate::editor::KeyValueEditor;
use crate::error::ConflictError;
use crate::invariant::Caseless;
use crate::patch::{ApplyIssue, ApplyReport, AreaPatch, Patch, PatchAction, normalize_asset_name};
use crate::snapshot::GameSnapshot;
use crate::token::{Scope, TokenContext, UpdateReport};

/// Host-side storage of the assets patches are applied to.
///
/// Asset names are normalized (see [`normalize_asset_name`]). File paths are
/// relative to the pack that declared the patch.
pub trait AssetStore {
    /// Restore an asset to its unpatched state.
    ///
    /// # Errors
    /// - if the asset can't be restored
    fn reset(&mut self, asset: &str) -> Result<()>;

    /// Replace an asset with a file from a pack.
    ///
    /// # Errors
    /// - if the file can't be read or doesn't fit the asset
    fn load(&mut self, asset: &str, pack_id: &str, from_file: &str) -> Result<()>;

    /// Edit a data asset. The store wraps the asset in the matching editor and calls
    /// `edit` once; the editor can't outlive the call.
    ///
    /// # Errors
    /// - if the asset isn't a data asset or has no editor
    fn edit_data(&mut self, asset: &str, edit: &mut dyn FnMut(&mut dyn KeyValueEditor)) -> Result<()>;

    /// Apply an image patch.
    ///
    /// # Errors
    /// - by default; stores without image support reject image patches
    fn edit_image(&mut self, asset: &str, pack_id: &str, patch: &AreaPatch) -> Result<()> {
        let _ = (pack_id, patch);
        bail!("image patches are not supported for '{asset}'")
    }

    /// Apply a map patch.
    ///
    /// # Errors
    /// - by default; stores without map support reject map patches
    fn edit_map(&mut self, asset: &str, pack_id: &str, patch: &AreaPatch) -> Result<()> {
        let _ = (pack_id, patch);
        bail!("map patches are not supported for '{asset}'")
    }
}

/// Outcome of a [`PatchManager::refresh`].
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub tokens: UpdateReport,
    /// Patches whose readiness, matching or content changed.
    pub patches_updated: usize,
    /// Assets rebuilt with their matching patches.
    pub assets_applied: Vec<String>,
    /// Assets reset because no patch matches them any more.
    pub assets_reset: Vec<String>,
    pub conflicts: Vec<ConflictError>,
    pub issues: Vec<ApplyIssue>,
}

/// (patch index, revision) pairs of the patches last applied to an asset.
type Signature = Vec<(usize, u64)>;

#[derive(Default)]
pub struct PatchManager {
    pub(crate) tokens: TokenContext,
    pub(crate) packs: Vec<String>,
    pub(crate) patches: Vec<Patch>,
    applied: HashMap<Caseless, Signature>,
}

impl PatchManager {
    /// A manager with the built-in game tokens registered.
    pub fn new() -> Self {
        Self::with_tokens(TokenContext::with_game_tokens())
    }

    /// A manager over an existing token context (e.g. one with host tokens added).
    pub fn with_tokens(tokens: TokenContext) -> Self {
        Self {
            tokens,
            ..Self::default()
        }
    }

    pub fn tokens(&self) -> &TokenContext {
        &self.tokens
    }

    /// Mutable access for registering host tokens.
    pub fn tokens_mut(&mut self) -> &mut TokenContext {
        &mut self.tokens
    }

    /// Loaded patches in application order.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Ids of loaded packs, in load order.
    pub fn packs(&self) -> &[String] {
        &self.packs
    }

    /// Patches currently matching, in application order.
    pub fn matching_patches(&self) -> impl Iterator<Item = &Patch> {
        self.patches.iter().filter(|patch| patch.is_matching())
    }

    /// Add a patch built for an already loaded pack.
    pub fn add_patch(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    /// Push a new game context and bring every affected asset up to date.
    pub fn refresh(&mut self, snapshot: GameSnapshot, store: &mut dyn AssetStore) -> RefreshReport {
        let mut report = RefreshReport {
            tokens: self.tokens.update_context(snapshot),
            ..RefreshReport::default()
        };

        for patch in &mut self.patches {
            let pack = patch.pack_id().to_string();
            let scope = Scope::Pack(&pack);
            if patch.is_dirty() || report.tokens.changed.any_of(scope, patch.tokens()) {
                let was_matching = patch.is_matching();
                if patch.update(&self.tokens.lookup(scope)) {
                    report.patches_updated += 1;
                    if patch.is_matching() != was_matching {
                        debug!(
                            "patch '{}' {}",
                            patch.log_name(),
                            if patch.is_matching() { "now matches" } else { "no longer matches" }
                        );
                    }
                }
            }
        }

        let groups = self.group_by_asset();
        for (asset, indices) in &groups {
            let signature: Signature = indices.iter().map(|&i| (i, self.patches[i].revision())).collect();
            if self.applied.get(asset) == Some(&signature) {
                continue;
            }
            self.apply_asset(asset.as_str(), indices, store, &mut report);
            self.applied.insert(asset.clone(), signature);
            report.assets_applied.push(asset.to_string());
        }

        let mut stale: Vec<Caseless> = self.applied.keys().filter(|asset| !groups.contains_key(*asset)).cloned().collect();
        stale.sort();
        for asset in stale {
            self.applied.remove(&asset);
            if let Err(err) = store.reset(asset.as_str()) {
                warn!("failed to reset '{asset}': {err:#}");
                report.issues.push(ApplyIssue {
                    patch: String::new(),
                    entry: asset.to_string(),
                    reason: format!("{err:#}"),
                });
            }
            report.assets_reset.push(asset.into_string());
        }

        if !report.assets_applied.is_empty() || !report.assets_reset.is_empty() {
            info!(
                "{} assets patched, {} assets reset ({} conflicts, {} issues)",
                report.assets_applied.len(),
                report.assets_reset.len(),
                report.conflicts.len(),
                report.issues.len()
            );
        }
        report
    }

    /// Matching patches grouped by normalized target, in application order.
    fn group_by_asset(&self) -> BTreeMap<Caseless, Vec<usize>> {
        let mut groups: BTreeMap<Caseless, Vec<usize>> = BTreeMap::new();
        for (index, patch) in self.patches.iter().enumerate() {
            if !patch.is_matching() {
                continue;
            }
            if let Some(target) = patch.target_name().filter(|name| !name.is_empty()) {
                groups.entry(Caseless::from(target)).or_default().push(index);
            }
        }
        groups
    }

    fn apply_asset(&self, asset: &str, indices: &[usize], store: &mut dyn AssetStore, report: &mut RefreshReport) {
        let mut issue = |patch: &Patch, err: &anyhow::Error| {
            warn!("{}: failed to patch '{asset}': {err:#}", patch.log_name());
            report.issues.push(ApplyIssue {
                patch: patch.log_name().to_string(),
                entry: asset.to_string(),
                reason: format!("{err:#}"),
            });
        };

        if let Err(err) = store.reset(asset) {
            if let Some(&first) = indices.first() {
                issue(&self.patches[first], &err);
            }
            return;
        }

        let loads: Vec<&Patch> = indices
            .iter()
            .map(|&i| &self.patches[i])
            .filter(|patch| matches!(patch.action(), PatchAction::Load { .. }))
            .collect();
        let mut conflict = None;
        match loads.as_slice() {
            [] => {},
            [load] => {
                if let PatchAction::Load { from_file } = load.action()
                    && let Some(file) = from_file.value()
                    && let Err(err) = store.load(asset, load.pack_id(), &normalize_asset_name(file))
                {
                    issue(*load, &err);
                }
            },
            several => {
                let error = ConflictError {
                    asset: asset.to_string(),
                    patches: several.iter().map(|patch| patch.log_name().to_string()).collect(),
                    packs: several.iter().map(|patch| patch.pack_id().to_string()).collect(),
                };
                warn!("{error}");
                conflict = Some(error);
            },
        }

        let mut edits = ApplyReport::default();
        for patch in indices.iter().map(|&i| &self.patches[i]) {
            let result = match patch.action() {
                PatchAction::Load { .. } => continue,
                PatchAction::EditData(data) => store.edit_data(asset, &mut |editor: &mut dyn KeyValueEditor| {
                    edits.merge(data.apply(patch.log_name(), editor));
                }),
                PatchAction::EditImage(area) => match area.resolve() {
                    Some(resolved) => store.edit_image(asset, patch.pack_id(), &resolved),
                    None => continue,
                },
                PatchAction::EditMap(area) => match area.resolve() {
                    Some(resolved) => store.edit_map(asset, patch.pack_id(), &resolved),
                    None => continue,
                },
            };
            if let Err(err) = result {
                issue(patch, &err);
            }
        }
        debug!("'{asset}': {} patches, {} edits applied", indices.len(), edits.applied);
        report.issues.extend(edits.issues);
        report.conflicts.extend(conflict);
    }

    /// Load patches which target the same literal asset and could match at the same
    /// time. Found without a game context, from the condition domains alone.
    pub fn find_load_conflicts(&self) -> Vec<ConflictError> {
        let loads: Vec<&Patch> = self
            .patches
            .iter()
            .filter(|patch| matches!(patch.action(), PatchAction::Load { .. }) && !patch.target().has_any_tokens())
            .collect();

        let mut conflicts = Vec::new();
        for (i, left) in loads.iter().enumerate() {
            for right in &loads[i + 1..] {
                let same_target = Caseless::from(normalize_asset_name(left.target().raw()))
                    == Caseless::from(normalize_asset_name(right.target().raw()));
                if same_target && self.can_overlap(left, right) {
                    conflicts.push(ConflictError {
                        asset: normalize_asset_name(left.target().raw()),
                        patches: vec![left.log_name().to_string(), right.log_name().to_string()],
                        packs: vec![left.pack_id().to_string(), right.pack_id().to_string()],
                    });
                }
            }
        }
        conflicts
    }

    fn can_overlap(&self, left: &Patch, right: &Patch) -> bool {
        if left.pack_id().eq_ignore_ascii_case(right.pack_id()) {
            let factory = ConditionFactory::new(&self.tokens, Scope::Pack(left.pack_id()));
            return factory.can_overlap(left.conditions(), right.conditions());
        }
        // pack-local tokens with the same name are unrelated across packs
        let global = |conditions: &ConditionDictionary| -> ConditionDictionary {
            conditions
                .iter()
                .filter(|(key, _)| self.tokens.contains(Scope::Global, key.name.as_str()))
                .map(|(key, values)| (key.clone(), values.clone()))
                .collect()
        };
        ConditionFactory::new(&self.tokens, Scope::Global).can_overlap(&global(left.conditions()), &global(right.conditions()))
    }
}
