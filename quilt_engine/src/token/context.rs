//! Token context -- registered tokens, grouped into scopes.
//!
//! The global scope holds tokens every pack can read (built-in game tokens and host
//! tokens). Each content pack gets a child scope for its config and dynamic tokens;
//! lookups from a pack scope check the pack's own tokens first, then the global ones.
//!
//! Updates run in dependency order: a token is only updated after every token it
//! reads has been updated for the same snapshot. Dependency cycles are rejected when
//! the closing token is registered.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, warn};

use crate::error::{DefinitionError, TokenError};
use crate::invariant::{Caseless, InvariantSet};
use crate::snapshot::GameSnapshot;

use super::{Token, TokenInput, TokenLookup, is_valid_token_name};

/// Which namespace a token is registered in or looked up from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Global,
    Pack(&'a str),
}

impl Scope<'_> {
    pub fn pack_id(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Pack(id) => Some(id),
        }
    }
}

struct TokenSlot {
    token: Box<dyn Token>,
    deps: Vec<Caseless>,
}

#[derive(Default)]
struct TokenScope {
    slots: Vec<TokenSlot>,
    index: HashMap<Caseless, usize>,
    /// Slot indices in dependency order.
    order: Vec<usize>,
}

impl TokenScope {
    fn get(&self, name: &Caseless) -> Option<&TokenSlot> {
        self.index.get(name).map(|&i| &self.slots[i])
    }

    /// Recompute the update order (Kahn's algorithm, ties broken by registration order).
    fn rebuild_order(&mut self) {
        let mut remaining: Vec<usize> = vec![0; self.slots.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.slots.len()];
        for (i, slot) in self.slots.iter().enumerate() {
            for dep in &slot.deps {
                if let Some(&j) = self.index.get(dep)
                    && j != i
                {
                    remaining[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..self.slots.len()).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(self.slots.len());
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &dependent in &dependents[i] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }
        // cycles are rejected at registration, so everything is ordered
        debug_assert_eq!(order.len(), self.slots.len());
        self.order = order;
    }
}

/// Read-only view of one slot's neighbours while that slot is being updated.
struct SlotView<'a> {
    before: &'a [TokenSlot],
    after: &'a [TokenSlot],
    current: usize,
    index: &'a HashMap<Caseless, usize>,
    parent: Option<&'a TokenScope>,
}

impl TokenLookup for SlotView<'_> {
    fn token(&self, name: &str) -> Option<&dyn Token> {
        let key = Caseless::from(name);
        match self.index.get(&key) {
            Some(&i) if i < self.current => Some(&*self.before[i].token),
            Some(&i) if i > self.current => Some(&*self.after[i - self.current - 1].token),
            // a token never reads itself
            Some(_) => None,
            None => self.parent.and_then(|p| p.get(&key)).map(|slot| &*slot.token),
        }
    }
}

/// Read-only view of every token visible from a scope.
pub struct ContextLookup<'a> {
    local: Option<&'a TokenScope>,
    global: &'a TokenScope,
}

impl TokenLookup for ContextLookup<'_> {
    fn token(&self, name: &str) -> Option<&dyn Token> {
        let key = Caseless::from(name);
        self.local
            .and_then(|scope| scope.get(&key))
            .or_else(|| self.global.get(&key))
            .map(|slot| &*slot.token)
    }
}

/// Names of tokens whose values changed during an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedTokens {
    global: BTreeSet<Caseless>,
    packs: BTreeMap<Caseless, BTreeSet<Caseless>>,
}

impl ChangedTokens {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.packs.values().all(BTreeSet::is_empty)
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.packs.values().map(BTreeSet::len).sum::<usize>()
    }

    /// True if a token visible from `scope` under this name changed.
    pub fn contains(&self, scope: Scope<'_>, name: &str) -> bool {
        let key = Caseless::from(name);
        let local = scope
            .pack_id()
            .and_then(|pack| self.packs.get(&Caseless::from(pack)))
            .is_some_and(|names| names.contains(&key));
        local || self.global.contains(&key)
    }

    /// True if any of the given token names changed, as seen from `scope`.
    pub fn any_of<'n>(&self, scope: Scope<'_>, names: impl IntoIterator<Item = &'n Caseless>) -> bool {
        names.into_iter().any(|name| self.contains(scope, name.as_str()))
    }

    /// Changed names, pack-local ones written as `pack/name`.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.global.iter().map(ToString::to_string).collect();
        for (pack, locals) in &self.packs {
            names.extend(locals.iter().map(|name| format!("{pack}/{name}")));
        }
        names
    }

    fn insert(&mut self, pack: Option<&Caseless>, name: Caseless) {
        match pack {
            Some(pack) => {
                self.packs.entry(pack.clone()).or_default().insert(name);
            },
            None => {
                self.global.insert(name);
            },
        }
    }
}

/// A token which failed to update, with the scope it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFailure {
    pub pack: Option<String>,
    pub token: String,
    pub error: TokenError,
}

/// Outcome of [`TokenContext::update_context`].
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub changed: ChangedTokens,
    pub failed: Vec<TokenFailure>,
    /// Tokens not updated because something they read failed.
    pub skipped: Vec<String>,
}

/// All registered tokens plus the snapshot they were last updated with.
#[derive(Default)]
pub struct TokenContext {
    global: TokenScope,
    packs: BTreeMap<Caseless, TokenScope>,
    snapshot: Option<GameSnapshot>,
}

impl TokenContext {
    /// An empty context with no tokens at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context with every built-in game token registered globally.
    pub fn with_game_tokens() -> Self {
        let mut context = Self::new();
        super::game::register_game_tokens(&mut context);
        context
    }

    /// Register a token in a scope.
    ///
    /// If a snapshot has already been applied, the token is evaluated right away,
    /// along with any registered tokens which read it.
    ///
    /// # Errors
    /// - `InvalidTokenName` for a malformed name
    /// - `DuplicateToken` if the scope already has a token with this name
    /// - `CyclicDependency` if the token's dependencies lead back to it
    pub fn register(&mut self, scope: Scope<'_>, token: Box<dyn Token>) -> Result<(), DefinitionError> {
        let name = Caseless::from(token.name());
        if !is_valid_token_name(name.as_str()) {
            return Err(DefinitionError::InvalidTokenName(name.into_string()));
        }
        let deps: Vec<Caseless> = token.tokens_used().into_iter().map(Caseless::from).collect();

        let local = match scope {
            Scope::Global => None,
            Scope::Pack(pack) => self.packs.get(&Caseless::from(pack)),
        };
        let taken = match scope {
            Scope::Global => self.global.index.contains_key(&name),
            Scope::Pack(_) => local.is_some_and(|scope| scope.index.contains_key(&name)),
        };
        if taken {
            return Err(DefinitionError::DuplicateToken(name.into_string()));
        }
        if let Some(path) = find_cycle(local, &self.global, &name, &deps) {
            return Err(DefinitionError::CyclicDependency {
                name: name.into_string(),
                path,
            });
        }

        let (target, parent) = match scope {
            Scope::Global => (&mut self.global, None),
            Scope::Pack(pack) => (
                self.packs.entry(Caseless::from(pack)).or_default(),
                Some(&self.global),
            ),
        };
        let slot_index = target.slots.len();
        target.index.insert(name.clone(), slot_index);
        target.slots.push(TokenSlot { token, deps });
        target.rebuild_order();
        debug!("registered token '{name}' ({scope:?})");

        if let Some(snapshot) = &self.snapshot {
            if let Err(err) = update_slot(target, slot_index, parent, snapshot) {
                warn!("token '{name}' failed its first update: {err}");
            }
            // tokens registered earlier may have been waiting on this one
            update_dependents(target, parent, snapshot, &name);
            if matches!(scope, Scope::Global) {
                for local in self.packs.values_mut() {
                    update_dependents(local, Some(&self.global), snapshot, &name);
                }
            }
        }
        Ok(())
    }

    /// Remove a pack scope and every token in it.
    pub fn remove_pack(&mut self, pack: &str) -> bool {
        self.packs.remove(&Caseless::from(pack)).is_some()
    }

    /// Push a new game snapshot and re-evaluate tokens in dependency order.
    ///
    /// Mutable tokens are always re-evaluated; immutable tokens only until they
    /// become ready. A token that fails is reported and everything depending on it
    /// is skipped for this update, while unrelated tokens still update.
    pub fn update_context(&mut self, snapshot: GameSnapshot) -> UpdateReport {
        let mut report = UpdateReport::default();
        let global_broken = update_scope(&mut self.global, None, None, &snapshot, &HashSet::new(), &mut report);
        for (pack, scope) in &mut self.packs {
            update_scope(scope, Some(pack), Some(&self.global), &snapshot, &global_broken, &mut report);
        }
        self.snapshot = Some(snapshot);
        if !report.changed.is_empty() {
            debug!("tokens changed: {}", report.changed.names().join(", "));
        }
        report
    }

    /// The last snapshot passed to [`TokenContext::update_context`].
    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.snapshot.as_ref()
    }

    /// Read-only lookup of every token visible from a scope.
    pub fn lookup(&self, scope: Scope<'_>) -> ContextLookup<'_> {
        let local = scope.pack_id().and_then(|pack| self.packs.get(&Caseless::from(pack)));
        ContextLookup {
            local,
            global: &self.global,
        }
    }

    /// Current values of a token.
    ///
    /// # Errors
    /// - `Unknown`, `InputNotAllowed`, `InputRequired` or `NotReady`
    pub fn get_values(&self, scope: Scope<'_>, name: &str, input: Option<&TokenInput>) -> Result<Vec<String>, TokenError> {
        self.lookup(scope).values(name, input)
    }

    pub fn contains(&self, scope: Scope<'_>, name: &str) -> bool {
        self.lookup(scope).token(name).is_some()
    }

    pub fn is_ready(&self, scope: Scope<'_>, name: &str) -> bool {
        self.lookup(scope).is_ready(name)
    }

    /// Names of every token visible from a scope, in human sort order.
    pub fn token_names(&self, scope: Scope<'_>) -> Vec<String> {
        let mut names: InvariantSet = self.global.slots.iter().map(|s| s.token.name().to_string()).collect();
        if let Some(local) = scope.pack_id().and_then(|pack| self.packs.get(&Caseless::from(pack))) {
            for slot in &local.slots {
                names.insert(slot.token.name());
            }
        }
        names.to_vec()
    }

    /// Ids of packs with a token scope.
    pub fn pack_ids(&self) -> Vec<String> {
        self.packs.keys().map(ToString::to_string).collect()
    }
}

/// Find a dependency path from `deps` back to `name`, resolving names the way a
/// lookup from the new token's scope would.
fn find_cycle(local: Option<&TokenScope>, global: &TokenScope, name: &Caseless, deps: &[Caseless]) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    for dep in deps {
        let mut path = vec![name.to_string()];
        if reaches(local, global, dep, name, &mut path, &mut visited) {
            return Some(path);
        }
    }
    None
}

fn reaches(
    local: Option<&TokenScope>,
    global: &TokenScope,
    current: &Caseless,
    target: &Caseless,
    path: &mut Vec<String>,
    visited: &mut HashSet<Caseless>,
) -> bool {
    path.push(current.to_string());
    if current == target {
        return true;
    }
    if visited.insert(current.clone()) {
        // global tokens only see the global scope
        let (slot, next_local) = match local.and_then(|scope| scope.get(current)) {
            Some(slot) => (Some(slot), local),
            None => (global.get(current), None),
        };
        if let Some(slot) = slot {
            for dep in &slot.deps {
                if reaches(next_local, global, dep, target, path, visited) {
                    return true;
                }
            }
        }
    }
    path.pop();
    false
}

fn update_slot(
    scope: &mut TokenScope,
    i: usize,
    parent: Option<&TokenScope>,
    snapshot: &GameSnapshot,
) -> Result<bool, TokenError> {
    let (before, rest) = scope.slots.split_at_mut(i);
    let Some((slot, after)) = rest.split_first_mut() else {
        return Ok(false);
    };
    let view = SlotView {
        before,
        after,
        current: i,
        index: &scope.index,
        parent,
    };
    slot.token.update(snapshot, &view)
}

/// Re-evaluate every token in `scope` which reads `name`, directly or through
/// another re-evaluated token.
fn update_dependents(scope: &mut TokenScope, parent: Option<&TokenScope>, snapshot: &GameSnapshot, name: &Caseless) {
    let mut updated = HashSet::from([name.clone()]);
    let order = scope.order.clone();
    for i in order {
        let slot = &scope.slots[i];
        let slot_name = Caseless::from(slot.token.name());
        if updated.contains(&slot_name)
            || (!slot.token.is_mutable() && slot.token.is_ready())
            || !slot.deps.iter().any(|dep| updated.contains(dep))
        {
            continue;
        }
        if let Err(err) = update_slot(scope, i, parent, snapshot) {
            warn!("token '{slot_name}' failed to update: {err}");
        }
        updated.insert(slot_name);
    }
}

/// Update every token in one scope; returns the names which failed or were skipped.
fn update_scope(
    scope: &mut TokenScope,
    pack: Option<&Caseless>,
    parent: Option<&TokenScope>,
    snapshot: &GameSnapshot,
    parent_broken: &HashSet<Caseless>,
    report: &mut UpdateReport,
) -> HashSet<Caseless> {
    let mut broken: HashSet<Caseless> = HashSet::new();
    let order = scope.order.clone();
    for i in order {
        let slot = &scope.slots[i];
        if !slot.token.is_mutable() && slot.token.is_ready() {
            continue;
        }
        let name = Caseless::from(slot.token.name());
        let broken_dep = slot.deps.iter().find(|dep| {
            if scope.index.contains_key(*dep) {
                broken.contains(*dep)
            } else {
                parent_broken.contains(*dep)
            }
        });
        if let Some(dep) = broken_dep {
            debug!("skipping token '{name}': dependency '{dep}' failed to update");
            report.skipped.push(qualified(pack, &name));
            broken.insert(name);
            continue;
        }

        match update_slot(scope, i, parent, snapshot) {
            Ok(true) => report.changed.insert(pack, name),
            Ok(false) => {},
            Err(error) => {
                warn!("token '{}' failed to update: {error}", qualified(pack, &name));
                report.failed.push(TokenFailure {
                    pack: pack.map(ToString::to_string),
                    token: name.to_string(),
                    error,
                });
                broken.insert(name);
            },
        }
    }
    broken
}

fn qualified(pack: Option<&Caseless>, name: &Caseless) -> String {
    match pack {
        Some(pack) => format!("{pack}/{name}"),
        None => name.to_string(),
    }
}
