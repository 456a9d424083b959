//! Built-in game tokens, one per [`ConditionType`].

use std::collections::BTreeMap;

use log::error;

use crate::condition::ConditionType;
use crate::error::TokenError;
use crate::invariant::{Caseless, InvariantSet};
use crate::snapshot::GameSnapshot;

use super::{Scope, Token, TokenContext, TokenInput, TokenKind, TokenLookup};

#[derive(Debug, Clone, PartialEq, Eq)]
enum GameValue {
    /// Plain list of values (`Season`, `Day`, ...).
    List(Vec<String>),
    /// Set of names; with input the token answers `true`/`false`.
    Set(InvariantSet),
    /// Per-NPC values; input selects the NPC.
    Map(BTreeMap<Caseless, String>),
}

/// A global token reading one field of the [`GameSnapshot`].
#[derive(Debug, Clone)]
pub struct GameToken {
    condition: ConditionType,
    state: Option<GameValue>,
}

impl GameToken {
    pub fn new(condition: ConditionType) -> Self {
        Self { condition, state: None }
    }

    pub fn condition(&self) -> ConditionType {
        self.condition
    }

    fn read(&self, snapshot: &GameSnapshot) -> Option<GameValue> {
        if self.condition.needs_world() && !snapshot.world_ready {
            return None;
        }
        let list = |values: Vec<String>| Some(GameValue::List(values));
        match self.condition {
            ConditionType::Day => list(vec![snapshot.day.to_string()]),
            ConditionType::DayOfWeek => list(snapshot.day_of_week().map(|d| d.to_string()).into_iter().collect()),
            ConditionType::DayEvent => list(snapshot.day_event.iter().cloned().collect()),
            ConditionType::Season => list(vec![snapshot.season.to_string()]),
            ConditionType::Weather => list(vec![snapshot.weather.to_string()]),
            ConditionType::Year => list(vec![snapshot.year.to_string()]),
            ConditionType::Language => list(vec![snapshot.language.to_string()]),
            ConditionType::Spouse => list(snapshot.spouse.iter().cloned().collect()),
            ConditionType::HasFlag => Some(GameValue::Set(snapshot.flags.iter().cloned().collect())),
            ConditionType::HasMod => Some(GameValue::Set(snapshot.installed_mods.iter().cloned().collect())),
            ConditionType::HasSeenEvent => Some(GameValue::Set(snapshot.seen_events.iter().cloned().collect())),
            ConditionType::Hearts => Some(GameValue::Map(
                snapshot
                    .hearts
                    .iter()
                    .map(|(npc, hearts)| (Caseless::from(npc.as_str()), hearts.to_string()))
                    .collect(),
            )),
            ConditionType::Relationship => Some(GameValue::Map(
                snapshot
                    .relationships
                    .iter()
                    .map(|(npc, status)| (Caseless::from(npc.as_str()), status.clone()))
                    .collect(),
            )),
        }
    }

    /// Value reported for an NPC missing from the snapshot.
    fn missing_npc_value(&self) -> &'static str {
        match self.condition {
            ConditionType::Relationship => "Unmet",
            _ => "0",
        }
    }
}

impl Token for GameToken {
    fn name(&self) -> &str {
        self.condition.as_str()
    }

    fn kind(&self) -> TokenKind {
        TokenKind::Game
    }

    fn is_mutable(&self) -> bool {
        self.condition.is_mutable()
    }

    fn allows_input(&self) -> bool {
        self.condition.allows_input()
    }

    fn requires_input(&self) -> bool {
        self.condition.requires_input()
    }

    fn valid_values(&self, input: Option<&TokenInput>) -> Option<InvariantSet> {
        self.condition.valid_values(input)
    }

    fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    fn update(&mut self, snapshot: &GameSnapshot, _tokens: &dyn TokenLookup) -> Result<bool, TokenError> {
        let state = self.read(snapshot);
        let changed = state != self.state;
        self.state = state;
        Ok(changed)
    }

    fn values(&self, input: Option<&TokenInput>) -> Result<Vec<String>, TokenError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| TokenError::NotReady(self.name().to_string()))?;
        let key = input.and_then(|i| i.positional.as_deref()).map(str::trim);
        Ok(match (state, key) {
            (GameValue::List(values), _) => values.clone(),
            (GameValue::Set(names), None) => names.to_vec(),
            (GameValue::Set(names), Some(key)) => vec![names.contains(key).to_string()],
            (GameValue::Map(map), Some(npc)) => vec![
                map.get(&Caseless::from(npc))
                    .map_or(self.missing_npc_value(), String::as_str)
                    .to_string(),
            ],
            (GameValue::Map(_), None) => return Err(TokenError::InputRequired(self.name().to_string())),
        })
    }
}

/// Register every built-in game token in the global scope.
pub fn register_game_tokens(context: &mut TokenContext) {
    for condition in ConditionType::ALL {
        if let Err(err) = context.register(Scope::Global, Box::new(GameToken::new(*condition))) {
            error!("built-in token '{condition}' could not be registered: {err}");
        }
    }
}
