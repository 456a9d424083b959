//! condition -- `When` blocks and the built-in condition types.
//!
//! A condition dictionary maps a token (optionally with an input argument, such as
//! `Hearts:Abigail`) to the literal values it must have. The dictionary matches when
//! every key's current values intersect its allowed values.

pub mod factory;
pub mod permutation;

pub use factory::ConditionFactory;
pub use permutation::{Permutations, permutations};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::invariant::{Caseless, InvariantSet};
use crate::snapshot::{DAYS_PER_MONTH, DayOfWeek, Language, Season, Weather, named_enum};
use crate::token::{TokenInput, TokenLookup, TokenRef};

/// Relationship statuses reported by the `Relationship` token.
pub const RELATIONSHIP_STATUSES: &[&str] = &["Unmet", "Friendly", "Dating", "Engaged", "Married", "Divorced"];

named_enum!(
    /// Built-in conditions, each backed by a global game token of the same name.
    ConditionType, "condition", [
        Day => "Day",
        DayEvent => "DayEvent",
        DayOfWeek => "DayOfWeek",
        HasFlag => "HasFlag",
        HasMod => "HasMod",
        HasSeenEvent => "HasSeenEvent",
        Hearts => "Hearts",
        Language => "Language",
        Relationship => "Relationship",
        Season => "Season",
        Spouse => "Spouse",
        Weather => "Weather",
        Year => "Year",
    ]
);

impl ConditionType {
    pub fn allows_input(self) -> bool {
        matches!(
            self,
            Self::HasFlag | Self::HasMod | Self::HasSeenEvent | Self::Hearts | Self::Relationship
        )
    }

    pub fn requires_input(self) -> bool {
        matches!(self, Self::Hearts | Self::Relationship)
    }

    /// Installed mods can't change while the game runs.
    pub fn is_mutable(self) -> bool {
        self != Self::HasMod
    }

    /// False for conditions that are available before a save is loaded.
    pub fn needs_world(self) -> bool {
        !matches!(self, Self::Language | Self::HasMod)
    }

    /// True for conditions whose values are a set of names (flags, mods, events).
    pub fn is_set(self) -> bool {
        matches!(self, Self::HasFlag | Self::HasMod | Self::HasSeenEvent)
    }

    /// The finite value domain for this condition and input, if there is one.
    pub fn valid_values(self, input: Option<&TokenInput>) -> Option<InvariantSet> {
        let has_input = input.is_some_and(|i| !i.is_empty());
        match self {
            Self::Day => Some((1..=DAYS_PER_MONTH).map(|d| d.to_string()).collect()),
            Self::DayOfWeek => Some(DayOfWeek::ALL.iter().map(|d| d.as_str()).collect()),
            Self::Season => Some(Season::ALL.iter().map(|s| s.as_str()).collect()),
            Self::Weather => Some(Weather::ALL.iter().map(|w| w.as_str()).collect()),
            Self::Language => Some(Language::ALL.iter().map(|l| l.as_str()).collect()),
            Self::Relationship => Some(RELATIONSHIP_STATUSES.iter().copied().collect()),
            Self::HasFlag | Self::HasMod | Self::HasSeenEvent if has_input => Some(["true", "false"].into_iter().collect()),
            _ => None,
        }
    }
}

/// A condition key: a token name plus an optional input argument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConditionKey {
    pub name: Caseless,
    pub input: Option<TokenInput>,
}

impl ConditionKey {
    pub fn new(name: &str) -> Self {
        Self {
            name: Caseless::from(name),
            input: None,
        }
    }

    pub fn with_input(name: &str, input: impl Into<String>) -> Self {
        Self {
            name: Caseless::from(name),
            input: Some(TokenInput::positional(input)),
        }
    }

    /// Parse a key as written in a `When` block (`Season`, `Hearts:Abigail`).
    ///
    /// # Errors
    /// - a description of the problem if the key isn't a well-formed token reference
    pub fn parse(text: &str) -> Result<ConditionKey, String> {
        let reference = TokenRef::parse(text)?;
        Ok(ConditionKey {
            name: Caseless::from(reference.name),
            input: reference.input,
        })
    }

    /// True if this is the plain built-in key of the given type.
    pub fn is(&self, kind: ConditionType) -> bool {
        self.input.is_none() && self.name == Caseless::from(kind.as_str())
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        match &self.input {
            Some(input) if input.positional.is_some() => write!(f, ":{input}"),
            Some(input) => write!(f, "{input}"),
            None => Ok(()),
        }
    }
}

/// Condition keys mapped to their allowed values. An empty dictionary always matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionDictionary(BTreeMap<ConditionKey, InvariantSet>);

impl ConditionDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, merging with any values it already has.
    pub fn insert(&mut self, key: ConditionKey, values: InvariantSet) {
        let entry = self.0.entry(key).or_default();
        for value in &values {
            entry.insert(value);
        }
    }

    pub fn get(&self, key: &ConditionKey) -> Option<&InvariantSet> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConditionKey, &InvariantSet)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConditionKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate against the current token values.
    ///
    /// Returns `None` if a key's token can't be read (unknown or not ready).
    pub fn evaluate(&self, tokens: &dyn TokenLookup) -> Option<bool> {
        let mut matched = true;
        for (key, allowed) in &self.0 {
            let values = tokens.values(key.name.as_str(), key.input.as_ref()).ok()?;
            let current: InvariantSet = values.into_iter().collect();
            matched &= current.intersects(allowed);
        }
        Some(matched)
    }

    /// True if every key's current values intersect its allowed values.
    pub fn is_match(&self, tokens: &dyn TokenLookup) -> bool {
        self.evaluate(tokens) == Some(true)
    }

    /// Names of the tokens read by this dictionary.
    pub fn token_names(&self) -> BTreeSet<Caseless> {
        self.0.keys().map(|key| key.name.clone()).collect()
    }
}

impl FromIterator<(ConditionKey, InvariantSet)> for ConditionDictionary {
    fn from_iter<I: IntoIterator<Item = (ConditionKey, InvariantSet)>>(iter: I) -> Self {
        let mut dictionary = Self::new();
        for (key, values) in iter {
            dictionary.insert(key, values);
        }
        dictionary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::GameSnapshot;
    use crate::token::{Scope, TokenContext};

    fn values(list: &[&str]) -> InvariantSet {
        list.iter().copied().collect()
    }

    fn context(snapshot: GameSnapshot) -> TokenContext {
        let mut context = TokenContext::with_game_tokens();
        context.update_context(snapshot);
        context
    }

    #[test]
    fn empty_dictionary_always_matches() {
        let context = context(GameSnapshot::default());
        assert!(ConditionDictionary::new().is_match(&context.lookup(Scope::Global)));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let context = context(GameSnapshot {
            season: Season::Winter,
            ..GameSnapshot::default()
        });
        let lookup = context.lookup(Scope::Global);
        let dictionary: ConditionDictionary = [(ConditionKey::new("SEASON"), values(&["winter", "spring"]))]
            .into_iter()
            .collect();
        assert!(dictionary.is_match(&lookup));

        let summer: ConditionDictionary = [(ConditionKey::new("Season"), values(&["Summer"]))].into_iter().collect();
        assert!(!summer.is_match(&lookup));
    }

    #[test]
    fn every_key_must_match() {
        let context = context(GameSnapshot {
            day: 3,
            weather: crate::snapshot::Weather::Rain,
            ..GameSnapshot::default()
        });
        let lookup = context.lookup(Scope::Global);
        let mut dictionary = ConditionDictionary::new();
        dictionary.insert(ConditionKey::new("Day"), values(&["3", "4"]));
        dictionary.insert(ConditionKey::new("Weather"), values(&["Rain"]));
        assert!(dictionary.is_match(&lookup));
        dictionary.insert(ConditionKey::new("DayOfWeek"), values(&["Monday"]));
        assert!(!dictionary.is_match(&lookup));
    }

    #[test]
    fn input_keys_read_the_token_with_input() {
        let context = context(GameSnapshot {
            flags: ["beatGame".to_string()].into_iter().collect(),
            hearts: [("Abigail".to_string(), 8)].into_iter().collect(),
            ..GameSnapshot::default()
        });
        let lookup = context.lookup(Scope::Global);
        let mut dictionary = ConditionDictionary::new();
        dictionary.insert(ConditionKey::with_input("HasFlag", "BEATGAME"), values(&["true"]));
        dictionary.insert(ConditionKey::with_input("Hearts", "Abigail"), values(&["8", "9", "10"]));
        assert!(dictionary.is_match(&lookup));
    }

    #[test]
    fn unready_tokens_never_match() {
        let context = context(GameSnapshot::title_screen());
        let lookup = context.lookup(Scope::Global);
        let dictionary: ConditionDictionary = [(ConditionKey::new("Season"), values(&["Spring"]))].into_iter().collect();
        assert_eq!(dictionary.evaluate(&lookup), None);
        assert!(!dictionary.is_match(&lookup));

        let language: ConditionDictionary = [(ConditionKey::new("Language"), values(&["en"]))].into_iter().collect();
        assert!(language.is_match(&lookup));
    }

    #[test]
    fn keys_parse_and_display() {
        let key = ConditionKey::parse("Hearts:Abigail").unwrap();
        assert_eq!(key, ConditionKey::with_input("hearts", "Abigail"));
        assert_eq!(key.to_string(), "Hearts:Abigail");
        assert!(ConditionKey::parse("DayOfWeek").unwrap().is(ConditionType::DayOfWeek));
        assert!(ConditionKey::parse("bad key").is_err());
    }

    #[test]
    fn bounded_domains() {
        assert_eq!(ConditionType::Day.valid_values(None).map(|v| v.len()), Some(28));
        assert!(ConditionType::Year.valid_values(None).is_none());
        assert!(ConditionType::HasFlag.valid_values(None).is_none());
        let input = TokenInput::positional("x");
        assert_eq!(
            ConditionType::HasFlag.valid_values(Some(&input)).map(|v| v.to_vec()),
            Some(vec!["false".to_string(), "true".to_string()])
        );
    }
}
