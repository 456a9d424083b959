//! Dynamic tokens -- pack-local tokens whose value is picked by conditions.

use std::collections::BTreeSet;

use quilt_data::split_values;

use crate::condition::ConditionDictionary;
use crate::error::TokenError;
use crate::invariant::{Caseless, InvariantSet};
use crate::snapshot::GameSnapshot;

use super::{Contextual, Token, TokenInput, TokenKind, TokenLookup, TokenString};

/// One candidate value and the conditions under which it applies.
#[derive(Debug, Clone)]
pub struct DynamicValue {
    pub value: TokenString,
    pub conditions: ConditionDictionary,
}

/// A token taking the value of its last definition whose conditions match.
#[derive(Debug, Clone)]
pub struct DynamicToken {
    name: String,
    definitions: Vec<DynamicValue>,
    values: Option<Vec<String>>,
}

impl DynamicToken {
    pub fn new(name: impl Into<String>, definitions: Vec<DynamicValue>) -> Self {
        Self {
            name: name.into(),
            definitions,
            values: None,
        }
    }

    pub fn definitions(&self) -> &[DynamicValue] {
        &self.definitions
    }

    /// Pick the active definition, or `None` if the token can't be resolved.
    fn resolve(&mut self, tokens: &dyn TokenLookup) -> Option<Vec<String>> {
        let mut chosen = None;
        for (i, definition) in self.definitions.iter_mut().enumerate() {
            definition.value.update(tokens);
            // a definition whose conditions can't be read leaves the token unresolved
            if definition.conditions.evaluate(tokens)? {
                chosen = Some(i);
            }
        }
        let value = self.definitions[chosen?].value.value()?;
        Some(split_values(value))
    }
}

impl Token for DynamicToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TokenKind {
        TokenKind::Dynamic
    }

    fn tokens_used(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for definition in &self.definitions {
            definition.value.collect_tokens(&mut names);
            names.extend(definition.conditions.token_names());
        }
        names.into_iter().map(Caseless::into_string).collect()
    }

    /// The union of every candidate value, when none of them contain tokens.
    fn valid_values(&self, _input: Option<&TokenInput>) -> Option<InvariantSet> {
        let mut all = InvariantSet::new();
        for definition in &self.definitions {
            if definition.value.has_any_tokens() {
                return None;
            }
            for value in split_values(definition.value.raw()) {
                all.insert(value);
            }
        }
        Some(all)
    }

    fn is_ready(&self) -> bool {
        self.values.is_some()
    }

    fn update(&mut self, _snapshot: &GameSnapshot, tokens: &dyn TokenLookup) -> Result<bool, TokenError> {
        let values = self.resolve(tokens);
        let changed = values != self.values;
        self.values = values;
        Ok(changed)
    }

    fn values(&self, _input: Option<&TokenInput>) -> Result<Vec<String>, TokenError> {
        self.values.clone().ok_or_else(|| TokenError::NotReady(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionKey;
    use crate::snapshot::{Season, Weather};
    use crate::token::{Scope, TokenContext};

    fn definition(context: &TokenContext, value: &str, conditions: &[(&str, &[&str])]) -> DynamicValue {
        DynamicValue {
            value: TokenString::parse(value, &context.lookup(Scope::Pack("pack"))),
            conditions: conditions
                .iter()
                .map(|(key, values)| (ConditionKey::new(key), values.iter().copied().collect()))
                .collect(),
        }
    }

    #[test]
    fn last_matching_definition_wins() {
        let mut context = TokenContext::with_game_tokens();
        let definitions = vec![
            definition(&context, "plain", &[]),
            definition(&context, "wet", &[("Weather", &["Rain", "Storm"])]),
            definition(&context, "snowy", &[("Season", &["Winter"])]),
        ];
        context
            .register(Scope::Pack("pack"), Box::new(DynamicToken::new("Look", definitions)))
            .unwrap();

        context.update_context(GameSnapshot::default());
        assert_eq!(context.get_values(Scope::Pack("pack"), "Look", None).unwrap(), vec!["plain"]);

        let report = context.update_context(GameSnapshot {
            weather: Weather::Rain,
            ..GameSnapshot::default()
        });
        assert!(report.changed.contains(Scope::Pack("pack"), "look"));
        assert_eq!(context.get_values(Scope::Pack("pack"), "Look", None).unwrap(), vec!["wet"]);

        context.update_context(GameSnapshot {
            weather: Weather::Rain,
            season: Season::Winter,
            ..GameSnapshot::default()
        });
        assert_eq!(context.get_values(Scope::Pack("pack"), "Look", None).unwrap(), vec!["snowy"]);
    }

    #[test]
    fn no_match_means_not_ready() {
        let mut context = TokenContext::with_game_tokens();
        let definitions = vec![definition(&context, "winter only", &[("Season", &["Winter"])])];
        context
            .register(Scope::Pack("pack"), Box::new(DynamicToken::new("Only", definitions)))
            .unwrap();
        context.update_context(GameSnapshot::default());
        assert_eq!(
            context.get_values(Scope::Pack("pack"), "Only", None),
            Err(TokenError::NotReady("Only".into()))
        );
    }

    #[test]
    fn values_can_use_other_tokens_and_split_on_commas() {
        let mut context = TokenContext::with_game_tokens();
        let definitions = vec![definition(&context, "{{Season}}, extra", &[])];
        let token = DynamicToken::new("Mixed", definitions);
        assert_eq!(token.tokens_used(), vec!["Season".to_string()]);
        assert!(token.valid_values(None).is_none());
        context.register(Scope::Pack("pack"), Box::new(token)).unwrap();
        context.update_context(GameSnapshot {
            season: Season::Fall,
            ..GameSnapshot::default()
        });
        assert_eq!(
            context.get_values(Scope::Pack("pack"), "Mixed", None).unwrap(),
            vec!["Fall", "extra"]
        );
    }

    #[test]
    fn literal_values_give_a_bounded_domain() {
        let context = TokenContext::with_game_tokens();
        let token = DynamicToken::new(
            "Mood",
            vec![
                definition(&context, "calm", &[]),
                definition(&context, "stormy, grim", &[("Weather", &["Storm"])]),
            ],
        );
        assert_eq!(
            token.valid_values(None).map(|v| v.to_vec()),
            Some(vec!["calm".to_string(), "grim".to_string(), "stormy".to_string()])
        );
        assert_eq!(token.tokens_used(), vec!["Weather".to_string()]);
    }
}
