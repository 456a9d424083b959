//! Condition factory -- validates `When` blocks and reasons about their value domains.
//!
//! The factory works against the tokens visible from one scope, so a pack's own
//! config and dynamic tokens can be used as condition keys alongside the built-in
//! game conditions.

use std::collections::{BTreeMap, BTreeSet};

use quilt_data::split_values;

use crate::constraint::ConstraintSet;
use crate::error::DefinitionError;
use crate::invariant::{Caseless, InvariantSet};
use crate::snapshot::DayOfWeek;
use crate::token::{Scope, TokenContext, TokenKind, TokenLookup, check_input};

use super::{ConditionDictionary, ConditionKey, ConditionType, Permutations};

/// Condition helpers bound to one token scope.
pub struct ConditionFactory<'a> {
    tokens: &'a TokenContext,
    scope: Scope<'a>,
}

impl<'a> ConditionFactory<'a> {
    pub fn new(tokens: &'a TokenContext, scope: Scope<'a>) -> Self {
        Self { tokens, scope }
    }

    /// Every key usable in a `When` block from this scope.
    pub fn valid_conditions(&self) -> InvariantSet {
        self.tokens.token_names(self.scope).into_iter().collect()
    }

    /// The finite value domain for a key, or `None` if it's unbounded.
    ///
    /// # Errors
    /// - `UnknownConditionKey` if no token with this name is visible
    /// - `InvalidConditionInput` if the key's input breaks the token's input rules
    pub fn valid_values(&self, key: &ConditionKey) -> Result<Option<InvariantSet>, DefinitionError> {
        let lookup = self.tokens.lookup(self.scope);
        let token = lookup
            .token(key.name.as_str())
            .ok_or_else(|| DefinitionError::UnknownConditionKey {
                key: key.to_string(),
                valid: self.valid_conditions().to_vec(),
            })?;
        check_input(token, key.input.as_ref()).map_err(|err| DefinitionError::InvalidConditionInput {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        Ok(token.valid_values(key.input.as_ref()))
    }

    /// Parse a raw `When` block (key to comma-separated values).
    ///
    /// # Errors
    /// - `UnknownConditionKey`, `InvalidConditionInput`, `EmptyCondition`, or
    ///   `InvalidConditionValue` for a literal outside a bounded domain
    pub fn parse_conditions(&self, raw: &BTreeMap<String, String>) -> Result<ConditionDictionary, DefinitionError> {
        let mut conditions = ConditionDictionary::new();
        for (raw_key, raw_values) in raw {
            let key = ConditionKey::parse(raw_key).map_err(|reason| DefinitionError::InvalidConditionInput {
                key: raw_key.clone(),
                reason,
            })?;
            let values: InvariantSet = split_values(raw_values).into_iter().collect();
            if values.is_empty() {
                return Err(DefinitionError::EmptyCondition(key.to_string()));
            }
            if let Some(domain) = self.valid_values(&key)? {
                if let Some(bad) = values.iter().find(|value| !domain.contains(value)) {
                    return Err(DefinitionError::InvalidConditionValue {
                        key: key.to_string(),
                        value: bad.to_string(),
                        valid: domain.to_vec(),
                    });
                }
            }
            conditions.insert(key, values);
        }
        Ok(conditions)
    }

    /// The values each key could take while `conditions` match.
    ///
    /// Every key in the dictionary gets a constraint: its allowed values narrowed by
    /// the token's domain. When either `Day` or `DayOfWeek` is constrained, both
    /// are returned and each is narrowed by the other.
    pub fn possible_values(&self, conditions: &ConditionDictionary) -> BTreeMap<ConditionKey, ConstraintSet<Caseless>> {
        let mut possible = BTreeMap::new();
        for (key, allowed) in conditions.iter() {
            let mut set = ConstraintSet::bounded(allowed.as_set().iter().cloned());
            if let Ok(Some(domain)) = self.valid_values(key) {
                set.intersect_with(&ConstraintSet::bounded(domain.as_set().iter().cloned()));
            }
            possible.insert(key.clone(), set);
        }

        let day_key = ConditionKey::new(ConditionType::Day.as_str());
        let dow_key = ConditionKey::new(ConditionType::DayOfWeek.as_str());
        let calendar = self.is_builtin(ConditionType::Day) && self.is_builtin(ConditionType::DayOfWeek);
        if calendar && (possible.contains_key(&day_key) || possible.contains_key(&dow_key)) {
            let mut days = possible.remove(&day_key).unwrap_or_else(|| self.full_domain(&day_key));
            let mut weekdays = possible.remove(&dow_key).unwrap_or_else(|| self.full_domain(&dow_key));
            narrow_calendar(&mut days, &mut weekdays);
            possible.insert(day_key, days);
            possible.insert(dow_key, weekdays);
        }
        possible
    }

    /// Lazily enumerate every combination of the requested keys' possible values.
    ///
    /// Keys absent from `conditions` range over their full domain.
    ///
    /// # Errors
    /// - `UnboundedCondition` if a requested key has no finite set of values
    /// - `TooManyPermutations` if the number of combinations overflows a `usize`
    /// - `UnknownConditionKey` / `InvalidConditionInput` for a bad key
    pub fn applicable_permutations(
        &self,
        keys: &[ConditionKey],
        conditions: &ConditionDictionary,
    ) -> Result<Permutations<ConditionKey>, DefinitionError> {
        let possible = self.possible_values(conditions);
        let mut dimensions = Vec::with_capacity(keys.len());
        for key in keys {
            let allowed = match possible.get(key) {
                Some(set) => set.allowed_values(),
                None => self.valid_values(key)?.map(|domain| domain.as_set().clone()),
            };
            let Some(allowed) = allowed else {
                return Err(DefinitionError::UnboundedCondition(key.to_string()));
            };
            dimensions.push((key.clone(), allowed.into_iter().map(Caseless::into_string).collect()));
        }
        Permutations::new(dimensions)
            .ok_or_else(|| DefinitionError::TooManyPermutations(keys.iter().map(ToString::to_string).collect()))
    }

    /// True if the conditions match the current token values.
    pub fn is_match(&self, conditions: &ConditionDictionary) -> bool {
        conditions.is_match(&self.tokens.lookup(self.scope))
    }

    /// False if the two dictionaries can never match at the same time.
    ///
    /// Only keys with finite possible values can rule out an overlap.
    pub fn can_overlap(&self, left: &ConditionDictionary, right: &ConditionDictionary) -> bool {
        let mut left = self.possible_values(left);
        let right = self.possible_values(right);
        for (key, constraint) in right {
            match left.get_mut(&key) {
                Some(existing) => existing.intersect_with(&constraint),
                None => {
                    left.insert(key, constraint);
                },
            }
        }
        // each side was narrowed across Day/DayOfWeek already, so a non-empty
        // intersection of both keys is consistent
        left.values().all(|set| !set.is_empty())
    }

    /// The four days of the month falling on a weekday.
    pub fn days_for(day_of_week: DayOfWeek) -> [u8; 4] {
        day_of_week.days()
    }

    /// The weekday a day of the month falls on.
    pub fn day_of_week_for(day: u8) -> Option<DayOfWeek> {
        DayOfWeek::for_day(day)
    }

    fn is_builtin(&self, kind: ConditionType) -> bool {
        self.tokens
            .lookup(self.scope)
            .token(kind.as_str())
            .is_some_and(|token| token.kind() == TokenKind::Game)
    }

    fn full_domain(&self, key: &ConditionKey) -> ConstraintSet<Caseless> {
        match self.valid_values(key) {
            Ok(Some(domain)) => ConstraintSet::bounded(domain.as_set().iter().cloned()),
            _ => ConstraintSet::unbounded(),
        }
    }
}

/// Exclude days whose weekday isn't allowed, and weekdays with no allowed day.
fn narrow_calendar(days: &mut ConstraintSet<Caseless>, weekdays: &mut ConstraintSet<Caseless>) {
    let weekday_allowed =
        |dow: DayOfWeek, weekdays: &ConstraintSet<Caseless>| weekdays.allows(&Caseless::from(dow.as_str()));

    let mut excluded_days = BTreeSet::new();
    for day in days.allowed_values().into_iter().flatten() {
        let keep = day
            .as_str()
            .parse::<u8>()
            .ok()
            .and_then(DayOfWeek::for_day)
            .is_some_and(|dow| weekday_allowed(dow, weekdays));
        if !keep {
            excluded_days.insert(day);
        }
    }
    days.exclude_all(excluded_days);

    let mut excluded_weekdays = BTreeSet::new();
    for weekday in weekdays.allowed_values().into_iter().flatten() {
        let keep = weekday.as_str().parse::<DayOfWeek>().is_ok_and(|dow| {
            dow.days()
                .iter()
                .any(|day| days.allows(&Caseless::from(day.to_string())))
        });
        if !keep {
            excluded_weekdays.insert(weekday);
        }
    }
    weekdays.exclude_all(excluded_weekdays);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenContext;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn allowed(set: &ConstraintSet<Caseless>) -> Vec<String> {
        set.allowed_values()
            .map(|values| values.into_iter().map(Caseless::into_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn weekdays_narrow_days() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let conditions = factory.parse_conditions(&raw(&[("DayOfWeek", "Tuesday, Wednesday")])).unwrap();
        let possible = factory.possible_values(&conditions);
        assert_eq!(
            allowed(&possible[&ConditionKey::new("Day")]),
            vec!["2", "3", "9", "10", "16", "17", "23", "24"]
        );
    }

    #[test]
    fn days_narrow_weekdays() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let conditions = factory
            .parse_conditions(&raw(&[("Day", "1, 8, 15"), ("DayOfWeek", "Monday, Friday")]))
            .unwrap();
        let possible = factory.possible_values(&conditions);
        assert_eq!(allowed(&possible[&ConditionKey::new("DayOfWeek")]), vec!["Monday"]);
        assert_eq!(allowed(&possible[&ConditionKey::new("Day")]), vec!["1", "8", "15"]);
    }

    #[test]
    fn unknown_keys_and_values_are_rejected() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let err = factory.parse_conditions(&raw(&[("Seasn", "Spring")])).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownConditionKey { ref valid, .. } if valid.contains(&"Season".to_string())));

        let err = factory.parse_conditions(&raw(&[("Season", "Spring, Monsoon")])).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidConditionValue { ref value, .. } if value == "Monsoon"));

        let err = factory.parse_conditions(&raw(&[("Weather", " , ")])).unwrap_err();
        assert_eq!(err, DefinitionError::EmptyCondition("Weather".into()));

        let err = factory.parse_conditions(&raw(&[("Hearts", "5")])).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidConditionInput { .. }));
    }

    #[test]
    fn unbounded_keys_are_open_ended() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let conditions = factory.parse_conditions(&raw(&[("Year", "1, 2, 300")])).unwrap();
        assert_eq!(factory.valid_values(&ConditionKey::new("Year")), Ok(None));
        assert_eq!(allowed(&factory.possible_values(&conditions)[&ConditionKey::new("Year")]).len(), 3);
    }

    #[test]
    fn applicable_permutations_follow_requested_keys() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let conditions = factory
            .parse_conditions(&raw(&[("Season", "Spring, Fall"), ("DayOfWeek", "Sunday")]))
            .unwrap();
        let keys = [ConditionKey::new("Season"), ConditionKey::new("Day"), ConditionKey::new("Weather")];
        let permutations: Vec<_> = factory.applicable_permutations(&keys, &conditions).unwrap().collect();
        // 2 seasons x 4 Sundays x 5 weather types
        assert_eq!(permutations.len(), 40);
        assert_eq!(permutations[0][&keys[0]], "Fall");
        assert_eq!(permutations[0][&keys[1]], "7");
        assert_eq!(permutations[0][&keys[2]], "Rain");

        let err = factory
            .applicable_permutations(&[ConditionKey::new("Year")], &ConditionDictionary::new())
            .unwrap_err();
        assert_eq!(err, DefinitionError::UnboundedCondition("Year".into()));
    }

    #[test]
    fn permutations_which_cannot_be_counted_are_an_error() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let flags: Vec<ConditionKey> = (0..64).map(|i| ConditionKey::with_input("HasFlag", format!("flag{i}"))).collect();
        let err = factory.applicable_permutations(&flags, &ConditionDictionary::new()).unwrap_err();
        assert!(matches!(err, DefinitionError::TooManyPermutations(ref keys) if keys.len() == 64));
        assert_eq!(factory.applicable_permutations(&flags[..10], &ConditionDictionary::new()).unwrap().len(), 1024);
    }

    #[test]
    fn overlap_detection() {
        let context = TokenContext::with_game_tokens();
        let factory = ConditionFactory::new(&context, Scope::Global);
        let spring = factory.parse_conditions(&raw(&[("Season", "Spring")])).unwrap();
        let summer = factory.parse_conditions(&raw(&[("Season", "Summer")])).unwrap();
        let rainy = factory.parse_conditions(&raw(&[("Weather", "Rain")])).unwrap();
        let monday = factory.parse_conditions(&raw(&[("DayOfWeek", "Monday")])).unwrap();
        let day_two = factory.parse_conditions(&raw(&[("Day", "2")])).unwrap();
        assert!(!factory.can_overlap(&spring, &summer));
        assert!(factory.can_overlap(&spring, &rainy));
        assert!(factory.can_overlap(&ConditionDictionary::new(), &summer));
        assert!(!factory.can_overlap(&monday, &day_two));
    }

    #[test]
    fn day_lookups_round_trip() {
        for dow in DayOfWeek::ALL {
            for day in ConditionFactory::days_for(*dow) {
                assert_eq!(ConditionFactory::day_of_week_for(day), Some(*dow));
            }
        }
    }
}
