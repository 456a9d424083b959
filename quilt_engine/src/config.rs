//! Content-pack config fields and the tokens exposing them.
//!
//! Each field declared in a pack's `ConfigSchema` becomes an immutable pack-local
//! token holding the player's chosen value (or the field's default).

use log::warn;

use quilt_data::{ConfigFieldDef, split_values};

use crate::error::{DefinitionError, TokenError};
use crate::invariant::InvariantSet;
use crate::snapshot::GameSnapshot;
use crate::token::{Token, TokenInput, TokenKind, TokenLookup};

/// A validated config field and its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigField {
    name: String,
    allowed: InvariantSet,
    default: InvariantSet,
    allow_blank: bool,
    allow_multiple: bool,
    value: InvariantSet,
}

impl ConfigField {
    /// Build a field from its declaration; the value starts at the default.
    ///
    /// # Errors
    /// - `InvalidConfig` if the defaults break the field's own rules
    pub fn from_def(name: &str, def: &ConfigFieldDef) -> Result<ConfigField, DefinitionError> {
        let allowed: InvariantSet = def.allow_values.as_deref().map(split_values).unwrap_or_default().into_iter().collect();
        let mut field = ConfigField {
            name: name.to_string(),
            allowed,
            default: InvariantSet::new(),
            allow_blank: def.allow_blank,
            allow_multiple: def.allow_multiple,
            value: InvariantSet::new(),
        };
        let default = field.validate_value(def.default.as_deref().unwrap_or_default())?;
        field.value = default.clone();
        field.default = default;
        Ok(field)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allowed values; empty means any value is allowed.
    pub fn allowed(&self) -> &InvariantSet {
        &self.allowed
    }

    pub fn default_value(&self) -> &InvariantSet {
        &self.default
    }

    pub fn value(&self) -> &InvariantSet {
        &self.value
    }

    pub fn allow_blank(&self) -> bool {
        self.allow_blank
    }

    pub fn allow_multiple(&self) -> bool {
        self.allow_multiple
    }

    /// Check a comma-delimited value against the field's rules.
    ///
    /// # Errors
    /// - `InvalidConfig` describing the first rule the value breaks
    pub fn validate_value(&self, raw: &str) -> Result<InvariantSet, DefinitionError> {
        let values: InvariantSet = split_values(raw).into_iter().collect();
        let invalid = |reason: String| DefinitionError::InvalidConfig {
            name: self.name.clone(),
            reason,
        };
        if values.is_empty() && !self.allow_blank {
            return Err(invalid("a value is required".to_string()));
        }
        if values.len() > 1 && !self.allow_multiple {
            return Err(invalid(format!("only one value is allowed, got '{values}'")));
        }
        if !self.allowed.is_empty()
            && let Some(bad) = values.iter().find(|value| !self.allowed.contains(value))
        {
            return Err(invalid(format!("'{bad}' is not one of {}", self.allowed)));
        }
        Ok(values)
    }

    /// Apply the player's configured value; invalid values keep the default.
    ///
    /// Returns true if the user value was accepted.
    pub fn apply_user_value(&mut self, raw: &str) -> bool {
        match self.validate_value(raw) {
            Ok(values) => {
                self.value = values;
                true
            },
            Err(err) => {
                warn!("{err}; using default '{}'", self.default);
                self.value = self.default.clone();
                false
            },
        }
    }

    /// True if the only allowed values are `true` and `false`.
    pub fn is_boolean(&self) -> bool {
        self.allowed.len() == 2 && self.allowed.contains("true") && self.allowed.contains("false")
    }

    /// The `(min, max)` range when the allowed values are contiguous integers.
    ///
    /// Needs at least two values, so a single allowed number is not a range.
    pub fn numeric_range(&self) -> Option<(i32, i32)> {
        if self.allowed.len() < 2 {
            return None;
        }
        let mut numbers = self
            .allowed
            .iter()
            .map(|value| value.parse::<i32>().ok())
            .collect::<Option<Vec<i32>>>()?;
        numbers.sort_unstable();
        numbers.dedup();
        let (&min, &max) = (numbers.first()?, numbers.last()?);
        let span = i64::from(max) - i64::from(min) + 1;
        (usize::try_from(span).ok()? == numbers.len()).then_some((min, max))
    }
}

/// Pack-local token exposing a config field's value.
#[derive(Debug, Clone)]
pub struct ConfigToken {
    field: ConfigField,
    ready: bool,
}

impl ConfigToken {
    pub fn new(field: ConfigField) -> Self {
        Self { field, ready: false }
    }

    pub fn field(&self) -> &ConfigField {
        &self.field
    }
}

impl Token for ConfigToken {
    fn name(&self) -> &str {
        self.field.name()
    }

    fn kind(&self) -> TokenKind {
        TokenKind::Config
    }

    fn is_mutable(&self) -> bool {
        false
    }

    fn valid_values(&self, _input: Option<&TokenInput>) -> Option<InvariantSet> {
        (!self.field.allowed.is_empty()).then(|| self.field.allowed.clone())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn update(&mut self, _snapshot: &GameSnapshot, _tokens: &dyn TokenLookup) -> Result<bool, TokenError> {
        let changed = !self.ready;
        self.ready = true;
        Ok(changed)
    }

    fn values(&self, _input: Option<&TokenInput>) -> Result<Vec<String>, TokenError> {
        Ok(self.field.value.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(allow: Option<&str>, default: Option<&str>) -> ConfigFieldDef {
        ConfigFieldDef {
            allow_values: allow.map(str::to_string),
            default: default.map(str::to_string),
            ..ConfigFieldDef::default()
        }
    }

    #[test]
    fn defaults_become_the_value() {
        let field = ConfigField::from_def("Material", &def(Some("Wood, Stone"), Some("stone"))).unwrap();
        assert_eq!(field.value().to_vec(), vec!["stone"]);
        assert!(!field.is_boolean());
        assert_eq!(field.numeric_range(), None);
    }

    #[test]
    fn invalid_defaults_are_rejected() {
        let err = ConfigField::from_def("Material", &def(Some("Wood, Stone"), Some("Gold"))).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidConfig { ref name, .. } if name == "Material"));

        let strict = ConfigFieldDef {
            allow_blank: false,
            ..ConfigFieldDef::default()
        };
        assert!(ConfigField::from_def("Required", &strict).is_err());
    }

    #[test]
    fn user_values_fall_back_to_default_when_invalid() {
        let mut field = ConfigField::from_def("Material", &def(Some("Wood, Stone"), Some("Wood"))).unwrap();
        assert!(field.apply_user_value("STONE"));
        assert!(field.value().contains("stone"));
        assert!(!field.apply_user_value("Wood, Stone"));
        assert_eq!(field.value().to_vec(), vec!["Wood"]);
    }

    #[test]
    fn boolean_and_numeric_fields() {
        let toggle = ConfigField::from_def("Enabled", &def(Some("true, false"), Some("true"))).unwrap();
        assert!(toggle.is_boolean());

        let range = ConfigField::from_def("Level", &def(Some("3, 1, 2, 4"), None)).unwrap();
        assert_eq!(range.numeric_range(), Some((1, 4)));

        let gap = ConfigField::from_def("Level", &def(Some("1, 2, 5"), None)).unwrap();
        assert_eq!(gap.numeric_range(), None);

        let single = ConfigField::from_def("Level", &def(Some("7"), None)).unwrap();
        assert_eq!(single.numeric_range(), None);
    }

    #[test]
    fn config_token_is_immutable_and_bounded() {
        let field = ConfigField::from_def("Material", &def(Some("Wood, Stone"), Some("Wood"))).unwrap();
        let token = ConfigToken::new(field);
        assert!(!token.is_mutable());
        assert_eq!(token.kind(), TokenKind::Config);
        assert_eq!(token.valid_values(None).map(|v| v.len()), Some(2));
    }
}
