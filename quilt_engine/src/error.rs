//! Error types shared across the engine.
//!
//! - [`DefinitionError`]: a content-pack declaration can't be used (reported at load time, entry skipped)
//! - [`TokenError`]: a token was read incorrectly or isn't available yet
//! - [`ConflictError`]: several patches want to load the same asset

use thiserror::Error;

/// Problems with a token, condition, config field or patch declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("'{key}' isn't a valid condition; must be one of {}", .valid.join(", "))]
    UnknownConditionKey { key: String, valid: Vec<String> },
    #[error("invalid value '{value}' for condition '{key}'; expected one of {}", .valid.join(", "))]
    InvalidConditionValue {
        key: String,
        value: String,
        valid: Vec<String>,
    },
    #[error("invalid input for condition '{key}': {reason}")]
    InvalidConditionInput { key: String, reason: String },
    #[error("condition '{0}' has no values")]
    EmptyCondition(String),
    #[error("condition '{0}' has no finite set of values")]
    UnboundedCondition(String),
    #[error("too many permutations of {}", .0.join(", "))]
    TooManyPermutations(Vec<String>),
    #[error("'{0}' is not a valid token name")]
    InvalidTokenName(String),
    #[error("token '{0}' is already registered in this scope")]
    DuplicateToken(String),
    #[error("token '{name}' would create a dependency cycle ({})", .path.join(" -> "))]
    CyclicDependency { name: String, path: Vec<String> },
    #[error("{context} contains unrecognized tokens: {}", .tokens.join(", "))]
    InvalidTokens { context: String, tokens: Vec<String> },
    #[error("invalid config field '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },
    #[error("invalid {context}: {reason}")]
    InvalidPatch { context: String, reason: String },
}

/// Errors raised while reading or updating a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("unknown token '{0}'")]
    Unknown(String),
    #[error("token '{0}' does not accept input arguments")]
    InputNotAllowed(String),
    #[error("token '{0}' requires an input argument")]
    InputRequired(String),
    #[error("token '{0}' is not ready")]
    NotReady(String),
    #[error("token '{name}' failed to update: {reason}")]
    Evaluation { name: String, reason: String },
}

/// Two or more matching patches load the same asset; none of them is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{asset}' is loaded by several patches at once ({}); none of them was applied", .patches.join(", "))]
pub struct ConflictError {
    pub asset: String,
    /// Log names of the conflicting patches.
    pub patches: Vec<String>,
    /// Ids of the packs that own them, in declaration order.
    pub packs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_condition_message_lists_valid_keys() {
        let err = DefinitionError::UnknownConditionKey {
            key: "Seasn".into(),
            valid: vec!["Day".into(), "Season".into()],
        };
        assert_eq!(err.to_string(), "'Seasn' isn't a valid condition; must be one of Day, Season");
    }

    #[test]
    fn cycle_message_shows_path() {
        let err = DefinitionError::CyclicDependency {
            name: "A".into(),
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "token 'A' would create a dependency cycle (A -> B -> A)");
    }
}
