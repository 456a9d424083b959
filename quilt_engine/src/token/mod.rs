//! Token module --
//!
//! A token is a named value source (`{{Season}}`, `{{Hearts:Abigail}}`) whose values
//! depend on the game context and possibly on other tokens. Every kind of token,
//! including ones provided by the host, implements the [`Token`] trait and lives in
//! a [`TokenContext`].

pub mod context;
pub mod dynamic;
pub mod game;
pub mod string;

pub use context::{ChangedTokens, Scope, TokenContext, TokenFailure, UpdateReport};
pub use dynamic::{DynamicToken, DynamicValue};
pub use game::GameToken;
pub use string::TokenString;

use std::collections::BTreeSet;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::TokenError;
use crate::invariant::{Caseless, InvariantSet};
use crate::snapshot::GameSnapshot;

lazy_static! {
    static ref TOKEN_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*(/[A-Za-z_][A-Za-z0-9_.\-]*)?$").unwrap();
    static ref ARG_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Returns true if `name` can be used as a token name.
pub fn is_valid_token_name(name: &str) -> bool {
    TOKEN_NAME.is_match(name)
}

/// Where a token's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Built-in token reading the game snapshot.
    Game,
    /// Content-pack config field.
    Config,
    /// Content-pack token chosen by conditions.
    Dynamic,
    /// Token supplied by the host application.
    Host,
}

/// A named value source.
///
/// Implementations are registered with a [`TokenContext`], which calls
/// [`Token::update`] on every context refresh (in dependency order) and checks
/// input arguments before calling [`Token::values`].
pub trait Token {
    fn name(&self) -> &str;

    fn kind(&self) -> TokenKind {
        TokenKind::Host
    }

    /// Mutable tokens are re-evaluated on every refresh; immutable tokens only until
    /// their first successful evaluation.
    fn is_mutable(&self) -> bool {
        true
    }

    fn allows_input(&self) -> bool {
        false
    }

    fn requires_input(&self) -> bool {
        false
    }

    /// Names of other tokens this token reads while updating.
    fn tokens_used(&self) -> Vec<String> {
        Vec::new()
    }

    /// The finite set of values this token can return, if it has one.
    fn valid_values(&self, _input: Option<&TokenInput>) -> Option<InvariantSet> {
        None
    }

    fn is_ready(&self) -> bool;

    /// Re-evaluate the token for a new snapshot. Returns true if its values or
    /// readiness changed.
    ///
    /// # Errors
    /// - if the token can't be evaluated; dependents are skipped for this refresh
    fn update(&mut self, snapshot: &GameSnapshot, tokens: &dyn TokenLookup) -> Result<bool, TokenError>;

    /// Current values for an (already validated) input.
    ///
    /// # Errors
    /// - if the token is not ready or the input can't be resolved
    fn values(&self, input: Option<&TokenInput>) -> Result<Vec<String>, TokenError>;
}

/// Read-only access to the tokens visible from one scope.
pub trait TokenLookup {
    fn token(&self, name: &str) -> Option<&dyn Token>;

    /// Read a token's values, enforcing its input rules and readiness.
    ///
    /// # Errors
    /// - `Unknown`, `InputNotAllowed`, `InputRequired` or `NotReady`
    fn values(&self, name: &str, input: Option<&TokenInput>) -> Result<Vec<String>, TokenError> {
        let token = self.token(name).ok_or_else(|| TokenError::Unknown(name.to_string()))?;
        check_input(token, input)?;
        if !token.is_ready() {
            return Err(TokenError::NotReady(token.name().to_string()));
        }
        token.values(input)
    }

    fn is_ready(&self, name: &str) -> bool {
        self.token(name).is_some_and(|token| token.is_ready())
    }
}

/// Verify that an input (or its absence) is acceptable for a token.
///
/// # Errors
/// - `InputNotAllowed` if input is given to a token which doesn't take any
/// - `InputRequired` if a token requiring input gets none
pub fn check_input(token: &dyn Token, input: Option<&TokenInput>) -> Result<(), TokenError> {
    let has_input = input.is_some_and(|i| !i.is_empty());
    if has_input && !token.allows_input() {
        return Err(TokenError::InputNotAllowed(token.name().to_string()));
    }
    if !has_input && token.requires_input() {
        return Err(TokenError::InputRequired(token.name().to_string()));
    }
    Ok(())
}

/// Input arguments passed to a token: `{{Name:positional|key=value}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenInput {
    pub positional: Option<String>,
    pub named: Vec<(String, String)>,
}

impl TokenInput {
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            positional: Some(value.into()),
            named: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_none() && self.named.is_empty()
    }

    /// Value of a named argument, matched ignoring case.
    pub fn named(&self, key: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for TokenInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(positional) = &self.positional {
            f.write_str(positional)?;
        }
        for (key, value) in &self.named {
            write!(f, "|{key}={value}")?;
        }
        Ok(())
    }
}

/// A parsed token reference: the text between `{{` and `}}`, or a condition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef {
    pub name: String,
    pub input: Option<TokenInput>,
}

impl TokenRef {
    /// Parse `Name`, `Name:input`, `Name|key=value` or `Name:input|key=value`.
    ///
    /// # Errors
    /// - a description of the problem if the text isn't a well-formed reference
    pub fn parse(text: &str) -> Result<TokenRef, String> {
        let mut segments = text.split('|');
        let head = segments.next().unwrap_or_default().trim();
        let (name, positional) = match head.split_once(':') {
            Some((name, input)) => {
                let input = input.trim();
                if input.is_empty() {
                    return Err(format!("'{text}' has an empty input argument"));
                }
                (name.trim(), Some(input.to_string()))
            },
            None => (head, None),
        };
        if !is_valid_token_name(name) {
            return Err(format!("'{name}' is not a valid token name"));
        }

        let mut named = Vec::new();
        for segment in segments {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(format!("argument '{}' must have the form key=value", segment.trim()));
            };
            let key = key.trim();
            if !ARG_NAME.is_match(key) {
                return Err(format!("'{key}' is not a valid argument name"));
            }
            named.push((key.to_string(), value.trim().to_string()));
        }

        let input = TokenInput { positional, named };
        Ok(TokenRef {
            name: name.to_string(),
            input: (!input.is_empty()).then_some(input),
        })
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        match &self.input {
            Some(input) if input.positional.is_some() => write!(f, ":{input}"),
            Some(input) => write!(f, "{input}"),
            None => Ok(()),
        }
    }
}

/// Something whose value depends on tokens and must be refreshed when they change.
pub trait Contextual {
    /// Re-resolve against the current token values. Returns true if anything changed.
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool;

    fn is_ready(&self) -> bool;

    /// Add the names of every token this value reads to `out`.
    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>);
}

impl<T: Contextual> Contextual for Option<T> {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        self.as_mut().is_some_and(|inner| inner.update(tokens))
    }

    fn is_ready(&self) -> bool {
        self.as_ref().is_none_or(Contextual::is_ready)
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        if let Some(inner) = self {
            inner.collect_tokens(out);
        }
    }
}

impl<T: Contextual> Contextual for Vec<T> {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        // no short-circuit: every element must be refreshed
        self.iter_mut().fold(false, |changed, item| item.update(tokens) || changed)
    }

    fn is_ready(&self) -> bool {
        self.iter().all(Contextual::is_ready)
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        for item in self {
            item.collect_tokens(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ref_parses_every_form() {
        let plain = TokenRef::parse("Season").unwrap();
        assert_eq!(plain.name, "Season");
        assert!(plain.input.is_none());

        let positional = TokenRef::parse(" Hearts : Abigail ").unwrap();
        assert_eq!(positional.name, "Hearts");
        assert_eq!(positional.input, Some(TokenInput::positional("Abigail")));

        let named = TokenRef::parse("Random|key=seed").unwrap();
        assert_eq!(named.input.as_ref().and_then(|i| i.named("KEY")), Some("seed"));

        let both = TokenRef::parse("HasFlag:beatGame|contains=x").unwrap();
        assert_eq!(both.to_string(), "HasFlag:beatGame|contains=x");
    }

    #[test]
    fn token_ref_rejects_malformed_text() {
        assert!(TokenRef::parse("").is_err());
        assert!(TokenRef::parse("9lives").is_err());
        assert!(TokenRef::parse("Hearts:").is_err());
        assert!(TokenRef::parse("Name|novalue").is_err());
        assert!(TokenRef::parse("Name|bad key=1").is_err());
    }

    #[test]
    fn mod_qualified_names_are_valid() {
        assert!(is_valid_token_name("Author.Mod/Token"));
        assert!(!is_valid_token_name("a/b/c"));
        assert!(!is_valid_token_name("has space"));
    }
}
