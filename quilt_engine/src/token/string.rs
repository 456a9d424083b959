//! Token strings -- text templates containing `{{...}}` placeholders.

use std::collections::BTreeSet;
use std::fmt;

use crate::invariant::{Caseless, InvariantSet};

use super::{Contextual, TokenKind, TokenLookup, TokenRef, check_input};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Token(TokenRef),
}

/// A raw template plus the value it had after the last successful update.
///
/// Placeholders are resolved against the tokens visible when the string is parsed;
/// anything that can't be resolved (unknown name, malformed or nested
/// placeholder, input the token doesn't accept) is recorded in
/// [`TokenString::invalid_tokens`] and the string never becomes ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenString {
    raw: String,
    segments: Vec<Segment>,
    value: Option<String>,
    tokens: BTreeSet<Caseless>,
    condition_tokens: InvariantSet,
    config_tokens: InvariantSet,
    invalid_tokens: InvariantSet,
}

impl TokenString {
    /// Parse a template, classifying each placeholder against `tokens`.
    pub fn parse(raw: &str, tokens: &dyn TokenLookup) -> TokenString {
        let mut string = TokenString {
            raw: raw.to_string(),
            segments: Vec::new(),
            value: None,
            tokens: BTreeSet::new(),
            condition_tokens: InvariantSet::new(),
            config_tokens: InvariantSet::new(),
            invalid_tokens: InvariantSet::new(),
        };

        for piece in lex(raw) {
            match piece {
                Piece::Text(text) => string.push_text(text),
                Piece::Malformed(text) => {
                    string.invalid_tokens.insert(text);
                },
                Piece::Placeholder(inner) => string.push_placeholder(inner, tokens),
            }
        }
        string
    }

    /// A string with no placeholders; ready immediately.
    pub fn literal(raw: &str) -> TokenString {
        TokenString {
            raw: raw.to_string(),
            segments: vec![Segment::Text(raw.to_string())],
            value: Some(raw.to_string()),
            tokens: BTreeSet::new(),
            condition_tokens: InvariantSet::new(),
            config_tokens: InvariantSet::new(),
            invalid_tokens: InvariantSet::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.segments.last_mut() {
            Some(Segment::Text(prev)) => prev.push_str(text),
            _ => self.segments.push(Segment::Text(text.to_string())),
        }
    }

    fn push_placeholder(&mut self, inner: &str, tokens: &dyn TokenLookup) {
        let Ok(reference) = TokenRef::parse(inner) else {
            self.invalid_tokens.insert(inner.trim());
            return;
        };
        let Some(token) = tokens.token(&reference.name) else {
            self.invalid_tokens.insert(reference.name);
            return;
        };
        if check_input(token, reference.input.as_ref()).is_err() {
            self.invalid_tokens.insert(reference.to_string());
            return;
        }
        match token.kind() {
            TokenKind::Game => {
                self.condition_tokens.insert(token.name());
            },
            TokenKind::Config => {
                self.config_tokens.insert(token.name());
            },
            TokenKind::Dynamic | TokenKind::Host => {},
        }
        self.tokens.insert(Caseless::from(reference.name.as_str()));
        self.segments.push(Segment::Token(reference));
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The substituted value; `None` until an update succeeds with every token ready.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn has_any_tokens(&self) -> bool {
        !self.tokens.is_empty() || !self.invalid_tokens.is_empty()
    }

    /// Built-in game tokens referenced by the template.
    pub fn condition_tokens(&self) -> &InvariantSet {
        &self.condition_tokens
    }

    /// Content-pack config tokens referenced by the template.
    pub fn config_tokens(&self) -> &InvariantSet {
        &self.config_tokens
    }

    /// Placeholders which couldn't be resolved when the template was parsed.
    pub fn invalid_tokens(&self) -> &InvariantSet {
        &self.invalid_tokens
    }

    /// Names of every valid token referenced by the template.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(Caseless::as_str)
    }

    fn render(&self, tokens: &dyn TokenLookup) -> Option<String> {
        if !self.invalid_tokens.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Token(reference) => {
                    let values = tokens.values(&reference.name, reference.input.as_ref()).ok()?;
                    out.push_str(&values.join(", "));
                },
            }
        }
        Some(out)
    }
}

impl Contextual for TokenString {
    fn update(&mut self, tokens: &dyn TokenLookup) -> bool {
        let value = self.render(tokens);
        let changed = value != self.value;
        self.value = value;
        changed
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn collect_tokens(&self, out: &mut BTreeSet<Caseless>) {
        out.extend(self.tokens.iter().cloned());
    }
}

impl fmt::Display for TokenString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value.as_deref().unwrap_or(&self.raw))
    }
}

enum Piece<'a> {
    Text(&'a str),
    Placeholder(&'a str),
    Malformed(&'a str),
}

/// Split a template into literal text and `{{...}}` placeholders.
fn lex(raw: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        let open = rest.find("{{");
        let close = rest.find("}}");
        match open {
            Some(o) if close.is_none_or(|c| o < c) => {
                if o > 0 {
                    pieces.push(Piece::Text(&rest[..o]));
                }
                let body = &rest[o + 2..];
                let Some(end) = body.find("}}") else {
                    pieces.push(Piece::Malformed(&rest[o..]));
                    break;
                };
                let inner = &body[..end];
                if inner.contains("{{") {
                    let Some(outer) = balanced_end(body) else {
                        pieces.push(Piece::Malformed(&rest[o..]));
                        break;
                    };
                    pieces.push(Piece::Malformed(&rest[o..o + 2 + outer]));
                    rest = &body[outer..];
                } else {
                    if inner.trim().is_empty() {
                        pieces.push(Piece::Malformed(&rest[o..o + end + 4]));
                    } else {
                        pieces.push(Piece::Placeholder(inner));
                    }
                    rest = &body[end + 2..];
                }
            },
            _ => match close {
                // closing braces with nothing open
                Some(c) => {
                    if c > 0 {
                        pieces.push(Piece::Text(&rest[..c]));
                    }
                    pieces.push(Piece::Malformed("}}"));
                    rest = &rest[c + 2..];
                },
                None => {
                    pieces.push(Piece::Text(rest));
                    break;
                },
            },
        }
    }
    pieces
}

/// Byte offset just past the `}}` closing an already-open placeholder.
fn balanced_end(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 1;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                depth += 1;
                i += 2;
            },
            (b'}', b'}') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            },
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{GameSnapshot, Season};
    use crate::token::{Scope, TokenContext};

    fn context() -> TokenContext {
        let mut context = TokenContext::with_game_tokens();
        context.update_context(GameSnapshot {
            season: Season::Summer,
            day: 14,
            hearts: [("Abigail".to_string(), 6)].into_iter().collect(),
            ..GameSnapshot::default()
        });
        context
    }

    #[test]
    fn plain_text_round_trips() {
        let context = context();
        let lookup = context.lookup(Scope::Global);
        let mut string = TokenString::parse("Data/Events/Town", &lookup);
        assert!(!string.is_ready());
        string.update(&lookup);
        assert_eq!(string.value(), Some("Data/Events/Town"));
        assert!(!string.has_any_tokens());
    }

    #[test]
    fn placeholders_are_substituted() {
        let context = context();
        let lookup = context.lookup(Scope::Global);
        let mut string = TokenString::parse("Maps/{{season}}_{{Day}} ({{Hearts:Abigail}})", &lookup);
        assert!(string.update(&lookup));
        assert_eq!(string.value(), Some("Maps/Summer_14 (6)"));
        assert!(string.condition_tokens().contains("Season"));
        assert!(string.config_tokens().is_empty());
        // no change on a second update
        assert!(!string.update(&lookup));
    }

    #[test]
    fn unknown_and_malformed_placeholders_are_invalid() {
        let context = context();
        let lookup = context.lookup(Scope::Global);
        for raw in [
            "{{Nope}}",
            "{{Season",
            "Season}}",
            "{{}}",
            "{{ {{Season}} }}",
            "{{9bad}}",
            "{{Season:x}}",
            "{{Hearts}}",
        ] {
            let mut string = TokenString::parse(raw, &lookup);
            assert!(!string.invalid_tokens().is_empty(), "{raw} should be invalid");
            string.update(&lookup);
            assert_eq!(string.value(), None, "{raw} should never become ready");
            assert!(string.has_any_tokens());
        }
    }

    #[test]
    fn list_values_are_joined() {
        let mut context = TokenContext::with_game_tokens();
        context.update_context(GameSnapshot {
            flags: ["a".to_string(), "b".to_string()].into_iter().collect(),
            ..GameSnapshot::default()
        });
        let lookup = context.lookup(Scope::Global);
        let mut string = TokenString::parse("flags: {{HasFlag}}", &lookup);
        string.update(&lookup);
        assert_eq!(string.value(), Some("flags: a, b"));
    }

    #[test]
    fn not_ready_tokens_leave_the_string_unready() {
        let mut context = TokenContext::with_game_tokens();
        context.update_context(GameSnapshot::title_screen());
        let lookup = context.lookup(Scope::Global);
        let mut string = TokenString::parse("{{Season}}", &lookup);
        string.update(&lookup);
        assert!(!string.is_ready());
        assert_eq!(string.to_string(), "{{Season}}");
    }
}
