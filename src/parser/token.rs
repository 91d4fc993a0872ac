//! Scanner that splits SQL text into placeholder and non-placeholder tokens.
//!
//! Only enough of SQL is recognized to keep placeholders inside string
//! literals, quoted identifiers and comments from being mistaken for real
//! ones. At every offset the rules are tried in a fixed priority order:
//!
//! 1. named placeholder (`:name`)
//! 2. positional placeholder (`?` with no `?` on either side)
//! 3. quoted strings and identifiers, `::` runs, comments, plain text
//! 4. any single special character, verbatim
//!
//! The last rule guarantees progress over malformed input such as an
//! unterminated quote.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that can start something other than plain text.
const SPECIAL_CHARS: &str = r#":?'"`\[\-/"#;

/// The compiled scanning rules, in priority order.
struct Rules {
    named: Regex,
    positional: Regex,
    generic: Vec<(TokenKind, Regex)>,
    special: Regex,
}

impl Rules {
    fn compile() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            named: anchored(r":[a-zA-Z0-9_]+")?,
            positional: anchored(r"\?")?,
            generic: vec![
                (TokenKind::SingleQuoted, anchored(r"'[^']*'")?),
                (TokenKind::DoubleQuoted, anchored(r#""[^"]*""#)?),
                (TokenKind::Backtick, anchored(r"`[^`]*`")?),
                (TokenKind::Bracketed, anchored(r"\[[^\]]*\]")?),
                (TokenKind::EscapedMarker, anchored(r":{2,}")?),
                (TokenKind::LineComment, anchored(r"--[^\r\n]*")?),
                (TokenKind::BlockComment, anchored(r"/\*(?:[^*]+|\*+[^/*])*\**\*/")?),
                (TokenKind::Literal, anchored(&format!("[^{SPECIAL_CHARS}]+"))?),
            ],
            special: anchored(&format!("[{SPECIAL_CHARS}]"))?,
        })
    }
}

static RULES: Lazy<std::result::Result<Rules, regex::Error>> = Lazy::new(Rules::compile);

fn anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?s:{pattern})"))
}

/// What a [`Token`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A run of characters containing no special character
    Literal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    /// `[...]` not directly preceded by the `ARRAY` keyword
    Bracketed,
    /// Two or more colons, passed through as is
    EscapedMarker,
    LineComment,
    BlockComment,
    Named,
    Positional,
    /// A lone special character no other rule accepted
    Special,
}

/// A slice of the scanned statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of `text` in the scanned statement
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, TokenKind::Named | TokenKind::Positional)
    }

    /// The parameter name of a named placeholder, without its colon.
    pub fn name(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::Named => Some(&self.text[1..]),
            _ => None,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Splits `sql` into tokens that cover it exactly, in order.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a rule does not compile or the rules fail
/// to consume the whole input. Neither can happen with the current rule
/// set; the checks exist to catch mistakes in the rules themselves.
pub fn scan(sql: &str) -> Result<Vec<Token<'_>>> {
    let rules = RULES.as_ref().map_err(|err| Error::Parse {
        offset: 0,
        message: format!("scanning rule does not compile: {err}"),
    })?;
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < sql.len() {
        let token = next_token(rules, sql, offset).ok_or_else(|| Error::Parse {
            offset,
            message: "no scanning rule matched".to_string(),
        })?;
        if token.text.is_empty() {
            return Err(Error::Parse {
                offset,
                message: format!("{:?} rule matched an empty string", token.kind),
            });
        }
        offset = token.end();
        tokens.push(token);
    }

    let consumed: usize = tokens.iter().map(|token| token.text.len()).sum();
    if consumed != sql.len() {
        return Err(Error::Parse {
            offset: consumed,
            message: format!("consumed {consumed} of {} bytes", sql.len()),
        });
    }

    Ok(tokens)
}

fn next_token<'a>(rules: &Rules, sql: &'a str, offset: usize) -> Option<Token<'a>> {
    let rest = &sql[offset..];
    let token = |kind, len: usize| Token {
        kind,
        text: &rest[..len],
        offset,
    };

    if let Some(m) = rules.named.find(rest) {
        return Some(token(TokenKind::Named, m.end()));
    }

    if let Some(m) = rules.positional.find(rest) {
        let bytes = sql.as_bytes();
        let after_marker = offset > 0 && bytes[offset - 1] == b'?';
        let before_marker = bytes.get(offset + 1) == Some(&b'?');
        if !after_marker && !before_marker {
            return Some(token(TokenKind::Positional, m.end()));
        }
    }

    for (kind, pattern) in &rules.generic {
        if *kind == TokenKind::Bracketed && follows_array_keyword(sql, offset) {
            continue;
        }
        if let Some(m) = pattern.find(rest) {
            return Some(token(*kind, m.end()));
        }
    }

    rules
        .special
        .find(rest)
        .map(|m| token(TokenKind::Special, m.end()))
}

/// `true` when the text right before `offset` is the whole word `ARRAY`, in
/// any case. Brackets there belong to array type syntax, not identifiers.
fn follows_array_keyword(sql: &str, offset: usize) -> bool {
    const KEYWORD: &[u8] = b"ARRAY";

    let head = &sql.as_bytes()[..offset];
    if head.len() < KEYWORD.len() {
        return false;
    }
    let (before, word) = head.split_at(head.len() - KEYWORD.len());
    word.eq_ignore_ascii_case(KEYWORD)
        && before
            .last()
            .map_or(true, |b| !(b.is_ascii_alphanumeric() || *b == b'_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(TokenKind, &str)> {
        scan(sql)
            .unwrap()
            .into_iter()
            .map(|token| (token.kind, token.text))
            .collect()
    }

    #[test]
    fn test_named_and_positional_placeholders() {
        assert_eq!(
            kinds("SELECT a FROM t WHERE id = :id AND b = ?"),
            vec![
                (TokenKind::Literal, "SELECT a FROM t WHERE id = "),
                (TokenKind::Named, ":id"),
                (TokenKind::Literal, " AND b = "),
                (TokenKind::Positional, "?"),
            ]
        );
    }

    #[test]
    fn test_placeholders_inside_quotes_and_comments_are_not_tokens() {
        assert_eq!(
            kinds("SELECT ':id' FROM t -- :id"),
            vec![
                (TokenKind::Literal, "SELECT "),
                (TokenKind::SingleQuoted, "':id'"),
                (TokenKind::Literal, " FROM t "),
                (TokenKind::LineComment, "-- :id"),
            ]
        );
        assert_eq!(
            kinds(r#"/* ? :a */ "?" `:b`"#),
            vec![
                (TokenKind::BlockComment, "/* ? :a */"),
                (TokenKind::Literal, " "),
                (TokenKind::DoubleQuoted, r#""?""#),
                (TokenKind::Literal, " "),
                (TokenKind::Backtick, "`:b`"),
            ]
        );
    }

    #[test]
    fn test_double_colon_is_an_escape_run() {
        assert_eq!(
            kinds("SELECT a::int, b:::c"),
            vec![
                (TokenKind::Literal, "SELECT a"),
                (TokenKind::EscapedMarker, "::"),
                (TokenKind::Literal, "int, b"),
                (TokenKind::EscapedMarker, ":::"),
                (TokenKind::Literal, "c"),
            ]
        );
    }

    #[test]
    fn test_repeated_question_marks_are_not_positional() {
        assert_eq!(
            kinds("a ?? b"),
            vec![
                (TokenKind::Literal, "a "),
                (TokenKind::Special, "?"),
                (TokenKind::Special, "?"),
                (TokenKind::Literal, " b"),
            ]
        );
    }

    #[test]
    fn test_brackets_after_array_keyword() {
        assert_eq!(
            kinds("SELECT [col] FROM t"),
            vec![
                (TokenKind::Literal, "SELECT "),
                (TokenKind::Bracketed, "[col]"),
                (TokenKind::Literal, " FROM t"),
            ]
        );
        assert_eq!(
            kinds("ARRAY[:a]"),
            vec![
                (TokenKind::Literal, "ARRAY"),
                (TokenKind::Special, "["),
                (TokenKind::Named, ":a"),
                (TokenKind::Literal, "]"),
            ]
        );
        // Only the whole word counts.
        assert_eq!(kinds("XARRAY[:a]")[1], (TokenKind::Bracketed, "[:a]"));
        assert_eq!(kinds("array[:a]")[1], (TokenKind::Special, "["));
    }

    #[test]
    fn test_unterminated_constructs_fall_back_to_single_characters() {
        assert_eq!(
            kinds("'abc :x"),
            vec![
                (TokenKind::Special, "'"),
                (TokenKind::Literal, "abc "),
                (TokenKind::Named, ":x"),
            ]
        );
        assert_eq!(kinds("/* open")[0], (TokenKind::Special, "/"));
        assert_eq!(kinds("a - b")[1], (TokenKind::Special, "-"));
    }

    #[test]
    fn test_block_comment_spans_lines() {
        assert_eq!(
            kinds("/* one\n** two */x"),
            vec![
                (TokenKind::BlockComment, "/* one\n** two */"),
                (TokenKind::Literal, "x"),
            ]
        );
    }

    #[test]
    fn test_offsets_and_names() {
        let tokens = scan("é = :name_1").unwrap();
        let named = tokens.last().unwrap();
        assert_eq!(named.offset, "é = ".len());
        assert_eq!(named.name(), Some("name_1"));
        assert!(named.is_placeholder());
    }

    #[test]
    fn test_scanning_rules_compile() {
        let rules = RULES.as_ref().unwrap();
        assert_eq!(rules.generic.len(), 8);
        assert_eq!(rules.generic.last().map(|(kind, _)| *kind), Some(TokenKind::Literal));
    }

    #[test]
    fn test_empty_input() {
        assert!(scan("").unwrap().is_empty());
    }
}
