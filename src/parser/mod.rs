//! SQL placeholder scanning and conversion.

pub mod converter;
pub mod token;

pub use converter::{
    convert, convert_named_placeholders_to_positional, ConvertedStatement, ParsedStatement,
    POSITIONAL_MARKER,
};
pub use token::{scan, Token, TokenKind};
