//! Conversion from named-placeholder SQL to positional-placeholder SQL.

use super::token::{scan, TokenKind};
use crate::error::{Error, Result};
use crate::value::{Parameters, Value};

/// The marker every placeholder is rewritten to.
pub const POSITIONAL_MARKER: &str = "?";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Sql(String),
    Named(String),
    Positional,
}

/// A statement scanned once and ready to be bound any number of times.
///
/// Binding holds no state between calls: the positional cursor and the output
/// buffers are local to each [`bind`](Self::bind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    sql: String,
    fragments: Vec<Fragment>,
}

impl ParsedStatement {
    /// Scans `sql` and records where its placeholders are.
    pub fn parse(sql: &str) -> Result<Self> {
        let mut fragments: Vec<Fragment> = Vec::new();

        for token in scan(sql)? {
            match token.kind {
                TokenKind::Named => fragments.push(Fragment::Named(token.text[1..].to_string())),
                TokenKind::Positional => fragments.push(Fragment::Positional),
                _ => match fragments.last_mut() {
                    Some(Fragment::Sql(text)) => text.push_str(token.text),
                    _ => fragments.push(Fragment::Sql(token.text.to_string())),
                },
            }
        }

        Ok(Self {
            sql: sql.to_string(),
            fragments,
        })
    }

    /// The statement as written by the caller.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of placeholder occurrences, named and positional.
    pub fn placeholder_count(&self) -> usize {
        self.fragments
            .iter()
            .filter(|fragment| !matches!(fragment, Fragment::Sql(_)))
            .count()
    }

    /// Named placeholders in statement order, repeats included.
    pub fn named_placeholders(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().filter_map(|fragment| match fragment {
            Fragment::Named(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Resolves every placeholder against `params`.
    ///
    /// A named key used twice yields two values, one per marker.
    ///
    /// # Errors
    ///
    /// [`Error::MissingNamedParameter`] or [`Error::MissingPositionalParameter`]
    /// for the first placeholder without a value.
    pub fn bind(&self, params: &Parameters) -> Result<ConvertedStatement> {
        let mut position = 0;
        let mut fragments = Vec::with_capacity(self.fragments.len());
        let mut values = Vec::with_capacity(self.placeholder_count());

        for fragment in &self.fragments {
            let value = match fragment {
                Fragment::Sql(text) => {
                    fragments.push(text.clone());
                    continue;
                }
                Fragment::Named(name) => {
                    params
                        .get_named(name)
                        .ok_or_else(|| Error::MissingNamedParameter {
                            name: name.clone(),
                            sql: self.sql.clone(),
                        })?
                }
                Fragment::Positional => {
                    let value = params.get_positional(position).ok_or_else(|| {
                        Error::MissingPositionalParameter {
                            index: position,
                            sql: self.sql.clone(),
                        }
                    })?;
                    position += 1;
                    value
                }
            };
            fragments.push(POSITIONAL_MARKER.to_string());
            values.push(value.clone());
        }

        Ok(ConvertedStatement { fragments, values })
    }
}

/// SQL with positional markers only, and the values for those markers in
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedStatement {
    fragments: Vec<String>,
    values: Vec<Value>,
}

impl ConvertedStatement {
    /// The converted SQL text.
    pub fn sql(&self) -> String {
        self.fragments.concat()
    }

    /// The pieces that concatenate to [`sql`](Self::sql). Every marker is a
    /// piece of its own.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn placeholder_count(&self) -> usize {
        self.values.len()
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.fragments.concat(), self.values)
    }
}

/// Converts `sql` to positional placeholders and orders `params` to match.
///
/// ```
/// use sqlx_mysql_shim::{convert, Parameters, Value};
///
/// let params = Parameters::new().bind(":id", 5).bind(":name", "Alice");
/// let converted = convert("UPDATE t SET name = :name WHERE id = :id OR parent = :id", &params)?;
///
/// assert_eq!(converted.sql(), "UPDATE t SET name = ? WHERE id = ? OR parent = ?");
/// assert_eq!(
///     converted.values(),
///     &[Value::from("Alice"), Value::Int(5), Value::Int(5)]
/// );
/// # Ok::<(), sqlx_mysql_shim::Error>(())
/// ```
pub fn convert(sql: &str, params: &Parameters) -> Result<ConvertedStatement> {
    ParsedStatement::parse(sql)?.bind(params)
}

/// Tuple form of [`convert`].
pub fn convert_named_placeholders_to_positional(
    sql: &str,
    params: &Parameters,
) -> Result<(String, Vec<Value>)> {
    convert(sql, params).map(ConvertedStatement::into_parts)
}
