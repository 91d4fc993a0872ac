//! Property-based tests for placeholder scanning and conversion
//!
//! These tests verify that:
//! - Scanning accounts for every byte of any input
//! - Conversion is deterministic and emits one value per marker
//! - Placeholders inside literals and comments are never touched

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sqlx_mysql_shim::{convert, scan, Parameters, ParsedStatement, TokenKind, Value};

    #[derive(Debug, Clone)]
    enum Piece {
        Text(String),
        Named(String),
        Positional,
    }

    fn arb_piece() -> impl Strategy<Value = Piece> {
        prop_oneof![
            3 => "[a-zA-Z0-9 ,=()<>]{1,12}".prop_map(Piece::Text),
            2 => "[a-z_][a-z0-9_]{0,8}".prop_map(Piece::Named),
            1 => Just(Piece::Positional),
        ]
    }

    /// Joins pieces with spaces, so no placeholder runs into its neighbour.
    fn render(pieces: &[Piece]) -> String {
        pieces
            .iter()
            .map(|piece| match piece {
                Piece::Text(text) => text.clone(),
                Piece::Named(name) => format!(":{name}"),
                Piece::Positional => "?".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn params_for(pieces: &[Piece]) -> Parameters {
        let mut params = Parameters::new();
        let mut position = 0i64;
        for piece in pieces {
            match piece {
                Piece::Named(name) => params.insert(name.as_str(), name.as_str()),
                Piece::Positional => {
                    params.push(position);
                    position += 1;
                }
                Piece::Text(_) => {}
            }
        }
        params
    }

    proptest! {
        #[test]
        fn test_scan_covers_input_exactly(sql in "\\PC{0,64}") {
            let tokens = scan(&sql).unwrap();

            let mut offset = 0;
            for token in &tokens {
                prop_assert_eq!(token.offset, offset);
                prop_assert!(!token.text.is_empty());
                offset = token.end();
            }
            let rebuilt: String = tokens.iter().map(|token| token.text).collect();
            prop_assert_eq!(rebuilt, sql);
        }

        #[test]
        fn test_scan_survives_sql_punctuation(sql in "[a-z:?'\"`\\[\\]\\-/* \n]{0,48}") {
            let tokens = scan(&sql).unwrap();
            let rebuilt: String = tokens.iter().map(|token| token.text).collect();
            prop_assert_eq!(rebuilt, sql);
        }

        #[test]
        fn test_conversion_emits_one_value_per_marker(
            pieces in prop::collection::vec(arb_piece(), 0..12)
        ) {
            let sql = render(&pieces);
            let params = params_for(&pieces);

            let parsed = ParsedStatement::parse(&sql).unwrap();
            let converted = parsed.bind(&params).unwrap();

            let expected_markers = pieces
                .iter()
                .filter(|piece| !matches!(piece, Piece::Text(_)))
                .count();
            prop_assert_eq!(parsed.placeholder_count(), expected_markers);
            prop_assert_eq!(converted.values().len(), expected_markers);
            prop_assert_eq!(converted.sql().matches('?').count(), expected_markers);
            prop_assert!(!converted.sql().contains(':'));
        }

        #[test]
        fn test_conversion_orders_values_by_occurrence(
            pieces in prop::collection::vec(arb_piece(), 0..12)
        ) {
            let sql = render(&pieces);
            let converted = convert(&sql, &params_for(&pieces)).unwrap();

            let mut position = 0i64;
            let expected: Vec<Value> = pieces
                .iter()
                .filter_map(|piece| match piece {
                    Piece::Named(name) => Some(Value::from(name.as_str())),
                    Piece::Positional => {
                        position += 1;
                        Some(Value::Int(position - 1))
                    }
                    Piece::Text(_) => None,
                })
                .collect();
            prop_assert_eq!(converted.values(), expected.as_slice());
        }

        #[test]
        fn test_conversion_is_deterministic(
            pieces in prop::collection::vec(arb_piece(), 0..12)
        ) {
            let sql = render(&pieces);
            let params = params_for(&pieces);
            let parsed = ParsedStatement::parse(&sql).unwrap();

            let first = parsed.bind(&params).unwrap();
            let second = parsed.bind(&params).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first, convert(&sql, &params).unwrap());
        }

        #[test]
        fn test_quoted_text_is_left_alone(body in "[a-z0-9_ :?]{0,24}") {
            for quote in ['\'', '"', '`'] {
                let sql = format!("SELECT {quote}{body}{quote} FROM t");
                let converted = convert(&sql, &Parameters::new()).unwrap();
                prop_assert_eq!(converted.sql(), sql);
                prop_assert!(converted.values().is_empty());
            }
        }

        #[test]
        fn test_comments_are_left_alone(body in "[a-z0-9_ :?]{0,24}") {
            for sql in [
                format!("SELECT 1 -- {body}"),
                format!("SELECT 1 /* {body} */ FROM t"),
            ] {
                let tokens = scan(&sql).unwrap();
                prop_assert!(tokens.iter().all(|token| !token.is_placeholder()));
                prop_assert!(tokens
                    .iter()
                    .any(|token| matches!(token.kind, TokenKind::LineComment | TokenKind::BlockComment)));
            }
        }
    }
}
