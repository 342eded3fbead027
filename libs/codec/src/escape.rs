//! Delimiter escaping and field splitting.
//!
//! The wire writes `|` inside a value as `\|` and a literal backslash as
//! `\\`. Any other `\x` pair passes through verbatim, so sloppy senders
//! lose nothing.

use crate::DELIMITER;

const ESCAPE: char = '\\';

/// Split a line on unescaped delimiters, unescaping each field.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(next) if next == DELIMITER || next == ESCAPE => current.push(next),
                Some(next) => {
                    current.push(ESCAPE);
                    current.push(next);
                }
                None => current.push(ESCAPE),
            }
        } else if c == DELIMITER {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

/// Escape a single field for the wire.
pub fn escape_field(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        if c == DELIMITER || c == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Join pre-unescaped fields into a wire line, escaping each.
pub fn join_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&escape_field(field.as_ref()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_fields() {
        assert_eq!(split_fields("a|b|c"), vec!["a", "b", "c"]);
        assert_eq!(split_fields("a||c"), vec!["a", "", "c"]);
        assert_eq!(split_fields(""), vec![""]);
    }

    #[test]
    fn unescapes_delimiter_and_backslash() {
        assert_eq!(split_fields(r"a\|b|c"), vec!["a|b", "c"]);
        assert_eq!(split_fields(r"a\\|b"), vec![r"a\", "b"]);
        // Unknown escapes pass through verbatim.
        assert_eq!(split_fields(r"a\nb"), vec![r"a\nb"]);
        // Trailing lone escape is kept.
        assert_eq!(split_fields(r"a\"), vec![r"a\"]);
    }

    #[test]
    fn escape_then_split_round_trips() {
        for field in ["plain", "with|pipe", r"back\slash", r"both\|", ""] {
            let line = join_fields([field, "tail"]);
            assert_eq!(split_fields(&line), vec![field, "tail"]);
        }
    }
}
