//! Minimal comma-separated text codec shared by import, export and manifests.

use crate::errors::ServiceError;

/// Quotes `value` only when it carries a delimiter, quote or line break.
pub fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        quote_field(value)
    } else {
        value.to_string()
    }
}

/// Always wraps `value` in double quotes, doubling embedded quotes.
pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn write_record<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits `text` into records. Quoted fields may span lines; a leading
/// byte-order mark and blank lines are skipped.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>, ServiceError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut quote_opened_at = 0usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_opened_at = line;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ServiceError::BadRequest(format!(
            "unterminated quoted field starting on line {quote_opened_at}"
        )));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.iter().all(|f| f.is_empty());
    if !blank {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_only_when_needed() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field(""), "\"\"");
    }

    #[test]
    fn parses_quoted_fields_with_commas_and_newlines() {
        let text = "id,name\r\n1,\"Acme, Inc\"\n2,\"two\nlines\"\n";
        let records = parse_records(text).unwrap();
        assert_eq!(
            records,
            vec![
                vec!["id".to_string(), "name".to_string()],
                vec!["1".to_string(), "Acme, Inc".to_string()],
                vec!["2".to_string(), "two\nlines".to_string()],
            ]
        );
    }

    #[test]
    fn skips_bom_and_blank_lines() {
        let records = parse_records("\u{feff}a,b\n\n1,2").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], "a");
        assert_eq!(records[1], vec!["1", "2"]);
    }

    #[test]
    fn keeps_trailing_empty_fields() {
        let records = parse_records("a,b,c\n1,,\n").unwrap();
        assert_eq!(records[1], vec!["1", "", ""]);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse_records("a\n\"open").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn written_records_parse_back() {
        let fields = ["x", "a,b", "q\"q", ""];
        let line = write_record(&fields);
        let parsed = parse_records(&line).unwrap();
        assert_eq!(parsed[0], fields);
    }
}
