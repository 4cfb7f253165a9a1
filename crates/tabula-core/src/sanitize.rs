//! Response sanitization
//!
//! Turns whatever JSON the remote endpoint returned into a well-formed
//! `CachedRecordSet`. Fields are coerced to safe defaults rather than
//! rejected, so one bad row never discards the batch.

use serde_json::Value;
use tracing::debug;

use crate::model::{CachedRecordSet, Column, Row, Rows};

/// Sanitize a parsed remote document into a record set
///
/// Expected shape:
/// `{ title, data: { headers: [..], rows: { key: {id, fname, lname, email, date} } } }`.
/// Headers are always the five known columns; the source's own header list
/// is ignored.
pub fn sanitize_record_set(value: &Value) -> CachedRecordSet {
    let title = value.get("title").map(sanitize_text_field).unwrap_or_default();
    let data = value.get("data");

    if let Some(source_headers) = data.and_then(|d| d.get("headers")).and_then(Value::as_array) {
        let unknown: Vec<_> = source_headers
            .iter()
            .filter_map(Value::as_str)
            .filter(|label| Column::from_label(label).is_none())
            .collect();
        if !unknown.is_empty() {
            debug!("Dropping unknown source headers: {:?}", unknown);
        }
    }

    let rows = match data.and_then(|d| d.get("rows")) {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(key, row)| sanitize_row(row).map(|row| (key.clone(), row)))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, row)| sanitize_row(row).map(|row| (index.to_string(), row)))
            .collect(),
        _ => Rows::new(),
    };

    CachedRecordSet {
        title,
        headers: Column::ALL.iter().map(|c| c.label().to_string()).collect(),
        rows,
    }
}

/// Sanitize one row; entries that are not objects are dropped
pub fn sanitize_row(value: &Value) -> Option<Row> {
    let fields = value.as_object()?;
    let field = |name: &str| fields.get(name).unwrap_or(&Value::Null);

    Some(Row {
        id: absint(field("id")),
        first_name: sanitize_text_field(field("fname")),
        last_name: sanitize_text_field(field("lname")),
        email: sanitize_email(&scalar_to_string(field("email"))),
        timestamp: absint(field("date")),
    })
}

/// String form of a scalar; containers and null become empty
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}

/// Plain single-line text: tags and percent-encoded octets removed,
/// whitespace collapsed and trimmed
pub fn sanitize_text_field(value: &Value) -> String {
    let raw = scalar_to_string(value);
    let stripped = strip_octets(&strip_tags(&raw));
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove HTML tags; `<script>` and `<style>` lose their contents too.
/// A `<` not followed by a tag-like character stays a literal `<` rather
/// than `&lt;`; record sets hold plain text and every renderer escapes it.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let tag_like = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?');
        if !tag_like {
            out.push('<');
            rest = after;
            continue;
        }

        let Some(end) = after.find('>') else {
            // Unterminated tag swallows the remainder
            return out;
        };

        let name: String = after
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        rest = &after[end + 1..];

        if name == "script" || name == "style" {
            let closing = format!("</{}", name);
            rest = match rest.to_ascii_lowercase().find(&closing) {
                Some(pos) => {
                    let tail = &rest[pos..];
                    tail.find('>').map(|gt| &tail[gt + 1..]).unwrap_or("")
                }
                None => "",
            };
        }
    }

    out.push_str(rest);
    out
}

/// Remove `%XX` sequences until none remain
fn strip_octets(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let bytes = current.as_bytes();
        let mut out = String::with_capacity(current.len());
        let mut changed = false;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'%'
                && i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit()
            {
                i += 3;
                changed = true;
                continue;
            }
            let ch = current[i..].chars().next().unwrap_or_default();
            out.push(ch);
            i += ch.len_utf8().max(1);
        }

        if !changed {
            return out;
        }
        current = out;
    }
}

/// Absolute integer value, zero when the input is not numeric
pub fn absint(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(i) = n.as_i64() {
                i.unsigned_abs()
            } else {
                n.as_f64().map(float_to_absint).unwrap_or(0)
            }
        }
        Value::String(s) => string_to_absint(s),
        Value::Bool(true) => 1,
        _ => 0,
    }
}

fn float_to_absint(f: f64) -> u64 {
    if !f.is_finite() {
        return 0;
    }
    // `as` saturates at u64::MAX
    f.trunc().abs() as u64
}

fn string_to_absint(s: &str) -> u64 {
    let trimmed = s.trim();

    // Whole numeric strings, including "12.5" and "1e3"
    if trimmed.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) {
        if let Ok(f) = trimmed.parse::<f64>() {
            if let Ok(i) = trimmed.parse::<i64>() {
                return i.unsigned_abs();
            }
            return float_to_absint(f);
        }
    }

    // Otherwise the leading integer prefix: "12abc" -> 12
    let mut chars = trimmed.chars().peekable();
    if matches!(chars.peek(), Some('+') | Some('-')) {
        chars.next();
    }
    chars
        .take_while(|c| c.is_ascii_digit())
        .fold(0u64, |acc, c| {
            acc.saturating_mul(10)
                .saturating_add(u64::from(c.to_digit(10).unwrap_or(0)))
        })
}

/// Whitespace trimmed from domain parts
const DOMAIN_TRIM: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// A cleaned `local@domain` address, or empty when the input does not look
/// like one
pub fn sanitize_email(email: &str) -> String {
    if email.len() < 6 {
        return String::new();
    }

    // Split at the first `@`; a leading `@` leaves no local part
    let at = match email.find('@') {
        Some(at) if at > 0 => at,
        _ => return String::new(),
    };

    let local: String = email[..at]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(*c))
        .collect();
    if local.is_empty() {
        return String::new();
    }

    let domain = &email[at + 1..];
    if domain.contains("..") {
        return String::new();
    }

    let domain = domain.trim_matches(|c| DOMAIN_TRIM.contains(&c) || c == '.');
    if domain.is_empty() {
        return String::new();
    }

    let subs: Vec<&str> = domain.split('.').collect();
    if subs.len() < 2 {
        return String::new();
    }

    let labels: Vec<String> = subs
        .into_iter()
        .map(|sub| {
            sub.trim_matches(|c| DOMAIN_TRIM.contains(&c) || c == '-')
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|label| !label.is_empty())
        .collect();
    if labels.len() < 2 {
        return String::new();
    }

    format!("{}@{}", local, labels.join("."))
}
