//! Best-effort recovery of a JSON object from free-form model output.
//!
//! Models wrap JSON in prose or code fences and often stop mid-object when
//! they hit the token limit. [`parse_lenient`] finds the first object and
//! tries an ordered list of repairs, each building on the previous one, until
//! something parses.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("JSON still invalid after {attempts} repair attempts: {last_error}")]
    Invalid { attempts: usize, last_error: String },
}

/// Repairs in the order they are tried. Later repairs include earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    AsIs,
    StripTrailingCommas,
    CloseOpenStructures,
    DropTruncatedEntry,
}

pub const REPAIRS: [Repair; 4] = [
    Repair::AsIs,
    Repair::StripTrailingCommas,
    Repair::CloseOpenStructures,
    Repair::DropTruncatedEntry,
];

pub fn parse_lenient(text: &str) -> Result<Value, ParseError> {
    parse_with_repair(text).map(|(value, _)| value)
}

/// Like [`parse_lenient`], also reporting which repair made it parse.
pub fn parse_with_repair(text: &str) -> Result<(Value, Repair), ParseError> {
    let candidate = extract_object(text).ok_or(ParseError::NoJsonObject)?;

    let mut last_error = String::new();
    for repair in REPAIRS {
        let fixed = apply(candidate, repair);
        match serde_json::from_str::<Value>(&fixed) {
            Ok(value) if value.is_object() => return Ok((value, repair)),
            Ok(_) => last_error = "top-level value is not an object".into(),
            Err(err) => last_error = err.to_string(),
        }
    }

    Err(ParseError::Invalid {
        attempts: REPAIRS.len(),
        last_error,
    })
}

fn apply(candidate: &str, repair: Repair) -> String {
    match repair {
        Repair::AsIs => candidate.to_string(),
        Repair::StripTrailingCommas => strip_trailing_commas(candidate),
        Repair::CloseOpenStructures => close_open_structures(&strip_trailing_commas(candidate)),
        Repair::DropTruncatedEntry => {
            close_open_structures(&strip_trailing_commas(drop_truncated_entry(candidate)))
        }
    }
}

/// The first `{ ... }` span, string-aware. When the text ends before the
/// object closes, everything from the opening brace on is returned.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let body = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&body[..=i]);
                }
            }
            _ => {}
        }
    }
    Some(body)
}

/// Remove commas that directly precede `}` / `]` or the end of input.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, None | Some(&'}') | Some(&']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Terminate an unterminated string and append the missing closers.
pub fn close_open_structures(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    } else {
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if out.ends_with(',') {
            out.pop();
        } else if out.ends_with(':') {
            out.push_str("null");
        }
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// Cut back to the last separator outside a string, discarding a
/// half-written trailing entry.
pub fn drop_truncated_entry(text: &str) -> &str {
    let mut cut = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' => cut = Some(i),
            _ => {}
        }
    }

    match cut {
        Some(i) => &text[..i],
        None => text,
    }
}
