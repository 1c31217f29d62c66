use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use tracing::debug;

use super::json;
use super::{CallOrigin, Encoding, Match, ParsedToolCall, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};

// An unterminated block runs to the end of the text (truncated generations).
static DELIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<tool_call>(.*?)(?:</tool_call>|\z)").expect("valid regex"));

static FUNCTION_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<function=([^>\n]*)>").expect("valid regex"));

const FUNCTION_CLOSE: &str = "</function>";

static PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<parameter=([^>\n]*)>(.*?)</parameter>").expect("valid regex"));

/// Matcher for `<tool_call>...</tool_call>` blocks. A block body is decoded as JSON
/// first, then as the tag-pair form.
pub(super) fn find_delimited(text: &str) -> Vec<Match> {
    let mut matches = Vec::new();

    for caps in DELIMITED.captures_iter(text) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let calls = decode_block(body.as_str());
        if calls.is_empty() {
            debug!("Dropping tool_call block with no recoverable call");
            matches.push(Match {
                span: whole.range(),
                call: None,
            });
            continue;
        }

        // Several calls in one block share the block's span; cutting merges them.
        for call in calls {
            matches.push(Match {
                span: whole.range(),
                call: Some(call),
            });
        }
    }

    matches
}

/// Matcher for tag-pair calls whose outer `<tool_call>` delimiter went missing.
/// Stray outer delimiters are claimed too so they do not leak into the remaining text.
pub(super) fn find_truncated(text: &str) -> Vec<Match> {
    let mut matches: Vec<Match> = parse_functions(text, Encoding::TagPairTruncated)
        .into_iter()
        .map(|(span, call)| Match {
            span,
            call: Some(call),
        })
        .collect();

    for delimiter in [TOOL_CALL_OPEN, TOOL_CALL_CLOSE] {
        for (start, _) in text.match_indices(delimiter) {
            matches.push(Match {
                span: start..start + delimiter.len(),
                call: None,
            });
        }
    }

    matches.sort_by_key(|m| m.span.start);
    matches
}

fn decode_block(body: &str) -> Vec<ParsedToolCall> {
    let trimmed = strip_code_fence(body.trim());

    if trimmed.starts_with('{') {
        let calls = json::calls_from_block(trimmed);
        if !calls.is_empty() {
            return calls;
        }
    }

    parse_functions(trimmed, Encoding::TagPairComplete)
        .into_iter()
        .map(|(_, call)| call)
        .collect()
}

/// Find every `<function=NAME>` element, returning its byte span and the decoded call.
///
/// A body ends at `</function>`, or at the next `<function=` / end of text when the
/// closing tag is missing.
fn parse_functions(text: &str, encoding: Encoding) -> Vec<(Range<usize>, ParsedToolCall)> {
    let opens: Vec<(Range<usize>, &str)> = FUNCTION_OPEN
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(0)?.range(), caps.get(1)?.as_str())))
        .collect();

    let mut out = Vec::new();
    for (i, (open, name)) in opens.iter().enumerate() {
        let limit = opens.get(i + 1).map_or(text.len(), |(next, _)| next.start);
        let body_start = open.end;
        let (body_end, span_end) = match text[body_start..limit].find(FUNCTION_CLOSE) {
            Some(offset) => (
                body_start + offset,
                body_start + offset + FUNCTION_CLOSE.len(),
            ),
            None => (limit, limit),
        };

        let arguments = parse_parameters(&text[body_start..body_end]);
        match ParsedToolCall::new(*name, arguments, CallOrigin::Text(encoding)) {
            Some(call) => out.push((open.start..span_end, call)),
            None => debug!("Dropping function element without a name"),
        }
    }

    out
}

fn parse_parameters(body: &str) -> Map<String, Value> {
    let mut arguments = Map::new();

    for caps in PARAMETER.captures_iter(body) {
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let key = key.as_str().trim();
        if key.is_empty() {
            continue;
        }
        arguments.insert(
            key.to_string(),
            Value::String(strip_framing(value.as_str()).to_string()),
        );
    }

    arguments
}

/// Drop the single newline that frames a parameter value on each side; keep the rest.
fn strip_framing(value: &str) -> &str {
    let value = value
        .strip_prefix("\r\n")
        .or_else(|| value.strip_prefix('\n'))
        .unwrap_or(value);
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .unwrap_or(value)
}

/// Models sometimes wrap the block body in a markdown fence.
fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Skip the info string ("json", "xml", ...) on the opening fence line.
    match rest.find('\n') {
        Some(idx) if !rest[..idx].contains('{') && !rest[..idx].contains('<') => {
            rest[idx + 1..].trim()
        }
        _ => rest.trim(),
    }
}
