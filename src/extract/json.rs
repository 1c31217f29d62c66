use serde_json::{Deserializer, Map, Value};
use tracing::debug;

use super::{CallOrigin, Encoding, Match, ParsedToolCall};

/// Decode every JSON object in a delimited block body.
/// Stops at the first value that is not valid JSON.
pub(super) fn calls_from_block(body: &str) -> Vec<ParsedToolCall> {
    Deserializer::from_str(body)
        .into_iter::<Value>()
        .map_while(Result::ok)
        .filter_map(|value| call_from_value(&value, Encoding::Json, false))
        .collect()
}

/// Matcher for bare call objects in prose, e.g. inside a markdown fence.
/// Only objects that carry an `arguments` (or `parameters`) object are accepted, so
/// arbitrary JSON that happens to have a `name` field is not mistaken for a call.
pub(super) fn find_in_prose(text: &str) -> Vec<Match> {
    let mut matches = Vec::new();
    let mut resume_at = 0;

    for (start, ch) in text.char_indices() {
        if ch != '{' || start < resume_at {
            continue;
        }

        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Value>();
        let Some(Ok(value)) = stream.next() else {
            continue;
        };
        let end = start + stream.byte_offset();

        if let Some(call) = call_from_value(&value, Encoding::ProseJson, true) {
            matches.push(Match {
                span: start..end,
                call: Some(call),
            });
            resume_at = end;
        }
    }

    matches
}

/// Turn `{"name": ..., "arguments": {...}}` into a call.
///
/// Also accepts `parameters` in place of `arguments`, arguments given as a JSON-encoded
/// string, and the OpenAI `{"function": {...}}` envelope.
fn call_from_value(value: &Value, encoding: Encoding, require_arguments: bool) -> Option<ParsedToolCall> {
    let obj = value.as_object()?;

    if let Some(function) = obj.get("function").filter(|f| f.is_object()) {
        return call_from_value(function, encoding, require_arguments);
    }

    let name = obj.get("name").and_then(Value::as_str)?;
    let raw_args = obj.get("arguments").or_else(|| obj.get("parameters"));

    let arguments = match raw_args {
        Some(args) => decode_arguments(args)?,
        None if require_arguments => return None,
        None => Map::new(),
    };

    let call = ParsedToolCall::new(name, arguments, CallOrigin::Text(encoding));
    if call.is_none() {
        debug!("Dropping JSON tool call without a name");
    }
    call
}

fn decode_arguments(args: &Value) -> Option<Map<String, Value>> {
    match args {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Map::new()),
        Value::String(encoded) if encoded.trim().is_empty() => Some(Map::new()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}
