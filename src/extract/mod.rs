//! Tool-call extraction from raw model output
//!
//! Model output drifts between several textual encodings of a tool call, and none of them
//! is guaranteed to be well formed. Each encoding has its own matcher; matchers run in
//! priority order and the first one that recovers at least one call wins:
//!
//! 1. `<tool_call>{"name": ..., "arguments": {...}}</tool_call>` ([`Encoding::Json`])
//! 2. `<tool_call><function=NAME><parameter=KEY>VALUE</parameter></function></tool_call>`
//!    ([`Encoding::TagPairComplete`])
//! 3. the tag-pair form with its outer `<tool_call>` delimiter missing
//!    ([`Encoding::TagPairTruncated`])
//! 4. a bare `{"name": ..., "arguments": {...}}` object inside prose ([`Encoding::ProseJson`])
//!
//! When delimited blocks win, calls that lost their opening `<tool_call>` elsewhere in the
//! same text are still recovered from the regions between the blocks.
//!
//! If nothing matches, the text is returned unchanged with no calls. Extraction never
//! fails and never emits a call without a name.

mod json;
mod tags;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Range;

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// Textual encoding a call was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Json,
    TagPairComplete,
    TagPairTruncated,
    ProseJson,
}

/// Where a call came from: the client's structured response parts, or text recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "encoding")]
pub enum CallOrigin {
    Structured,
    Text(Encoding),
}

impl fmt::Display for CallOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOrigin::Structured => write!(f, "structured"),
            CallOrigin::Text(encoding) => write!(f, "text:{:?}", encoding),
        }
    }
}

/// A normalized tool invocation. The name is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawToolCall")]
pub struct ParsedToolCall {
    name: String,
    arguments: Map<String, Value>,
    origin: CallOrigin,
}

#[derive(Deserialize)]
struct RawToolCall {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
    origin: CallOrigin,
}

impl TryFrom<RawToolCall> for ParsedToolCall {
    type Error = String;

    fn try_from(raw: RawToolCall) -> Result<Self, Self::Error> {
        ParsedToolCall::new(raw.name, raw.arguments, raw.origin)
            .ok_or_else(|| "tool call name must not be empty".to_string())
    }
}

impl ParsedToolCall {
    /// Build a call, or `None` if the name is blank.
    pub fn new(
        name: impl Into<String>,
        arguments: Map<String, Value>,
        origin: CallOrigin,
    ) -> Option<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            arguments,
            origin,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn origin(&self) -> CallOrigin {
        self.origin
    }

    /// String value of one argument, if present and a string.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// One region of the input claimed by a matcher. `call` is `None` for regions that are
/// tool-call markup but yielded nothing usable (stray delimiters, nameless records).
#[derive(Debug)]
struct Match {
    span: Range<usize>,
    call: Option<ParsedToolCall>,
}

type Matcher = fn(&str) -> Vec<Match>;

/// One encoding's matcher, plus an optional matcher that fills the gaps it left: regions
/// outside its own spans where a weaker encoding of a further call may still sit.
struct Rule {
    matcher: Matcher,
    gaps: Option<Matcher>,
}

/// Priority order. A new encoding gets a new entry here, never a patch to an existing one.
const RULES: &[Rule] = &[
    Rule {
        matcher: tags::find_delimited,
        gaps: Some(tags::find_truncated),
    },
    Rule {
        matcher: tags::find_truncated,
        gaps: None,
    },
    Rule {
        matcher: json::find_in_prose,
        gaps: None,
    },
];

/// Extract tool calls from `text`, returning the text left once the calls are cut out
/// together with the calls in left-to-right order.
pub fn extract_tool_calls(text: &str) -> (String, Vec<ParsedToolCall>) {
    for rule in RULES {
        let mut matches = (rule.matcher)(text);
        if !matches.iter().any(|m| m.call.is_some()) {
            continue;
        }

        if let Some(gaps) = rule.gaps {
            let extra: Vec<Match> = gaps(text)
                .into_iter()
                .filter(|m| !matches.iter().any(|claimed| overlaps(&claimed.span, &m.span)))
                .collect();
            matches.extend(extra);
            // Stable, so calls sharing one block keep their order.
            matches.sort_by_key(|m| m.span.start);
        }

        let remaining = cut_spans(text, matches.iter().map(|m| m.span.clone()));
        let calls = matches.into_iter().filter_map(|m| m.call).collect();
        return (remaining, calls);
    }

    (text.to_string(), Vec::new())
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Names of the calls, in order.
pub fn call_names(calls: &[ParsedToolCall]) -> Vec<&str> {
    calls.iter().map(|c| c.name()).collect()
}

/// Remove possibly overlapping byte ranges from `text` and tidy the result.
fn cut_spans(text: &str, spans: impl Iterator<Item = Range<usize>>) -> String {
    let mut spans: Vec<Range<usize>> = spans.filter(|s| s.start < s.end).collect();
    spans.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            out.push_str(&text[cursor..span.start]);
        }
        cursor = cursor.max(span.end);
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_json_call() {
        let text = r#"<tool_call>{"name":"read_file","arguments":{"path":"a.py"}}</tool_call>"#;
        let (remaining, calls) = extract_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name(), "read_file");
        assert_eq!(calls[0].arguments().get("path"), Some(&json!("a.py")));
        assert_eq!(calls[0].origin(), CallOrigin::Text(Encoding::Json));
        assert_eq!(remaining, "");
    }

    #[test]
    fn test_prose_only_is_untouched() {
        let text = "I would read the file first, then summarize it.\n";
        let (remaining, calls) = extract_tool_calls(text);
        assert!(calls.is_empty());
        assert_eq!(remaining, text);
    }

    #[test]
    fn test_empty_input() {
        let (remaining, calls) = extract_tool_calls("");
        assert!(calls.is_empty());
        assert_eq!(remaining, "");
    }

    #[test]
    fn test_remaining_text_keeps_surrounding_prose() {
        let text = "Let me look.\n<tool_call>{\"name\":\"list_dir\",\"arguments\":{}}</tool_call>\nDone.";
        let (remaining, calls) = extract_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert!(remaining.starts_with("Let me look."));
        assert!(remaining.ends_with("Done."));
        assert!(!remaining.contains("tool_call"));
    }

    #[test]
    fn test_new_rejects_blank_name() {
        assert!(ParsedToolCall::new("  ", Map::new(), CallOrigin::Structured).is_none());
        let call = ParsedToolCall::new(" grep ", Map::new(), CallOrigin::Structured).unwrap();
        assert_eq!(call.name(), "grep");
    }

    #[test]
    fn test_deserialize_rejects_blank_name() {
        let bad = r#"{"name":"","arguments":{},"origin":{"kind":"structured"}}"#;
        assert!(serde_json::from_str::<ParsedToolCall>(bad).is_err());

        let good = r#"{"name":"grep","arguments":{"q":"x"},"origin":{"kind":"text","encoding":"prose_json"}}"#;
        let call: ParsedToolCall = serde_json::from_str(good).unwrap();
        assert_eq!(call.origin(), CallOrigin::Text(Encoding::ProseJson));
        assert_eq!(call.argument_str("q"), Some("x"));
    }

    #[test]
    fn test_unopened_call_after_wrapped_call_is_kept() {
        let text = "<tool_call>\n<function=read_file>\n<parameter=path>a.py</parameter>\n</function>\n</tool_call>\n\
                    <function=write_file>\n<parameter=path>b.py</parameter>\n</function>\n</tool_call>";
        let (remaining, calls) = extract_tool_calls(text);
        assert_eq!(call_names(&calls), vec!["read_file", "write_file"]);
        assert_eq!(calls[0].origin(), CallOrigin::Text(Encoding::TagPairComplete));
        assert_eq!(calls[1].origin(), CallOrigin::Text(Encoding::TagPairTruncated));
        assert_eq!(calls[1].argument_str("path"), Some("b.py"));
        assert_eq!(remaining, "");
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps(&(0..5), &(4..8)));
        assert!(!overlaps(&(0..4), &(4..8)));
        assert!(overlaps(&(2..3), &(0..10)));
    }

    #[test]
    fn test_cut_spans_merges_overlaps() {
        let text = "abcdefghij";
        let out = cut_spans(text, vec![2..5, 4..7, 9..10].into_iter());
        assert_eq!(out, "abhi");
    }
}
