//! Extraction behavior across the supported tool-call encodings

use proptest::prelude::*;
use serde_json::json;

use tooleval::extract::{call_names, extract_tool_calls, CallOrigin, Encoding};

const WRAPPED_TAG_PAIR: &str = "<tool_call>
<function=write_file>
<parameter=path>
src/main.rs
</parameter>
<parameter=content>
fn main() {
    println!(\"hi\");
}
</parameter>
</function>
</tool_call>";

#[test]
fn test_json_record_round_trip() {
    let text = r#"<tool_call>{"name":"read_file","arguments":{"path":"a.py"}}</tool_call>"#;
    let (remaining, calls) = extract_tool_calls(text);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name(), "read_file");
    assert_eq!(
        serde_json::Value::Object(calls[0].arguments().clone()),
        json!({"path": "a.py"})
    );
    assert_eq!(remaining, "");
}

#[test]
fn test_tag_pair_preserves_multiline_values() {
    let (_, calls) = extract_tool_calls(WRAPPED_TAG_PAIR);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name(), "write_file");
    assert_eq!(calls[0].origin(), CallOrigin::Text(Encoding::TagPairComplete));
    assert_eq!(calls[0].argument_str("path"), Some("src/main.rs"));
    assert_eq!(
        calls[0].argument_str("content"),
        Some("fn main() {\n    println!(\"hi\");\n}")
    );
}

#[test]
fn test_missing_opening_delimiter_recovers_same_call() {
    let truncated = WRAPPED_TAG_PAIR.trim_start_matches("<tool_call>");
    let (_, wrapped_calls) = extract_tool_calls(WRAPPED_TAG_PAIR);
    let (remaining, truncated_calls) = extract_tool_calls(truncated);

    assert_eq!(truncated_calls.len(), 1);
    assert_eq!(truncated_calls[0].name(), wrapped_calls[0].name());
    assert_eq!(truncated_calls[0].arguments(), wrapped_calls[0].arguments());
    assert_eq!(
        truncated_calls[0].origin(),
        CallOrigin::Text(Encoding::TagPairTruncated)
    );
    assert_eq!(remaining, "", "stray closing delimiter should be removed");
}

#[test]
fn test_wrapped_then_unopened_tag_pair_calls() {
    let text = "Reading first.
<tool_call>
<function=read_file>
<parameter=path>
a.py
</parameter>
</function>
</tool_call>
<function=write_file>
<parameter=path>
b.py
</parameter>
<parameter=content>
print(1)
</parameter>
</function>
</tool_call>";
    let (remaining, calls) = extract_tool_calls(text);
    assert_eq!(call_names(&calls), vec!["read_file", "write_file"]);
    assert_eq!(calls[0].argument_str("path"), Some("a.py"));
    assert_eq!(calls[1].argument_str("path"), Some("b.py"));
    assert_eq!(calls[1].argument_str("content"), Some("print(1)"));
    assert_eq!(remaining, "Reading first.");
}

#[test]
fn test_multiple_calls_in_order() {
    let text = r#"First I'll look around.
<tool_call>{"name":"list_dir","arguments":{"path":"."}}</tool_call>
Then read the manifest.
<tool_call>{"name":"read_file","arguments":{"path":"Cargo.toml"}}</tool_call>"#;
    let (remaining, calls) = extract_tool_calls(text);
    assert_eq!(call_names(&calls), vec!["list_dir", "read_file"]);
    assert_eq!(
        remaining,
        "First I'll look around.\n\nThen read the manifest."
    );
}

#[test]
fn test_nested_braces_and_quotes_in_values() {
    let text = r#"<tool_call>{"name":"write_file","arguments":{"path":"lib.rs","content":"fn f() { let s = \"}{\"; }"}}</tool_call>"#;
    let (_, calls) = extract_tool_calls(text);
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].argument_str("content"),
        Some(r#"fn f() { let s = "}{"; }"#)
    );
}

#[test]
fn test_nameless_record_dropped() {
    let text = r#"<tool_call>{"arguments":{"path":"a.py"}}</tool_call>
<tool_call>{"name":"read_file","arguments":{"path":"b.py"}}</tool_call>"#;
    let (remaining, calls) = extract_tool_calls(text);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].argument_str("path"), Some("b.py"));
    assert_eq!(remaining, "");
}

#[test]
fn test_partial_json_is_no_call() {
    let text = r#"<tool_call>{"name": "read_file", "arguments": {"path": </tool_call>"#;
    let (remaining, calls) = extract_tool_calls(text);
    assert!(calls.is_empty());
    assert_eq!(remaining, text);
}

#[test]
fn test_prose_answer_is_no_call() {
    let text = "Ownership moves the value; borrowing lends a reference to it.";
    assert_eq!(extract_tool_calls(text), (text.to_string(), Vec::new()));
}

#[test]
fn test_prose_json_object_with_arguments() {
    let text = "Here is the call:\n```json\n{\"name\": \"run_command\", \"arguments\": {\"command\": \"cargo test\"}}\n```";
    let (_, calls) = extract_tool_calls(text);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].origin(), CallOrigin::Text(Encoding::ProseJson));
    assert_eq!(calls[0].argument_str("command"), Some("cargo test"));
}

#[test]
fn test_delimited_json_wins_over_prose_json() {
    let text = r#"Example: {"name": "grep", "arguments": {"pattern": "x"}}
<tool_call>{"name":"read_file","arguments":{"path":"a.py"}}</tool_call>"#;
    let (remaining, calls) = extract_tool_calls(text);
    assert_eq!(call_names(&calls), vec!["read_file"]);
    assert!(remaining.starts_with("Example:"));
}

fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("<tool_call>".to_string()),
        Just("</tool_call>".to_string()),
        Just("<function=read_file>".to_string()),
        Just("<function=>".to_string()),
        Just("</function>".to_string()),
        Just("<parameter=path>".to_string()),
        Just("</parameter>".to_string()),
        Just("{\"name\":".to_string()),
        Just("\"arguments\":".to_string()),
        Just("\"x\"".to_string()),
        Just("{".to_string()),
        Just("}".to_string()),
        Just(",".to_string()),
        "[a-zé \n]{0,8}",
    ]
}

proptest! {
    #[test]
    fn prop_never_panics_and_names_nonempty(parts in prop::collection::vec(fragment(), 0..24)) {
        let text = parts.concat();
        let (remaining, calls) = extract_tool_calls(&text);
        for call in &calls {
            prop_assert!(!call.name().is_empty());
            prop_assert_eq!(call.name(), call.name().trim());
        }
        if calls.is_empty() {
            prop_assert_eq!(remaining, text);
        } else {
            prop_assert!(remaining.len() <= text.len());
        }
    }

    #[test]
    fn prop_arbitrary_text_never_panics(text in "\\PC{0,200}") {
        let (remaining, calls) = extract_tool_calls(&text);
        if calls.is_empty() {
            prop_assert_eq!(remaining, text);
        }
    }

    #[test]
    fn prop_wrapped_json_recovers_call(
        name in "[a-z_]{1,12}",
        path in "[a-zA-Z0-9_./ {}\"-]{0,20}",
    ) {
        let record = json!({"name": name, "arguments": {"path": path}});
        let text = format!("<tool_call>{}</tool_call>", record);
        let (_, calls) = extract_tool_calls(&text);
        prop_assert_eq!(calls.len(), 1);
        prop_assert_eq!(calls[0].name(), name.as_str());
        prop_assert_eq!(calls[0].argument_str("path"), Some(path.as_str()));
    }
}
