use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;

use crate::extract::extract_tool_calls;

/// Render the calls recovered from `content` as pretty JSON.
pub fn render(content: &str) -> Result<String> {
    let (remaining, calls) = extract_tool_calls(content);
    let output = json!({
        "calls": calls,
        "remaining_text": remaining,
    });
    serde_json::to_string_pretty(&output).context("Failed to serialize extraction")
}

/// Extract tool calls from a file (or stdin for "-") and print them.
pub fn run(path: &str) -> Result<()> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        let file = Path::new(path);
        if !file.is_file() {
            bail!("File not found: {}", path);
        }
        fs::read_to_string(file)?
    };

    println!("{}", render(&content)?);
    Ok(())
}
