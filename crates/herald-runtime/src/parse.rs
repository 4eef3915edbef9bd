//! Pulling structured pieces out of free-form model replies.

use herald_core::InstructContent;

/// Body of the first fenced code block, preferring one tagged `lang`.
///
/// A reply with no fence at all is taken to be bare code and returned trimmed.
pub fn extract_code_block(text: &str, lang: &str) -> String {
    let blocks = fenced_blocks(text);
    if let Some((_, body)) = blocks.iter().find(|(tag, _)| tag.eq_ignore_ascii_case(lang)) {
        return body.clone();
    }
    match blocks.into_iter().next() {
        Some((_, body)) => body,
        None => text.trim().to_string(),
    }
}

fn fenced_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(tag) = trimmed.strip_prefix("```") {
                    current = Some((tag.trim().to_string(), Vec::new()));
                }
            }
            Some((tag, mut body)) => {
                if trimmed.starts_with("```") {
                    blocks.push((tag, body.join("\n")));
                } else {
                    body.push(line);
                    current = Some((tag, body));
                }
            }
        }
    }
    // An unterminated fence still counts.
    if let Some((tag, body)) = current {
        blocks.push((tag, body.join("\n")));
    }
    blocks
}

/// Parse the outermost `{ ... }` of `text` as a JSON object.
pub fn extract_json_object(text: &str) -> Option<InstructContent> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_tagged_block() {
        let reply = "Here:\n```text\nnot this\n```\n```python\ndef parse(soup):\n    return 1\n```\n";
        assert_eq!(extract_code_block(reply, "python"), "def parse(soup):\n    return 1");
    }

    #[test]
    fn test_falls_back_to_first_block_then_raw() {
        assert_eq!(extract_code_block("```\nx = 1\n```", "python"), "x = 1");
        assert_eq!(extract_code_block("  x = 2  \n", "python"), "x = 2");
    }

    #[test]
    fn test_unterminated_fence() {
        assert_eq!(extract_code_block("```python\ny = 3\n", "python"), "y = 3");
    }

    #[test]
    fn test_extract_json_object() {
        let reply = "Sure!\n```json\n{\"a\": 1, \"b\": {\"c\": [2]}}\n```\nDone.";
        let obj = extract_json_object(reply).unwrap();
        assert_eq!(obj["a"], 1);
        assert_eq!(obj["b"]["c"][0], 2);
        assert!(extract_json_object("no braces").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }
}
