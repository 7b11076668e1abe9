// Output formatting — terminal display for tokens, hits and ingest reports.

pub mod terminal;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Unlike byte slicing (`&text[..120]`), this respects UTF-8 character boundaries
/// and will never panic on multi-byte characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Render token texts the way a list literal reads: `["the", "quick"]`.
pub fn token_list<S: AsRef<str>>(tokens: &[S]) -> String {
    let quoted: Vec<String> = tokens
        .iter()
        .map(|t| format!("{:?}", t.as_ref()))
        .collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("Wherefore", 5), "Where...");
        assert_eq!(truncate_chars("café", 4), "café");
        assert_eq!(truncate_chars("ééé", 1), "é...");
    }

    #[test]
    fn test_token_list() {
        assert_eq!(token_list(&["the", "quick"]), r#"["the", "quick"]"#);
        assert_eq!(token_list::<&str>(&[]), "[]");
    }
}
