//! Small helpers used by the client's logging paths.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Uses character boundaries rather than byte indices, so multi-byte UTF-8
/// content (emoji, CJK, accented characters) never panics.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Sanitize a string for safe logging (redact credential-shaped patterns).
///
/// Applied to error bodies and upstream messages before they are logged;
/// the chat service's auth errors can echo tokens back.
pub fn sanitize_for_log(s: &str) -> String {
    let patterns: &[(&str, &str)] = &[
        (r"(?i)(bearer)\s+\S{10,}", "$1 ***REDACTED***"),
        (r"(?i)(password|passwd)[=:]\s*\S+", "$1=***REDACTED***"),
        (
            r#"(?i)("?(?:access_)?token"?)\s*[=:]\s*"?\S{10,}"?"#,
            "$1=***REDACTED***",
        ),
    ];

    let mut result = s.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(truncate_with_ellipsis("😀😀😀😀", 2), "😀😀...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test]
    fn test_sanitize_bearer_token() {
        let input = "rejected: Bearer eyJhbGciOiJIUzI1NiJ9.payload.sig";
        let output = sanitize_for_log(input);
        assert!(!output.contains("eyJhbGciOiJIUzI1NiJ9"));
        assert!(output.contains("REDACTED"));
    }

    #[test]
    fn test_sanitize_access_token_field() {
        let input = r#"{"access_token": "abcdef0123456789", "token_type": "bearer"}"#;
        let output = sanitize_for_log(input);
        assert!(!output.contains("abcdef0123456789"));
    }

    #[test]
    fn test_sanitize_leaves_plain_text_alone() {
        let input = "upstream returned 503 Service Unavailable";
        assert_eq!(sanitize_for_log(input), input);
    }
}
