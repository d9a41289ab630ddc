//! Shared utility functions used across the codebase.

/// Shorten `input` to at most `max_chars` characters for log output.
///
/// The total length is appended when the text is cut so log readers know
/// how much was dropped.
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

/// Normalize a variable reference as written by a model.
///
/// Models often echo the `$name` form used in step prompts, so a leading `$`
/// is stripped along with surrounding whitespace.
pub fn normalize_variable_name(raw: &str) -> String {
    raw.trim().trim_start_matches('$').trim().to_string()
}

/// Normalize and deduplicate a list of variable names, preserving order.
///
/// Empty names are dropped.
pub fn sanitize_name_list(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let normalized = normalize_variable_name(&name);
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.clone()) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_input_unchanged() {
        assert_eq!(truncate_for_log("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_for_log_long_input() {
        let out = truncate_for_log("abcdefghij", 4);
        assert!(out.starts_with("abcd..."));
        assert!(out.contains("total_chars=10"));
    }

    #[test]
    fn test_normalize_variable_name() {
        assert_eq!(normalize_variable_name("  $currentPope "), "currentPope");
        assert_eq!(normalize_variable_name("birthday"), "birthday");
        assert_eq!(normalize_variable_name("$"), "");
    }

    #[test]
    fn test_sanitize_name_list() {
        let names = vec![
            "location".to_string(),
            " $location".to_string(),
            "".to_string(),
            "weather".to_string(),
        ];
        assert_eq!(sanitize_name_list(names), vec!["location", "weather"]);
    }
}
