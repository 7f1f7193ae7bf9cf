/// Default base URL for the agent service (same-origin dev server).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";

/// Normalize a base URL to a turns endpoint.
///
/// Normalization rules:
/// 1) keep `/v1/turns` unchanged
/// 2) append `/turns` when path ends in `/v1`
/// 3) append `/v1/turns` otherwise
pub fn normalize_turns_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/v1/turns") {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/v1") {
        return format!("{trimmed}/turns");
    }
    format!("{trimmed}/v1/turns")
}

#[cfg(test)]
mod tests {
    use super::normalize_turns_url;

    #[test]
    fn normalize_applies_suffix_rules() {
        assert_eq!(
            normalize_turns_url("https://agent.example.com/v1/turns"),
            "https://agent.example.com/v1/turns"
        );
        assert_eq!(
            normalize_turns_url("https://agent.example.com/v1/"),
            "https://agent.example.com/v1/turns"
        );
        assert_eq!(
            normalize_turns_url("https://agent.example.com"),
            "https://agent.example.com/v1/turns"
        );
    }

    #[test]
    fn normalize_defaults_blank_input() {
        assert_eq!(
            normalize_turns_url("  "),
            format!("{}/v1/turns", super::DEFAULT_BASE_URL)
        );
    }
}
