use std::collections::BTreeMap;

use crate::config::AgentApiConfig;
use crate::error::TurnError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_USER_AGENT: &str = "user-agent";
/// Response header carrying the conversation identity (highest-priority
/// identity source within a turn).
pub const HEADER_CONVERSATION_ID: &str = "x-conversation-id";

/// Build a deterministic header map for agent transport requests.
pub fn build_headers(
    config: &AgentApiConfig,
    streaming: bool,
) -> Result<BTreeMap<String, String>, TurnError> {
    if config.api_key.trim().is_empty() {
        return Err(TurnError::MissingApiKey);
    }

    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", config.api_key.trim()),
    );
    headers.insert(
        HEADER_ACCEPT.to_owned(),
        if streaming {
            "text/event-stream".to_owned()
        } else {
            "application/json".to_owned()
        },
    );
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn default_user_agent() -> String {
    format!("turn-engine/{}", env!("CARGO_PKG_VERSION"))
}
