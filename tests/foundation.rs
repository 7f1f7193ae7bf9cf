use turn_engine::headers::{
    build_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_USER_AGENT,
};
use turn_engine::{normalize_turns_url, AgentApiClient, AgentApiConfig};

#[test]
fn smoke_client_constructs_from_config() {
    let config = AgentApiConfig::new("key")
        .with_base_url("https://agent.example.com/api")
        .with_user_agent("probe/0.1");

    let client = AgentApiClient::new(config).expect("client creation should succeed");
    assert_eq!(
        normalize_turns_url("https://agent.example.com/api"),
        client.normalized_endpoint()
    );
    assert_eq!("key", client.config().api_key);
    assert_eq!(Some("probe/0.1"), client.config().user_agent.as_deref());
}

#[test]
fn streaming_headers_negotiate_event_stream() {
    let config = AgentApiConfig::new("key").insert_header("X-Extra", "value");

    let headers = build_headers(&config, true).expect("header construction");
    assert_eq!(
        headers.get(HEADER_AUTHORIZATION).expect("authorization"),
        &"Bearer key".to_owned()
    );
    assert_eq!(
        headers.get(HEADER_ACCEPT).expect("accept"),
        &"text/event-stream".to_owned()
    );
    assert_eq!(
        headers.get(HEADER_CONTENT_TYPE).expect("content-type"),
        &"application/json".to_owned()
    );
    // extra header keys are lowercased on the way in
    assert_eq!(headers.get("x-extra").expect("custom"), &"value".to_owned());
    assert!(headers
        .get(HEADER_USER_AGENT)
        .expect("user-agent")
        .starts_with("turn-engine/"));
}
