use httpmock::{Method::POST, MockServer};
use sage_ai::{ChatClient, ClientConfig, Error, Turn};
use tokio_stream::StreamExt;

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::builder()
        .endpoint(server.url("/models/chat/completions"))
        .api_version("2024-05-01-preview")
        .api_key("test-key")
        .model("DeepSeek-V3")
        .build()
        .unwrap()
}

fn record(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
    )
}

#[tokio::test]
async fn streams_formatted_deltas() {
    let server = MockServer::start_async().await;
    let body = [record("Hello "), record("**world**"), "data: [DONE]\n\n".to_string()].concat();

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/chat/completions")
                .query_param("api-version", "2024-05-01-preview")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model":"DeepSeek-V3","stream":true,"max_tokens":2048}"#);
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        })
        .await;

    let client = ChatClient::new(config_for(&server));
    let request = client.build_request(vec![Turn::user("hi")]);
    let mut deltas = client.stream(&request).await.unwrap();

    let mut output = String::new();
    while let Some(delta) = deltas.next().await {
        output.push_str(&delta.unwrap().markup);
    }

    mock.assert_async().await;
    assert_eq!(output, "Hello <strong>world</strong>");
}

#[tokio::test]
async fn sends_full_conversation() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/models/chat/completions").json_body_partial(
                r#"{"messages":[{"role":"system","content":"be brief"},{"role":"user","content":"hi"}]}"#,
            );
            then.status(200).body("data: [DONE]\n\n");
        })
        .await;

    let client = ChatClient::new(config_for(&server));
    let request = client.build_request(vec![Turn::system("be brief"), Turn::user("hi")]);
    let deltas: Vec<_> = client.stream(&request).await.unwrap().collect().await;

    mock.assert_async().await;
    assert!(deltas.is_empty());
}

#[tokio::test]
async fn non_success_status_is_http_error() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/models/chat/completions");
            then.status(500).body("upstream exploded");
        })
        .await;

    let client = ChatClient::new(config_for(&server));
    let request = client.build_request(vec![Turn::user("hi")]);
    let err = match client.open(&request).await {
        Ok(_) => panic!("expected an HTTP error"),
        Err(e) => e,
    };

    match err {
        Error::Http { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        ref other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn api_version_is_query_encoded() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/chat/completions")
                .query_param("api-version", "2024-05-01 preview&beta=1");
            then.status(200).body(record("ok"));
        })
        .await;

    let config = ClientConfig::builder()
        .endpoint(server.url("/models/chat/completions"))
        .api_version("2024-05-01 preview&beta=1")
        .api_key("test-key")
        .model("DeepSeek-V3")
        .build()
        .unwrap();
    let client = ChatClient::new(config);
    let request = client.build_request(vec![Turn::user("hi")]);
    let deltas: Vec<_> = client.stream(&request).await.unwrap().collect().await;

    mock.assert_async().await;
    assert_eq!(deltas.len(), 1);
}
