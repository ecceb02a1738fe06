//! End-to-end hub connection over negotiated long polling.

use std::sync::Arc;
use std::time::Duration;

use tether_auth::StaticTokenProvider;
use tether_client::{HttpTransportConnector, HubConnection, HubOptions, HubState, MessagePackCodec};
use tether_core::{ForeverRetryPolicy, TransportKind, TransportSet};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn requests_with(server: &MockServer, verb: &str) -> Vec<Vec<u8>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == verb && r.url.path() == "/hub")
        .map(|r| r.body)
        .collect()
}

async fn wait_for_request(server: &MockServer, verb: &str, body: &[u8]) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !requests_with(server, verb).await.iter().any(|b| b == body) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("request not observed in time");
}

#[tokio::test]
async fn negotiated_long_polling_session() {
    let server = MockServer::start().await;
    let codec = MessagePackCodec::new(false);

    Mock::given(method("POST"))
        .and(path("/hub/negotiate"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "connectionId": "c1",
            "connectionToken": "t1",
            "negotiateVersion": 1,
            "availableTransports": [
                {"transport": "WebSockets", "transferFormats": ["Text", "Binary"]},
                {"transport": "LongPolling", "transferFormats": ["Text", "Binary"]}
            ]
        })))
        .mount(&server)
        .await;

    let mut first_poll = b"{}\x1e".to_vec();
    first_poll.extend_from_slice(&codec.encode("welcome").unwrap());
    Mock::given(method("GET"))
        .and(path("/hub"))
        .and(query_param("id", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(first_poll))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hub"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hub"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/hub"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let mut options = HubOptions::new(format!("{}/hub", server.uri()));
    options.transports = TransportSet::only(TransportKind::LongPolling);
    let hub = HubConnection::new(
        options,
        Arc::new(StaticTokenProvider::new("secret")),
        Arc::new(HttpTransportConnector::new(reqwest::Client::new())),
        Arc::new(ForeverRetryPolicy::default()),
    );

    let mut messages = hub.messages();
    hub.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(hub.connection_id().as_deref(), Some("c1"));
    assert_eq!(messages.recv().await.unwrap(), rmpv::Value::from("welcome"));

    hub.send(&"hi").await.unwrap();
    let expected = codec.encode("hi").unwrap();
    wait_for_request(&server, "POST", &expected).await;

    hub.stop().await;
    assert_eq!(hub.state(), HubState::Disconnected);
    wait_for_request(&server, "DELETE", b"").await;
}
