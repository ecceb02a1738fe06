//! End-to-end hub connection over a real local WebSocket server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tether_auth::StaticTokenProvider;
use tether_client::{HttpTransportConnector, HubConnection, HubOptions, HubState};
use tether_core::{ForeverRetryPolicy, TransportKind, TransportSet};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct ServerLog {
    connections: AtomicUsize,
    authorization: Mutex<Vec<String>>,
}

/// Accepts connections forever. Each one answers the handshake and echoes
/// binary frames; the first connection closes itself after one echo.
async fn spawn_server() -> (String, Arc<ServerLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(ServerLog::default());
    let server_log = Arc::clone(&log);
    let _server = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let index = server_log.connections.fetch_add(1, Ordering::SeqCst);
            let _conn = tokio::spawn(serve(stream, Arc::clone(&server_log), index == 0));
        }
    });
    (format!("http://{addr}/hub"), log)
}

async fn serve(stream: TcpStream, log: Arc<ServerLog>, close_after_echo: bool) {
    let capture = Arc::clone(&log);
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let auth = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        capture.authorization.lock().push(auth);
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();

    let Some(Ok(handshake)) = ws.next().await else {
        return;
    };
    let request = handshake.into_data();
    assert_eq!(request.last(), Some(&0x1e));
    assert!(String::from_utf8_lossy(&request).contains("messagepack"));
    ws.send(Message::Binary(Bytes::from_static(b"{}\x1e"))).await.unwrap();

    while let Some(Ok(msg)) = ws.next().await {
        if msg.is_binary() {
            ws.send(msg).await.unwrap();
            if close_after_echo {
                let _ = ws.close(None).await;
                break;
            }
        } else if msg.is_close() {
            break;
        }
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn websocket_session_survives_server_close() {
    let (url, log) = spawn_server().await;
    let mut options = HubOptions::new(url);
    options.transports = TransportSet::only(TransportKind::WebSockets);
    options.skip_negotiation = true;
    options.compress = true;

    let hub = HubConnection::new(
        options,
        Arc::new(StaticTokenProvider::new("secret")),
        Arc::new(HttpTransportConnector::new(reqwest::Client::new())),
        Arc::new(ForeverRetryPolicy::new(10, 50)),
    );
    let reconnecting = Arc::new(AtomicUsize::new(0));
    let reconnected = Arc::new(AtomicUsize::new(0));
    let _on_reconnecting = {
        let counter = Arc::clone(&reconnecting);
        hub.on_reconnecting(move |_| {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _on_reconnected = {
        let counter = Arc::clone(&reconnected);
        hub.on_reconnected(move |_| {
            let _ = counter.fetch_add(1, Ordering::SeqCst);
        })
    };

    let mut messages = hub.messages();
    hub.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(hub.state(), HubState::Connected);

    hub.send(&("hello", 42)).await.unwrap();
    let echoed = messages.recv().await.unwrap();
    assert_eq!(
        echoed,
        rmpv::Value::Array(vec![rmpv::Value::from("hello"), rmpv::Value::from(42)])
    );

    // The first connection closes after its echo; the supervisor reconnects.
    wait_until(|| reconnected.load(Ordering::SeqCst) == 1).await;
    assert_eq!(reconnecting.load(Ordering::SeqCst), 1);
    assert_eq!(hub.state(), HubState::Connected);
    assert_eq!(log.connections.load(Ordering::SeqCst), 2);

    hub.send(&"again").await.unwrap();
    assert_eq!(messages.recv().await.unwrap(), rmpv::Value::from("again"));

    hub.stop().await;
    assert_eq!(hub.state(), HubState::Disconnected);
    assert_eq!(
        *log.authorization.lock(),
        vec!["Bearer secret".to_string(), "Bearer secret".to_string()]
    );
}
