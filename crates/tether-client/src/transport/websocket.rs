//! WebSocket transport over `tokio-tungstenite`.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::{TransportChannels, TransportTask, channel_pair, ws_url};
use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket to `url` (`http(s)` is mapped to `ws(s)`) with bearer auth.
#[tracing::instrument(skip(token))]
pub async fn connect(url: &str, token: &str) -> Result<TransportChannels, TransportError> {
    let target = ws_url(url)?;
    let mut request = target.as_str().into_client_request()?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| TransportError::Malformed("bearer token is not a valid header".into()))?;
    let _ = request.headers_mut().insert(AUTHORIZATION, bearer);

    let (ws, response) = connect_async(request).await?;
    debug!(status = %response.status(), "websocket connected");

    let (channels, task) = channel_pair();
    let _handle = tokio::spawn(pump(ws, task));
    Ok(channels)
}

async fn pump(ws: WsStream, mut task: TransportTask) {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            out = task.outbound.recv() => {
                let Some(frame) = out else {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    let _ = task.inbound.send(Err(e.into())).await;
                    break;
                }
            }
            msg = stream.next() => {
                let item = match msg {
                    Some(Ok(Message::Binary(data))) => Ok(data),
                    Some(Ok(Message::Text(text))) => Ok(Bytes::copy_from_slice(text.as_bytes())),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "websocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => Err(TransportError::from(e)),
                    None => break,
                };
                let failed = item.is_err();
                if task.inbound.send(item).await.is_err() || failed {
                    break;
                }
            }
        }
    }
}
