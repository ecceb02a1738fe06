//! Server-Sent Events transport.
//!
//! Downstream is a `text/event-stream` response whose `data:` lines each
//! carry one base64-encoded binary chunk. Upstream frames are sent as
//! individual `POST` requests to the same URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{TransportChannels, TransportTask, channel_pair, http_url};
use crate::errors::TransportError;

/// Open an SSE stream to `url` with bearer auth.
#[tracing::instrument(skip(client, token))]
pub async fn connect(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<TransportChannels, TransportError> {
    let target = http_url(url)?;
    let resp = client
        .get(target.clone())
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    debug!("event stream opened");

    let (channels, TransportTask { outbound, inbound }) = channel_pair();
    let stop = CancellationToken::new();

    let _sender = tokio::spawn(super::long_polling::post_frames(
        client.clone(),
        target.to_string(),
        token.to_string(),
        outbound,
        inbound.downgrade(),
        stop.clone(),
        false,
    ));

    let _reader = tokio::spawn(async move {
        let mut events = Box::pin(parse_sse_data(resp.bytes_stream()));
        loop {
            let item = tokio::select! {
                () = stop.cancelled() => break,
                event = events.next() => match event {
                    Some(Ok(data)) => STANDARD
                        .decode(data.as_bytes())
                        .map(Bytes::from)
                        .map_err(|e| TransportError::Malformed(format!("SSE payload: {e}"))),
                    Some(Err(e)) => Err(e),
                    None => break,
                },
            };
            let failed = item.is_err();
            if inbound.send(item).await.is_err() || failed {
                break;
            }
        }
        debug!("event stream finished");
    });

    Ok(channels)
}

/// Parse SSE lines from a byte stream and yield `data:` payloads.
///
/// Buffers incoming bytes, splits on newlines, and skips comments and empty
/// data. A read error ends the stream with that error.
pub fn parse_sse_data<S>(byte_stream: S) -> impl Stream<Item = Result<String, TransportError>> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue;
                    };
                    if let Some(data) = extract_sse_data(line) {
                        return Some((Ok(data), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read error");
                        return Some((Err(e.into()), (stream, buffer, true)));
                    }
                    None => {
                        let tail = std::str::from_utf8(&buffer).ok().and_then(extract_sse_data);
                        buffer.clear();
                        return tail.map(|data| (Ok(data), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Extract the payload of a `data:` line.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();
    if data.is_empty() {
        return None;
    }
    Some(data.to_string())
}
