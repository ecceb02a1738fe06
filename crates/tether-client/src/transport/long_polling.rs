//! Long-polling transport.
//!
//! Downstream is a loop of `GET` requests: `200` carries a chunk of frames,
//! `204` means the server closed the connection, and a request that times
//! out is simply reissued. Upstream frames are `POST`ed to the same URL, and
//! closing the connection sends a `DELETE`.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{InboundFrame, TransportChannels, TransportTask, channel_pair, http_url};
use crate::errors::TransportError;

/// Per-request timeout for a poll before it is reissued.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(100);

/// Start polling `url` with bearer auth.
#[tracing::instrument(skip(client, token))]
pub async fn connect(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    poll_timeout: Duration,
) -> Result<TransportChannels, TransportError> {
    let target = http_url(url)?.to_string();
    let (channels, TransportTask { outbound, inbound }) = channel_pair();
    let stop = CancellationToken::new();

    let _sender = tokio::spawn(post_frames(
        client.clone(),
        target.clone(),
        token.to_string(),
        outbound,
        inbound.downgrade(),
        stop.clone(),
        true,
    ));
    let _poller = tokio::spawn(poll(
        client.clone(),
        target,
        token.to_string(),
        poll_timeout,
        inbound,
        stop,
    ));

    Ok(channels)
}

async fn poll(
    client: reqwest::Client,
    url: String,
    token: String,
    poll_timeout: Duration,
    inbound: mpsc::Sender<InboundFrame>,
    stop: CancellationToken,
) {
    loop {
        let request = client.get(&url).bearer_auth(&token).timeout(poll_timeout).send();
        let result = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            result = async {
                let resp = request.await?;
                let status = resp.status();
                if status == StatusCode::NO_CONTENT {
                    return Ok(None);
                }
                if !status.is_success() {
                    return Err(TransportError::Status(status.as_u16()));
                }
                Ok::<_, TransportError>(Some(resp.bytes().await?))
            } => result,
        };

        match result {
            Ok(None) => {
                debug!("server closed long-polling connection");
                break;
            }
            Ok(Some(chunk)) if chunk.is_empty() => {}
            Ok(Some(chunk)) => {
                if inbound.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
            Err(TransportError::Http(e)) if e.is_timeout() => {}
            Err(e) => {
                warn!(error = %e, "poll failed");
                let _ = inbound.send(Err(e)).await;
                break;
            }
        }
    }
}

/// `POST` each outbound frame to `url` until the sender is dropped.
///
/// A failed send is reported on `inbound` if the receiving side is still
/// alive. When the outbound side closes, `stop` is cancelled and, with
/// `delete_on_close`, the connection is torn down with a `DELETE`.
pub(super) async fn post_frames(
    client: reqwest::Client,
    url: String,
    token: String,
    mut outbound: mpsc::Receiver<Bytes>,
    inbound: mpsc::WeakSender<InboundFrame>,
    stop: CancellationToken,
    delete_on_close: bool,
) {
    while let Some(frame) = outbound.recv().await {
        let sent = client.post(&url).bearer_auth(&token).body(frame).send().await;
        let failure = match sent {
            Ok(resp) if resp.status().is_success() => None,
            Ok(resp) => Some(TransportError::Status(resp.status().as_u16())),
            Err(e) => Some(TransportError::Http(e)),
        };
        if let Some(err) = failure {
            warn!(error = %err, "send failed");
            if let Some(tx) = inbound.upgrade() {
                let _ = tx.send(Err(err)).await;
            }
            stop.cancel();
            return;
        }
    }

    stop.cancel();
    if delete_on_close {
        if let Err(e) = client.delete(&url).bearer_auth(&token).send().await {
            debug!(error = %e, "close request failed");
        }
    }
}
