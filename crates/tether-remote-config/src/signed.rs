//! Signed envelope transport for remote configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{RemoteConfigError, Result};
use crate::verify::verify;

/// A remote configuration document signed by the configuration service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// JSON text of a [`RemoteConfigDocument`](crate::RemoteConfigDocument).
    pub payload: String,
    /// Signing time in Unix seconds; part of the signed bytes.
    pub timestamp: u64,
    /// Base64 Ed25519 signature over `timestamp ‖ payload`.
    pub signature: String,
}

impl SignedEnvelope {
    /// Whether the envelope verifies against `public_key_b64`.
    pub fn verify(&self, public_key_b64: &str) -> bool {
        verify(
            self.payload.as_bytes(),
            self.timestamp,
            &self.signature,
            public_key_b64,
        )
    }
}

/// Result of applying a signed envelope to the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Verified, parsed and saved.
    Applied,
    /// Signature did not verify; nothing changed.
    Untrusted,
    /// Signature verified but the payload is not a document; nothing changed.
    Malformed,
}

/// Fetch a signed envelope from `url`.
#[tracing::instrument(skip(client))]
pub async fn fetch_signed(client: &reqwest::Client, url: &str) -> Result<SignedEnvelope> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(RemoteConfigError::Status(status.as_u16()));
    }
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_signed_parses_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/signed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payload": "{}",
                "timestamp": 5,
                "signature": "c2ln",
            })))
            .mount(&server)
            .await;

        let envelope = fetch_signed(&reqwest::Client::new(), &format!("{}/signed", server.uri()))
            .await
            .unwrap();
        assert_eq!(envelope.timestamp, 5);
        assert_eq!(envelope.payload, "{}");
    }

    #[tokio::test]
    async fn fetch_signed_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetch_signed(&reqwest::Client::new(), &format!("{}/signed", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteConfigError::Status(503)));
    }

    #[test]
    fn garbage_signature_does_not_verify() {
        let envelope = SignedEnvelope {
            payload: "{}".into(),
            timestamp: 1,
            signature: "AAAA".into(),
        };
        assert!(!envelope.verify("AAAA"));
    }
}
