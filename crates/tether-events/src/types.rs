//! Lifecycle event types.

use serde::{Deserialize, Serialize};

/// Domain event republished from the live connection's signals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The connection closed for good.
    Closed {
        /// Close reason, absent on a clean close.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The transport dropped and the reconnect policy took over.
    Reconnecting {
        /// Drop reason.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A reconnect attempt succeeded.
    Reconnected {
        /// Connection id assigned by the server.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
    },
}

impl LifecycleEvent {
    /// Stable event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "closed",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Reconnected { .. } => "reconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(LifecycleEvent::Reconnected {
            connection_id: Some("c1".into()),
        })
        .unwrap();
        assert_eq!(json["type"], "reconnected");
        assert_eq!(json["connection_id"], "c1");

        let json = serde_json::to_value(LifecycleEvent::Closed { error: None }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "closed"}));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(LifecycleEvent::Closed { error: None }.event_type(), "closed");
        assert_eq!(
            LifecycleEvent::Reconnecting { error: Some("eof".into()) }.event_type(),
            "reconnecting"
        );
    }
}
