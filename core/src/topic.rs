use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::platform::WireMessage;
use crate::{PushlinkError, Result};

/// Payload carried by a message. Anything that crosses the page/worker
/// boundary must be representable as structured JSON.
pub type Payload = serde_json::Value;

/// Message kinds understood by the messenger.
///
/// The wire string is the dispatch key; variants are only added, never
/// renamed, since pages and workers of different releases talk to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "GetWorkerVersion")]
    WorkerVersion,
    #[serde(rename = "Subscribe")]
    Subscribe,
    #[serde(rename = "amp-web-push-subscription-state")]
    AmpSubscriptionState,
    #[serde(rename = "amp-web-push-subscribe")]
    AmpSubscribe,
    #[serde(rename = "amp-web-push-unsubscribe")]
    AmpUnsubscribe,
    #[serde(rename = "notification.displayed")]
    NotificationDisplayed,
    #[serde(rename = "notification.clicked")]
    NotificationClicked,
    #[serde(rename = "notification.dismissed")]
    NotificationDismissed,
    #[serde(rename = "command.redirect")]
    RedirectPage,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::WorkerVersion,
        Topic::Subscribe,
        Topic::AmpSubscriptionState,
        Topic::AmpSubscribe,
        Topic::AmpUnsubscribe,
        Topic::NotificationDisplayed,
        Topic::NotificationClicked,
        Topic::NotificationDismissed,
        Topic::RedirectPage,
    ];

    /// Wire string for this topic.
    ///
    /// # Examples
    ///
    /// ```
    /// use pushlink_core::Topic;
    ///
    /// assert_eq!(Topic::NotificationClicked.as_str(), "notification.clicked");
    /// assert_eq!("command.redirect".parse::<Topic>().unwrap(), Topic::RedirectPage);
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::WorkerVersion => "GetWorkerVersion",
            Topic::Subscribe => "Subscribe",
            Topic::AmpSubscriptionState => "amp-web-push-subscription-state",
            Topic::AmpSubscribe => "amp-web-push-subscribe",
            Topic::AmpUnsubscribe => "amp-web-push-unsubscribe",
            Topic::NotificationDisplayed => "notification.displayed",
            Topic::NotificationClicked => "notification.clicked",
            Topic::NotificationDismissed => "notification.dismissed",
            Topic::RedirectPage => "command.redirect",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = PushlinkError;

    fn from_str(s: &str) -> Result<Self> {
        Topic::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PushlinkError::InvalidArgument(format!("unknown topic: {s}")))
    }
}

/// A single `(topic, payload)` exchange between page and worker.
///
/// Serializes to the wire record `{"command": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "command")]
    topic: Topic,
    #[serde(default)]
    payload: Payload,
}

impl Message {
    /// Build a message from any serializable domain object.
    pub fn new<T: Serialize>(topic: Topic, payload: T) -> Result<Self> {
        Ok(Self {
            topic,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Build a message from an already structured payload.
    pub fn from_payload(topic: Topic, payload: Payload) -> Self {
        Self { topic, payload }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Decode the payload into a domain type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn to_wire(&self) -> Result<WireMessage> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_wire(wire: WireMessage) -> Result<Self> {
        Ok(serde_json::from_value(wire)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_strings_match_serde() {
        for topic in Topic::ALL {
            let v = serde_json::to_value(topic).unwrap();
            assert_eq!(v, json!(topic.as_str()));
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
    }

    #[test]
    fn test_unknown_topic_is_invalid_argument() {
        let err = "notification.snoozed".parse::<Topic>().unwrap_err();
        assert!(matches!(err, PushlinkError::InvalidArgument(_)));
    }

    #[test]
    fn test_wire_shape() {
        let msg = Message::new(Topic::RedirectPage, "https://example.com/inbox").unwrap();
        let wire = msg.to_wire().unwrap();
        assert_eq!(
            wire,
            json!({"command": "command.redirect", "payload": "https://example.com/inbox"})
        );
    }

    #[test]
    fn test_wire_without_payload_defaults_to_null() {
        let msg = Message::from_wire(json!({"command": "GetWorkerVersion"})).unwrap();
        assert_eq!(msg.topic(), Topic::WorkerVersion);
        assert!(msg.payload().is_null());
    }

    #[test]
    fn test_from_wire_rejects_unknown_command() {
        assert!(Message::from_wire(json!({"command": "nope", "payload": 1})).is_err());
    }

    #[test]
    fn test_payload_as_domain_type() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Clicked {
            id: String,
            action: Option<String>,
        }

        let sent = Clicked {
            id: "n-1".into(),
            action: Some("open".into()),
        };
        let msg = Message::new(Topic::NotificationClicked, &sent).unwrap();
        let back: Clicked = msg.payload_as().unwrap();
        assert_eq!(back, sent);
    }
}
