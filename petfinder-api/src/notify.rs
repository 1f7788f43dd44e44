//! Push notifications to pet owners
//!
//! Delivery goes through the Expo push API. A failed push never fails the
//! request that triggered it; outcomes are logged and returned for callers
//! that care.

use std::time::Duration;

use petfinder_common::config::PushConfig;
use petfinder_common::{AlertDocument, Error, Result, SightingDocument};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// One push message in Expo's format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl PushMessage {
    /// Message telling an owner a sighting was attached to their alert
    pub fn for_sighting(token: &str, alert: &AlertDocument, sighting: &SightingDocument) -> Self {
        let pet = alert
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("your pet");

        let place = sighting
            .location_desc
            .as_deref()
            .filter(|desc| !desc.is_empty())
            .map(|desc| format!(" near {}", desc))
            .unwrap_or_default();

        Self {
            to: token.to_string(),
            title: format!("Possible sighting of {}", pet),
            body: format!("Someone may have seen {}{}. Open the app for details.", pet, place),
            data: json!({
                "pet_id": alert.pet_id,
                "timestamp": sighting.timestamp,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Push disabled or no token on the alert
    Skipped,
    Delivered,
    /// The push service accepted the request but refused the message
    Rejected(String),
    /// The push service could not be reached or answered with an error
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PushNotifier {
    client: Option<reqwest::Client>,
    endpoint: String,
}

impl PushNotifier {
    pub fn disabled() -> Self {
        Self {
            client: None,
            endpoint: String::new(),
        }
    }

    pub fn expo(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Push client setup failed: {}", e)))?;

        Ok(Self {
            client: Some(client),
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &PushConfig) -> Result<Self> {
        if config.enabled {
            Self::expo(config.endpoint.clone(), Duration::from_secs(config.timeout_secs))
        } else {
            Ok(Self::disabled())
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Tell the alert's owner about a newly attached sighting
    pub async fn notify_sighting(&self, alert: &AlertDocument, sighting: &SightingDocument) -> PushOutcome {
        let Some(token) = alert.push_token.as_deref().filter(|t| !t.is_empty()) else {
            return PushOutcome::Skipped;
        };
        self.send(&PushMessage::for_sighting(token, alert, sighting)).await
    }

    pub async fn send(&self, message: &PushMessage) -> PushOutcome {
        let Some(client) = &self.client else {
            info!(to = %message.to, title = %message.title, "Push disabled, not sending");
            return PushOutcome::Skipped;
        };

        let response = client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .json(message)
            .send()
            .await;

        let ticket: Value = match response {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(ticket) => ticket,
                Err(e) => return failed(format!("unreadable push response: {}", e)),
            },
            Ok(response) => return failed(format!("push service answered {}", response.status())),
            Err(e) => return failed(format!("push request failed: {}", e)),
        };

        let outcome = read_ticket(&ticket);
        match &outcome {
            PushOutcome::Delivered => info!(to = %message.to, "Push delivered"),
            PushOutcome::Rejected(reason) => warn!(to = %message.to, "Push rejected: {}", reason),
            _ => {}
        }
        outcome
    }
}

fn failed(reason: String) -> PushOutcome {
    warn!("{}", reason);
    PushOutcome::Failed(reason)
}

/// Interpret an Expo push ticket (`{"data": {...}}` or `{"data": [{...}]}`)
fn read_ticket(ticket: &Value) -> PushOutcome {
    let data = match &ticket["data"] {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };

    match data["status"].as_str() {
        Some("ok") => PushOutcome::Delivered,
        Some("error") => {
            let reason = data["details"]["error"]
                .as_str()
                .or_else(|| data["message"].as_str())
                .unwrap_or("unknown error");
            PushOutcome::Rejected(reason.to_string())
        }
        _ => PushOutcome::Failed(format!("unexpected push response: {}", ticket)),
    }
}
