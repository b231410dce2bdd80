//! Resource status events carried on the stream.

use attraccess_core::constants::{STATUS_TEXT_AVAILABLE, STATUS_TEXT_IN_USE};
use serde::Deserialize;

/// Latest known occupancy of the resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    pub in_use: bool,
    pub last_event_type: Option<String>,
}

impl ResourceStatus {
    pub fn status_text(&self) -> &'static str {
        if self.in_use {
            STATUS_TEXT_IN_USE
        } else {
            STATUS_TEXT_AVAILABLE
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusParseError {
    #[error("invalid status JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("status event has no boolean inUse field")]
    MissingInUse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageEvent {
    Started,
    Ended,
    Other(String),
}

impl UsageEvent {
    pub fn classify(event_type: &str) -> Self {
        match event_type {
            "resource.usage.started" => Self::Started,
            "resource.usage.ended" => Self::Ended,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct StatusEvent {
    #[serde(rename = "inUse")]
    in_use: Option<bool>,
    #[serde(rename = "eventType")]
    event_type: Option<String>,
}

/// Parse the JSON payload of a `data:` line.
pub fn parse_status_event(payload: &str) -> Result<ResourceStatus, StatusParseError> {
    let event: StatusEvent = serde_json::from_str(payload)?;
    let in_use = event.in_use.ok_or(StatusParseError::MissingInUse)?;
    Ok(ResourceStatus {
        in_use,
        last_event_type: event.event_type,
    })
}
