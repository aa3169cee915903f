//! Wire format between the engine and its caller.
//!
//! Events are JSON arrays tagged by their first element:
//! `["SVG", "<svg…>"]` for a snapshot and `["DONE"]` for the terminal signal.
//! A run is started with `{ "pixels": [...], "width": W, "height": H }`
//! (`pxdata` is accepted for `pixels`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::controller::EngineEvent;

pub const TAG_SVG: &str = "SVG";
pub const TAG_DONE: &str = "DONE";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// any tag other than SVG / DONE; reportable, never fatal
    #[error("unknown message tag '{0}'")]
    UnknownTag(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// start-run request: flat unpremultiplied RGBA plus dimensions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRun {
    #[serde(alias = "pxdata")]
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl StartRun {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// engine → caller message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    Svg(String),
    Done,
}

impl WireMessage {
    pub fn to_json(&self) -> String {
        let array = match self {
            WireMessage::Svg(markup) => vec![Value::from(TAG_SVG), Value::from(markup.as_str())],
            WireMessage::Done => vec![Value::from(TAG_DONE)],
        };
        Value::Array(array).to_string()
    }

    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(json).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Value::Array(items) = value else {
            return Err(ProtocolError::Malformed("expected a JSON array".into()));
        };
        let tag = match items.first() {
            Some(Value::String(tag)) => tag.as_str(),
            Some(_) => return Err(ProtocolError::Malformed("tag must be a string".into())),
            None => return Err(ProtocolError::Malformed("empty message".into())),
        };

        match tag {
            TAG_SVG => match items.get(1) {
                Some(Value::String(markup)) => Ok(WireMessage::Svg(markup.clone())),
                _ => Err(ProtocolError::Malformed("SVG message without markup".into())),
            },
            TAG_DONE => Ok(WireMessage::Done),
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }
}

impl From<&EngineEvent> for WireMessage {
    fn from(event: &EngineEvent) -> Self {
        match event {
            EngineEvent::Snapshot(snapshot) => WireMessage::Svg(snapshot.svg.clone()),
            EngineEvent::Done(_) => WireMessage::Done,
        }
    }
}
