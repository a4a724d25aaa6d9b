//! Wire framing for requests and responses
//!
//! Every message is one JSON document on a single line terminated by `\n`.
//!
//! ```text
//! -> {"category":"tracker","request":"get","id":7,"values":["push","trackerstate"]}
//! <- {"category":"tracker","request":"get","id":7,"statuscode":200,"values":{"push":true,"trackerstate":0}}
//! ```

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default server host
pub const DEFAULT_HOST: &str = "localhost";
/// Default server port
pub const DEFAULT_PORT: u16 = 6555;
/// Default round-trip timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Response status codes
pub mod status {
    /// Request succeeded
    pub const OK: u16 = 200;
    /// Calibration state changed on the server; re-fetch it
    pub const CALIBRATION_CHANGE: u16 = 800;
    /// Active screen changed on the server; re-fetch it
    pub const DISPLAY_CHANGE: u16 = 801;
    /// Tracker device state changed on the server; re-fetch it
    pub const TRACKER_STATE_CHANGE: u16 = 802;

    /// Codes that mean "cached state is stale", not "request failed"
    pub fn is_reserved(code: u16) -> bool {
        matches!(
            code,
            CALIBRATION_CHANGE | DISPLAY_CHANGE | TRACKER_STATE_CHANGE
        )
    }
}

/// Operation names
pub mod op {
    pub const GET: &str = "get";
    pub const SET: &str = "set";
    pub const START: &str = "start";
    pub const POINT_START: &str = "pointstart";
    pub const POINT_END: &str = "pointend";
    pub const ABORT: &str = "abort";
    pub const CLEAR: &str = "clear";
}

/// Tracker state keys used in `get`/`set` values
pub mod keys {
    pub const PUSH: &str = "push";
    pub const HEARTBEAT_INTERVAL: &str = "heartbeatinterval";
    pub const VERSION: &str = "version";
    pub const TRACKER_STATE: &str = "trackerstate";
    pub const FRAME_RATE: &str = "framerate";
    pub const IS_CALIBRATED: &str = "iscalibrated";
    pub const IS_CALIBRATING: &str = "iscalibrating";
    pub const CALIBRATION_RESULT: &str = "calibresult";
    pub const FRAME: &str = "frame";
    pub const SCREEN_INDEX: &str = "screenindex";
    pub const SCREEN_RESOLUTION_WIDTH: &str = "screenresw";
    pub const SCREEN_RESOLUTION_HEIGHT: &str = "screenresh";
    pub const SCREEN_PHYSICAL_WIDTH: &str = "screenpsyw";
    pub const SCREEN_PHYSICAL_HEIGHT: &str = "screenpsyh";
    pub const POINT_COUNT: &str = "pointcount";
    pub const STATUS_MESSAGE: &str = "statusmessage";

    /// Keys requested for a full state snapshot
    pub const ALL_STATES: &[&str] = &[
        PUSH,
        HEARTBEAT_INTERVAL,
        VERSION,
        TRACKER_STATE,
        FRAME_RATE,
        IS_CALIBRATED,
        IS_CALIBRATING,
        CALIBRATION_RESULT,
        SCREEN_INDEX,
        SCREEN_RESOLUTION_WIDTH,
        SCREEN_RESOLUTION_HEIGHT,
        SCREEN_PHYSICAL_WIDTH,
        SCREEN_PHYSICAL_HEIGHT,
    ];

    pub const SCREEN_STATES: &[&str] = &[
        SCREEN_INDEX,
        SCREEN_RESOLUTION_WIDTH,
        SCREEN_RESOLUTION_HEIGHT,
        SCREEN_PHYSICAL_WIDTH,
        SCREEN_PHYSICAL_HEIGHT,
    ];

    pub const CALIBRATION_STATES: &[&str] = &[IS_CALIBRATED, IS_CALIBRATING, CALIBRATION_RESULT];

    pub const TRACKER_STATES: &[&str] = &[TRACKER_STATE, FRAME_RATE];
}

/// Request/response category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tracker,
    Calibration,
    Heartbeat,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tracker => "tracker",
            Category::Calibration => "calibration",
            Category::Heartbeat => "heartbeat",
        }
    }
}

/// Outbound request as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Correlation id, 0 when the request expects no correlated reply
    #[serde(default)]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

impl RequestFrame {
    pub fn new(category: Category, request: Option<&str>, values: Option<Value>) -> Self {
        RequestFrame {
            category,
            request: request.map(str::to_string),
            id: 0,
            values,
        }
    }

    /// Encode as a single JSON line, without the terminator
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse one line produced by [`to_line`](Self::to_line)
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

/// Inbound response line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Correlation id, 0 for unsolicited pushes
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "statuscode")]
    pub status_code: u16,
    #[serde(default)]
    pub values: Value,
    /// Elapsed time between writing the request and reading this response
    #[serde(skip)]
    pub round_trip: Option<Duration>,
}

impl Response {
    /// Parse one inbound line
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim_end())?)
    }

    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == status::OK
    }

    pub fn is_request(&self, category: Category, request: &str) -> bool {
        self.category == category && self.request.as_deref() == Some(request)
    }

    /// `statusmessage` carried by error responses
    pub fn status_message(&self) -> String {
        self.values
            .get(keys::STATUS_MESSAGE)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Decode `values` into a typed payload
    pub fn decode_values<T: DeserializeOwned>(&self) -> Result<T> {
        if self.values.is_null() {
            return Ok(serde_json::from_value(Value::Object(Default::default()))?);
        }
        Ok(serde_json::from_value(self.values.clone())?)
    }
}
