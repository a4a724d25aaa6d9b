//! Tracker state values
//!
//! Enumerated device/session properties and the decoded shape of a tracker
//! `get` response. Every enum carries an explicit `Undefined` variant so a
//! freshly reset session never looks like a real device state.

use super::calibration::CalibrationResult;
use super::gaze::GazeData;
use serde::{Deserialize, Serialize};

/// Device connectivity as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Undefined,
    Connected,
    NotConnected,
    ConnectedBadFirmware,
    ConnectedNoUsb3,
    ConnectedNoStream,
}

impl TrackerState {
    /// Map a wire code to a state; unknown codes map to `Undefined`
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TrackerState::Connected,
            1 => TrackerState::NotConnected,
            2 => TrackerState::ConnectedBadFirmware,
            3 => TrackerState::ConnectedNoUsb3,
            4 => TrackerState::ConnectedNoStream,
            _ => TrackerState::Undefined,
        }
    }

    /// Wire code, `None` for `Undefined`
    pub fn code(&self) -> Option<i64> {
        match self {
            TrackerState::Undefined => None,
            TrackerState::Connected => Some(0),
            TrackerState::NotConnected => Some(1),
            TrackerState::ConnectedBadFirmware => Some(2),
            TrackerState::ConnectedNoUsb3 => Some(3),
            TrackerState::ConnectedNoStream => Some(4),
        }
    }
}

/// Camera frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRate {
    #[default]
    Undefined,
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn from_fps(fps: i64) -> Self {
        match fps {
            30 => FrameRate::Fps30,
            60 => FrameRate::Fps60,
            _ => FrameRate::Undefined,
        }
    }

    pub fn fps(&self) -> Option<i64> {
        match self {
            FrameRate::Undefined => None,
            FrameRate::Fps30 => Some(30),
            FrameRate::Fps60 => Some(60),
        }
    }
}

/// Protocol version spoken with the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[default]
    Undefined,
    V1,
}

impl ApiVersion {
    pub fn from_number(version: i64) -> Self {
        match version {
            1 => ApiVersion::V1,
            _ => ApiVersion::Undefined,
        }
    }

    pub fn number(&self) -> Option<i64> {
        match self {
            ApiVersion::Undefined => None,
            ApiVersion::V1 => Some(1),
        }
    }
}

/// Active screen geometry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Screen {
    /// Screen index as enumerated by the server
    pub index: i32,
    /// Resolution width in pixels
    pub resolution_width: i32,
    /// Resolution height in pixels
    pub resolution_height: i32,
    /// Physical width in meters
    pub physical_width: f64,
    /// Physical height in meters
    pub physical_height: f64,
}

impl Screen {
    pub fn new(
        index: i32,
        resolution_width: i32,
        resolution_height: i32,
        physical_width: f64,
        physical_height: f64,
    ) -> Self {
        Screen {
            index,
            resolution_width,
            resolution_height,
            physical_width,
            physical_height,
        }
    }
}

/// Values carried by a tracker `get` response
///
/// Every key is optional: the server only returns the keys that were asked
/// for, and pushed frames carry nothing but `frame`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,
    #[serde(rename = "heartbeatinterval", skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(rename = "trackerstate", skip_serializing_if = "Option::is_none")]
    pub tracker_state: Option<i64>,
    #[serde(rename = "framerate", skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<i64>,
    #[serde(rename = "iscalibrated", skip_serializing_if = "Option::is_none")]
    pub is_calibrated: Option<bool>,
    #[serde(rename = "iscalibrating", skip_serializing_if = "Option::is_none")]
    pub is_calibrating: Option<bool>,
    #[serde(rename = "calibresult", skip_serializing_if = "Option::is_none")]
    pub calibration_result: Option<CalibrationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<GazeData>,
    #[serde(rename = "screenindex", skip_serializing_if = "Option::is_none")]
    pub screen_index: Option<i32>,
    #[serde(rename = "screenresw", skip_serializing_if = "Option::is_none")]
    pub screen_resolution_width: Option<i32>,
    #[serde(rename = "screenresh", skip_serializing_if = "Option::is_none")]
    pub screen_resolution_height: Option<i32>,
    #[serde(rename = "screenpsyw", skip_serializing_if = "Option::is_none")]
    pub screen_physical_width: Option<f64>,
    #[serde(rename = "screenpsyh", skip_serializing_if = "Option::is_none")]
    pub screen_physical_height: Option<f64>,
}

impl TrackerValues {
    /// True if any of the five screen keys is present
    pub fn has_screen_fields(&self) -> bool {
        self.screen_index.is_some()
            || self.screen_resolution_width.is_some()
            || self.screen_resolution_height.is_some()
            || self.screen_physical_width.is_some()
            || self.screen_physical_height.is_some()
    }

    /// Overlay the screen keys present here onto `base`
    pub fn merge_screen(&self, base: Screen) -> Screen {
        Screen {
            index: self.screen_index.unwrap_or(base.index),
            resolution_width: self.screen_resolution_width.unwrap_or(base.resolution_width),
            resolution_height: self
                .screen_resolution_height
                .unwrap_or(base.resolution_height),
            physical_width: self.screen_physical_width.unwrap_or(base.physical_width),
            physical_height: self.screen_physical_height.unwrap_or(base.physical_height),
        }
    }
}
