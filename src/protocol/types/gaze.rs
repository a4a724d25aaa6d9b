//! Gaze frame payload
//!
//! One `GazeData` is pushed by the server for every processed camera frame
//! while the client is in push mode. It arrives as `values.frame` of an
//! id-less tracker `get` response.

use serde::{Deserialize, Serialize};

/// Gaze was estimated for this frame
pub const STATE_TRACKING_GAZE: u32 = 0x1;
/// Both eyes were located
pub const STATE_TRACKING_EYES: u32 = 0x2;
/// A user is present in front of the device
pub const STATE_TRACKING_PRESENCE: u32 = 0x4;
/// Tracking failed for this frame
pub const STATE_TRACKING_FAIL: u32 = 0x8;
/// Tracking was lost
pub const STATE_TRACKING_LOST: u32 = 0x10;

/// 2D point in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Point2D { x, y }
    }
}

/// 3D point in device space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point3D { x, y, z }
    }
}

/// Per-eye sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Eye {
    /// Raw gaze coordinates in pixels
    pub raw: Point2D,
    /// Smoothed gaze coordinates in pixels
    pub avg: Point2D,
    /// Pupil size
    #[serde(rename = "psize")]
    pub pupil_size: f64,
    /// Pupil center, normalized to the camera image
    #[serde(rename = "pcenter")]
    pub pupil_center: Point2D,
}

/// One gaze-tracking sample
///
/// # Wire format
/// ```text
/// {"timestamp":"2024-05-01 12:00:00.000","time":1714564800000,"fix":false,"state":7,
///  "raw":{"x":0,"y":0},"avg":{"x":0,"y":0},"lefteye":{..},"righteye":{..}}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeData {
    /// Human readable server timestamp
    pub timestamp: String,
    /// Server timestamp in milliseconds
    pub time: i64,
    /// Whether the user is fixating
    #[serde(rename = "fix")]
    pub is_fixated: bool,
    /// Bit set of `STATE_TRACKING_*` flags
    pub state: u32,
    /// Raw gaze coordinates in pixels
    #[serde(rename = "raw")]
    pub raw_coordinates: Point2D,
    /// Smoothed gaze coordinates in pixels
    #[serde(rename = "avg")]
    pub smoothed_coordinates: Point2D,
    #[serde(rename = "lefteye")]
    pub left_eye: Eye,
    #[serde(rename = "righteye")]
    pub right_eye: Eye,
}

impl GazeData {
    /// Check whether a `STATE_TRACKING_*` flag is set
    pub fn has_state(&self, flag: u32) -> bool {
        self.state & flag != 0
    }

    /// True when the frame reports a tracking failure
    pub fn is_tracking_fail(&self) -> bool {
        self.has_state(STATE_TRACKING_FAIL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_frame() {
        let json = r#"{
            "timestamp": "2024-05-01 12:00:00.000",
            "time": 1714564800000,
            "fix": true,
            "state": 7,
            "raw": {"x": 640.5, "y": 400.0},
            "avg": {"x": 641.0, "y": 401.5},
            "lefteye": {"raw": {"x": 630, "y": 398}, "avg": {"x": 631, "y": 399},
                        "psize": 21.4, "pcenter": {"x": 0.42, "y": 0.51}},
            "righteye": {"raw": {"x": 650, "y": 402}, "avg": {"x": 651, "y": 403},
                         "psize": 20.9, "pcenter": {"x": 0.58, "y": 0.50}}
        }"#;

        let frame: GazeData = serde_json::from_str(json).unwrap();
        assert!(frame.is_fixated);
        assert_eq!(frame.time, 1714564800000);
        assert_eq!(frame.smoothed_coordinates, Point2D::new(641.0, 401.5));
        assert_eq!(frame.left_eye.pupil_size, 21.4);
        assert!(frame.has_state(STATE_TRACKING_GAZE));
        assert!(frame.has_state(STATE_TRACKING_PRESENCE));
        assert!(!frame.is_tracking_fail());
    }

    #[test]
    fn test_missing_fields_default() {
        let frame: GazeData = serde_json::from_str(r#"{"state": 8}"#).unwrap();
        assert!(frame.is_tracking_fail());
        assert_eq!(frame.raw_coordinates, Point2D::default());
        assert!(frame.timestamp.is_empty());
    }
}
