//! Calibration result payload
//!
//! Delivered as `values.calibresult` on the final calibration `pointend`
//! response and in tracker state snapshots.

use super::gaze::Point2D;
use serde::{Deserialize, Serialize};

/// Outcome of sampling one calibration point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum CalibrationPointState {
    /// No usable samples were collected
    #[default]
    NoData,
    /// The point should be sampled again
    Resample,
    /// The point calibrated fine
    Ok,
}

impl From<u8> for CalibrationPointState {
    fn from(code: u8) -> Self {
        match code {
            1 => CalibrationPointState::Resample,
            2 => CalibrationPointState::Ok,
            _ => CalibrationPointState::NoData,
        }
    }
}

impl From<CalibrationPointState> for u8 {
    fn from(state: CalibrationPointState) -> Self {
        match state {
            CalibrationPointState::NoData => 0,
            CalibrationPointState::Resample => 1,
            CalibrationPointState::Ok => 2,
        }
    }
}

/// Accuracy in degrees of visual angle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Accuracy {
    #[serde(rename = "ad")]
    pub average: f64,
    #[serde(rename = "adl")]
    pub left: f64,
    #[serde(rename = "adr")]
    pub right: f64,
}

/// Mean error in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanError {
    #[serde(rename = "mep")]
    pub average: f64,
    #[serde(rename = "mepl")]
    pub left: f64,
    #[serde(rename = "mepr")]
    pub right: f64,
}

/// Standard deviation in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardDeviation {
    #[serde(rename = "asd")]
    pub average: f64,
    #[serde(rename = "asdl")]
    pub left: f64,
    #[serde(rename = "asdr")]
    pub right: f64,
}

/// Per-point calibration outcome
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationPoint {
    pub state: CalibrationPointState,
    /// Screen location of the point
    #[serde(rename = "cp")]
    pub coordinates: Point2D,
    /// Mean estimated gaze location while the point was shown
    #[serde(rename = "mecp")]
    pub mean_estimated_coordinates: Point2D,
    #[serde(rename = "acd")]
    pub accuracy: Accuracy,
    #[serde(rename = "mepix")]
    pub mean_error: MeanError,
    #[serde(rename = "asdp")]
    pub standard_deviation: StandardDeviation,
}

/// Complete calibration result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationResult {
    #[serde(rename = "result")]
    pub success: bool,
    /// Average error in degrees
    #[serde(rename = "deg")]
    pub average_error_degree: f64,
    #[serde(rename = "degl")]
    pub average_error_degree_left: f64,
    #[serde(rename = "degr")]
    pub average_error_degree_right: f64,
    #[serde(rename = "calibpoints")]
    pub points: Vec<CalibrationPoint>,
}

impl CalibrationResult {
    /// Points the server flagged for resampling
    pub fn resample_points(&self) -> impl Iterator<Item = &CalibrationPoint> {
        self.points
            .iter()
            .filter(|p| p.state == CalibrationPointState::Resample)
    }

    /// Number of points flagged for resampling
    pub fn resample_count(&self) -> usize {
        self.resample_points().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result() {
        let json = r#"{
            "result": false, "deg": 0.8, "degl": 0.9, "degr": 0.7,
            "calibpoints": [
                {"state": 2, "cp": {"x": 100, "y": 100}, "mecp": {"x": 101, "y": 99},
                 "acd": {"ad": 0.5, "adl": 0.6, "adr": 0.4},
                 "mepix": {"mep": 12, "mepl": 13, "mepr": 11},
                 "asdp": {"asd": 3, "asdl": 4, "asdr": 2}},
                {"state": 1, "cp": {"x": 500, "y": 100}},
                {"state": 0, "cp": {"x": 900, "y": 100}}
            ]
        }"#;

        let result: CalibrationResult = serde_json::from_str(json).unwrap();
        assert!(!result.success);
        assert_eq!(result.points.len(), 3);
        assert_eq!(result.points[0].state, CalibrationPointState::Ok);
        assert_eq!(result.points[0].accuracy.left, 0.6);
        assert_eq!(result.points[1].state, CalibrationPointState::Resample);
        assert_eq!(result.points[2].state, CalibrationPointState::NoData);
        assert_eq!(result.resample_count(), 1);
        assert_eq!(
            result.resample_points().next().unwrap().coordinates,
            Point2D::new(500.0, 100.0)
        );
    }

    #[test]
    fn test_point_state_codes() {
        assert_eq!(u8::from(CalibrationPointState::Ok), 2);
        assert_eq!(CalibrationPointState::from(1), CalibrationPointState::Resample);
        assert_eq!(CalibrationPointState::from(42), CalibrationPointState::NoData);
    }
}
