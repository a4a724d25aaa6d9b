//! Payload types carried in protocol `values`
//!
//! Plain serializable containers; behavior lives in the session layer.

pub mod calibration;
pub mod gaze;
pub mod tracker;

pub use calibration::{
    Accuracy, CalibrationPoint, CalibrationPointState, CalibrationResult, MeanError,
    StandardDeviation,
};
pub use gaze::{
    Eye, GazeData, Point2D, Point3D, STATE_TRACKING_EYES, STATE_TRACKING_FAIL,
    STATE_TRACKING_GAZE, STATE_TRACKING_LOST, STATE_TRACKING_PRESENCE,
};
pub use tracker::{ApiVersion, FrameRate, Screen, TrackerState, TrackerValues};
