//! Authoritative session state
//!
//! Owned by the client and written only while applying inbound responses.
//! Every field starts out, and returns to, an explicit undefined value.

use crate::protocol::types::{
    ApiVersion, CalibrationResult, FrameRate, GazeData, Screen, TrackerState, TrackerValues,
};
use std::time::Duration;

/// Heartbeat interval used until the server announces its own
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3_000);

/// Snapshot of everything the client knows about the server session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub is_activated: bool,
    pub tracker_state: TrackerState,
    pub is_calibrating: bool,
    pub is_calibrated: bool,
    pub last_calibration_result: Option<CalibrationResult>,
    pub screen: Option<Screen>,
    pub frame_rate: FrameRate,
    pub version: ApiVersion,
    pub push_mode: Option<bool>,
    pub heartbeat_interval: Option<Duration>,
    pub last_gaze_data: Option<GazeData>,
}

/// What changed while applying one tracker response
///
/// Each `Some`/`true` field maps to one listener category to notify.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateChanges {
    pub tracker_state: Option<TrackerState>,
    pub calibration: bool,
    pub screen: Option<Screen>,
    /// Pushed frames are forwarded every time, changed or not
    pub gaze: Option<GazeData>,
}

impl StateChanges {
    pub fn is_empty(&self) -> bool {
        self.tracker_state.is_none() && !self.calibration && self.screen.is_none() && self.gaze.is_none()
    }
}

impl SessionState {
    /// Return every field to undefined
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }

    /// Merge the keys present in a tracker `get` response
    pub fn apply(&mut self, values: &TrackerValues) -> StateChanges {
        let mut changes = StateChanges::default();

        if let Some(push) = values.push {
            self.push_mode = Some(push);
        }
        if let Some(ms) = values.heartbeat_interval {
            self.heartbeat_interval = Some(Duration::from_millis(ms));
        }
        if let Some(version) = values.version {
            self.version = ApiVersion::from_number(version);
        }
        if let Some(fps) = values.frame_rate {
            self.frame_rate = FrameRate::from_fps(fps);
        }

        if let Some(code) = values.tracker_state {
            let state = TrackerState::from_code(code);
            if state != self.tracker_state {
                self.tracker_state = state;
                changes.tracker_state = Some(state);
            }
        }

        if let Some(calibrating) = values.is_calibrating {
            self.is_calibrating = calibrating;
        }
        if let Some(calibrated) = values.is_calibrated {
            if calibrated != self.is_calibrated {
                self.is_calibrated = calibrated;
                changes.calibration = true;
            }
        }
        if let Some(result) = &values.calibration_result {
            if self.store_calibration_result(result) {
                changes.calibration = true;
            }
        }

        if values.has_screen_fields() {
            let screen = values.merge_screen(self.screen.unwrap_or_default());
            if self.screen != Some(screen) {
                self.screen = Some(screen);
                changes.screen = Some(screen);
            }
        }

        if let Some(frame) = &values.frame {
            self.last_gaze_data = Some(frame.clone());
            changes.gaze = Some(frame.clone());
        }

        changes
    }

    /// Apply a final calibration result from a `pointend` response
    ///
    /// # Returns
    /// `true` if calibration listeners should be told
    pub fn apply_calibration_result(&mut self, result: &CalibrationResult) -> bool {
        let was_calibrated = self.is_calibrated;
        self.is_calibrated = result.success;
        self.is_calibrating = !result.success;
        let stored = self.store_calibration_result(result);
        stored || was_calibrated != self.is_calibrated
    }

    /// Drop calibration flags and the last result
    ///
    /// # Returns
    /// `true` if anything was set before
    pub fn clear_calibration(&mut self) -> bool {
        let had_any = self.is_calibrated || self.last_calibration_result.is_some();
        self.is_calibrated = false;
        self.is_calibrating = false;
        self.last_calibration_result = None;
        had_any
    }

    /// Keep `result` only if it differs from the stored one
    fn store_calibration_result(&mut self, result: &CalibrationResult) -> bool {
        if self.last_calibration_result.as_ref() == Some(result) {
            return false;
        }
        self.last_calibration_result = Some(result.clone());
        true
    }

    pub fn heartbeat_interval_or_default(&self) -> Duration {
        self.heartbeat_interval
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
