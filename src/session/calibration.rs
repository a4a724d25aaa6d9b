//! Calibration state machine
//!
//! ```text
//! Idle ─start─► Starting ─confirmed─► Sampling ─sampled == total─► Processing
//!                                        ▲                              │
//!                                        └──── NeedsResample ◄─ result ─┼─► Succeeded
//!                          abort (any active phase) ─► Aborted          │
//! ```
//!
//! The machine only counts points and emits [`CalibrationEvent`]s; whether
//! to resample individual points is left to the caller.

use crate::error::{GazeError, Result};
use crate::protocol::types::CalibrationResult;
use std::sync::Arc;

/// Callbacks for one calibration run
pub trait CalibrationProcessHandler: Send + Sync {
    /// The server accepted the start request
    fn on_calibration_started(&self);

    /// Fraction of points sampled so far
    fn on_calibration_progress(&self, progress: f64);

    /// All points sampled; the server is computing the result
    fn on_calibration_processing(&self);

    /// Final per-point outcome
    fn on_calibration_result(&self, result: &CalibrationResult);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationPhase {
    #[default]
    Idle,
    Starting,
    Sampling,
    Processing,
    Succeeded,
    NeedsResample,
    Aborted,
}

/// Something the process handler must be told
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationEvent {
    Started,
    Progress(f64),
    Processing,
    Result(CalibrationResult),
}

impl CalibrationEvent {
    /// Deliver this event to `handler`
    pub fn deliver(&self, handler: &dyn CalibrationProcessHandler) {
        match self {
            CalibrationEvent::Started => handler.on_calibration_started(),
            CalibrationEvent::Progress(progress) => handler.on_calibration_progress(*progress),
            CalibrationEvent::Processing => handler.on_calibration_processing(),
            CalibrationEvent::Result(result) => handler.on_calibration_result(result),
        }
    }
}

/// Point-sampling progress of the current calibration run
#[derive(Default)]
pub struct CalibrationSession {
    phase: CalibrationPhase,
    total_points: usize,
    sampled_points: usize,
    handler: Option<Arc<dyn CalibrationProcessHandler>>,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a run of `total_points`
    ///
    /// Fails without side effects while a run is active, including one
    /// waiting for points to be resampled.
    pub fn begin(
        &mut self,
        total_points: usize,
        handler: Option<Arc<dyn CalibrationProcessHandler>>,
    ) -> Result<()> {
        if self.is_active() {
            return Err(GazeError::InvalidState(format!(
                "calibration already in progress ({:?})",
                self.phase
            )));
        }
        if total_points == 0 {
            return Err(GazeError::InvalidState(
                "calibration needs at least one point".to_string(),
            ));
        }

        self.phase = CalibrationPhase::Starting;
        self.total_points = total_points;
        self.sampled_points = 0;
        self.handler = handler;
        Ok(())
    }

    /// The server confirmed the start request
    pub fn on_started(&mut self) -> Vec<CalibrationEvent> {
        if self.phase != CalibrationPhase::Starting {
            return Vec::new();
        }
        self.phase = CalibrationPhase::Sampling;
        vec![CalibrationEvent::Started]
    }

    /// The start request failed; return to idle
    pub fn on_start_failed(&mut self) {
        if self.phase == CalibrationPhase::Starting {
            *self = Self::default();
        }
    }

    /// Whether point start/end requests are allowed
    pub fn can_sample(&self) -> bool {
        matches!(
            self.phase,
            CalibrationPhase::Sampling | CalibrationPhase::NeedsResample
        )
    }

    pub fn on_point_start(&mut self) {
        if self.phase == CalibrationPhase::NeedsResample {
            self.phase = CalibrationPhase::Sampling;
        }
    }

    /// A `pointend` response arrived, possibly carrying the final result
    ///
    /// Every resample-flagged point in a failed result is taken off the
    /// sampled count while the total stays the same, so the caller can
    /// resample those points and climb back to `total`.
    pub fn on_point_end(&mut self, result: Option<CalibrationResult>) -> Vec<CalibrationEvent> {
        let mut events = Vec::new();
        if !matches!(
            self.phase,
            CalibrationPhase::Sampling | CalibrationPhase::NeedsResample | CalibrationPhase::Processing
        ) {
            return events;
        }

        self.sampled_points += 1;
        events.push(CalibrationEvent::Progress(self.progress()));

        if self.sampled_points == self.total_points {
            self.phase = CalibrationPhase::Processing;
            events.push(CalibrationEvent::Processing);
        }

        if let Some(result) = result {
            if result.success {
                self.phase = CalibrationPhase::Succeeded;
            } else {
                self.phase = CalibrationPhase::NeedsResample;
                self.sampled_points = self.sampled_points.saturating_sub(result.resample_count());
            }
            events.push(CalibrationEvent::Result(result));
        }

        events
    }

    /// Active from the start request until a result or abort
    pub fn is_active(&self) -> bool {
        self.is_busy() || self.phase == CalibrationPhase::NeedsResample
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            CalibrationPhase::Starting | CalibrationPhase::Sampling | CalibrationPhase::Processing
        )
    }

    pub fn abort(&mut self) {
        self.phase = CalibrationPhase::Aborted;
        self.handler = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn total_points(&self) -> usize {
        self.total_points
    }

    pub fn sampled_points(&self) -> usize {
        self.sampled_points
    }

    /// `sampled / total`, 0 before a run starts
    pub fn progress(&self) -> f64 {
        if self.total_points == 0 {
            return 0.0;
        }
        self.sampled_points as f64 / self.total_points as f64
    }

    pub fn handler(&self) -> Option<Arc<dyn CalibrationProcessHandler>> {
        self.handler.clone()
    }
}

impl std::fmt::Debug for CalibrationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationSession")
            .field("phase", &self.phase)
            .field("total_points", &self.total_points)
            .field("sampled_points", &self.sampled_points)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}
