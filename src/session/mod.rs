//! Session controller
//!
//! Turns the transport into a typed API: activation and teardown, the
//! authoritative session state, the calibration state machine, and listener
//! broadcasting.

pub mod calibration;
pub mod client;
pub mod listeners;
pub mod state;

pub use calibration::{CalibrationPhase, CalibrationProcessHandler};
pub use client::GazeClient;
pub use listeners::{
    CalibrationResultListener, ConnectionStateListener, GazeListener, Listeners,
    ScreenStateListener, TrackerStateListener,
};
pub use state::SessionState;
