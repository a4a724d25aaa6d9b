//! Client for the line-delimited JSON eye-tracking server protocol
//!
//! The tracking server runs locally, computes gaze estimates from the camera,
//! and speaks newline-delimited JSON over TCP (port 6555 by default). This
//! crate activates a session, drives multi-point calibration, and delivers
//! the continuous push stream of gaze frames and state changes to
//! registered listeners.
//!
//! # Features
//!
//! - **Request correlation** - Every request gets an id; the reply reaches exactly the caller that sent it
//! - **Blocking and non-blocking forms** - Each operation returns `bool` or a [`Deferred`](io::Deferred)
//! - **Automatic resynchronization** - Out-of-band "state changed" notifications trigger a state refresh
//! - **Isolated listeners** - Each callback runs on the worker pool; a panicking listener never affects the others
//! - **Deterministic teardown** - Closing the connection releases every pending caller immediately
//!
//! # Quick Start
//!
//! ```no_run
//! use gazelink::io::ActivationConfig;
//! use gazelink::protocol::types::TrackerState;
//! use gazelink::session::TrackerStateListener;
//! use gazelink::GazeClient;
//! use std::sync::Arc;
//!
//! struct DeviceWatch;
//!
//! impl TrackerStateListener for DeviceWatch {
//!     fn on_tracker_state_changed(&self, state: TrackerState) {
//!         println!("tracker is now {:?}", state);
//!     }
//! }
//!
//! let client = GazeClient::new();
//! client.listeners().tracker_state.add(Arc::new(DeviceWatch));
//!
//! let config = ActivationConfig::with_endpoint("localhost", 6555).with_retries(3);
//! if !client.activate_with(config) {
//!     eprintln!("tracker server not reachable");
//! }
//! ```
//!
//! ## Calibration
//!
//! ```no_run
//! use gazelink::GazeClient;
//!
//! let client = GazeClient::new();
//! # client.activate();
//! let points = [(160, 120), (960, 120), (1760, 120)];
//!
//! if client.calibration_start(points.len(), None) {
//!     for (x, y) in points {
//!         client.calibration_point_start(x, y);
//!         std::thread::sleep(std::time::Duration::from_millis(800));
//!         client.calibration_point_end();
//!     }
//! }
//! println!("calibrated: {}", client.is_calibrated());
//! ```
//!
//! # Architecture
//!
//! ## Module Structure
//!
//! - **`protocol`** - Wire vocabulary
//!   - `message` - Request/response framing, status codes, state keys
//!   - `request` - Requests with their correlation and delivery state
//!   - `types` - Gaze frames, calibration results, tracker enums, screen geometry
//!
//! - **`io`** - Network I/O layer
//!   - `TransportSession` - One TCP connection with a reader and a writer task
//!   - `RequestQueue` / `PendingTable` - Ordering and correlation
//!   - `WorkerPool` / `Deferred` - Shared runtime and deferred results
//!
//! - **`session`** - Session controller
//!   - `GazeClient` - Public operations and state accessors
//!   - `CalibrationSession` - Calibration state machine
//!   - `Listeners` / `Broadcaster` - Five listener categories
//!
//! - **`error`** - Error handling
//!   - `GazeError` - Unified error type for internal operations
//!   - `Result<T>` - Type alias for `Result<T, GazeError>`
//!
//! # Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber.
//! Lifecycle events are `info`, request/response traffic is `debug`, raw
//! lines are `trace`, and recoverable failures are `warn`.

pub mod error;
pub mod io;
pub mod protocol;
pub mod session;

// Re-export commonly used types
pub use error::{GazeError, Result};
pub use session::GazeClient;
