//! Session controller
//!
//! [`GazeClient`] is the public surface of the crate. It owns the worker
//! pool, the transport session, the authoritative [`SessionState`], the
//! calibration state machine, and the listener registries.
//!
//! Every operation comes in two forms:
//!
//! - `operation_async(..)` returns a [`Deferred`] immediately; the body runs
//!   on the worker pool.
//! - `operation(..)` calls the async form and blocks the calling thread until
//!   it resolves or the request timeout passes.
//!
//! Nothing here panics or returns an error across the public boundary:
//! failures are logged and reported as `false`.
//!
//! # Examples
//!
//! ```no_run
//! use gazelink::io::config::ActivationConfig;
//! use gazelink::protocol::types::GazeData;
//! use gazelink::session::listeners::GazeListener;
//! use gazelink::GazeClient;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl GazeListener for Printer {
//!     fn on_gaze_update(&self, frame: &GazeData) {
//!         println!("{:?}", frame.smoothed_coordinates);
//!     }
//! }
//!
//! let client = GazeClient::new();
//! client.listeners().gaze.add(Arc::new(Printer));
//!
//! if client.activate_with(ActivationConfig::default().with_retries(3)) {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//! }
//! client.deactivate();
//! ```

use crate::error::{GazeError, Result};
use crate::io::config::ActivationConfig;
use crate::io::pool::{Deferred, WorkerPool};
use crate::io::request_queue::QueueStats;
use crate::io::transport::{ResponseHandler, TransportSession, TransportStats};
use crate::protocol::message::{keys, op, status, Category, Response};
use crate::protocol::request::Request;
use crate::protocol::types::{
    ApiVersion, CalibrationResult, FrameRate, GazeData, Screen, TrackerState, TrackerValues,
};
use crate::session::calibration::{CalibrationEvent, CalibrationProcessHandler, CalibrationSession};
use crate::session::listeners::{Broadcaster, Listeners};
use crate::session::state::{SessionState, StateChanges};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Extra time a blocking `activate` waits beyond the activation budget
const ACTIVATION_GRACE: Duration = Duration::from_secs(1);

/// Client for one eye-tracking server session
///
/// Construct one explicitly and keep it for as long as the session is
/// needed. Dropping it deactivates the session.
pub struct GazeClient {
    core: Arc<ClientCore>,
}

struct ClientCore {
    config: Mutex<ActivationConfig>,
    pool: Arc<WorkerPool>,
    transport: TransportSession,
    state: RwLock<SessionState>,
    calibration: Mutex<CalibrationSession>,
    listeners: Listeners,
    broadcaster: Broadcaster,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    activation: tokio::sync::Mutex<()>,
}

/// Routes transport callbacks back into the controller
///
/// Holds a weak reference so the transport's tasks never keep the
/// controller alive.
struct CoreHandle(Weak<ClientCore>);

impl ResponseHandler for CoreHandle {
    fn on_response(&self, response: &Response) {
        if let Some(core) = self.0.upgrade() {
            core.apply_response(response);
        }
    }

    fn on_connection_lost(&self) {
        if let Some(core) = self.0.upgrade() {
            core.handle_connection_lost();
        }
    }
}

impl ClientCore {
    fn request_timeout(&self) -> Duration {
        self.config.lock().request_timeout
    }

    /// Send `request` with a fresh id and wait for its correlated reply
    async fn call(&self, request: Request) -> Result<Response> {
        let id = self.transport.next_request_id();
        let mut request = request.with_id(id);
        let reply = request.attach_waiter();
        self.transport.send(request)?;

        let timeout = self.request_timeout();
        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(GazeError::Cancelled),
            Err(_) => {
                self.transport.abandon(id);
                Err(GazeError::Timeout(timeout.as_millis()))
            }
        }
    }

    /// Ask for `state_keys` without waiting; the reply is applied on arrival
    fn refresh(&self, state_keys: &[&str]) {
        let request = Request::tracker_get(state_keys).with_id(self.transport.next_request_id());
        if let Err(e) = self.transport.send(request) {
            debug!(error = %e, "State refresh not sent");
        }
    }

    /// Entry point for every inbound response, called on the reader task
    fn apply_response(&self, response: &Response) {
        if !response.is_ok() {
            match response.status_code {
                status::CALIBRATION_CHANGE => self.refresh(keys::CALIBRATION_STATES),
                status::DISPLAY_CHANGE => self.refresh(keys::SCREEN_STATES),
                status::TRACKER_STATE_CHANGE => self.refresh(keys::TRACKER_STATES),
                code => warn!(
                    category = response.category.as_str(),
                    request = response.request.as_deref().unwrap_or(""),
                    status = code,
                    message = %response.status_message(),
                    "Request failed"
                ),
            }
            return;
        }

        match response.category {
            Category::Tracker => self.apply_tracker(response),
            Category::Calibration => self.apply_calibration(response),
            Category::Heartbeat => {}
        }
    }

    fn apply_tracker(&self, response: &Response) {
        if response.request.as_deref() != Some(op::GET) {
            return;
        }
        let values: TrackerValues = match response.decode_values() {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Undecodable tracker values");
                return;
            }
        };

        let (changes, calibration) = {
            let mut state = self.state.write();
            let changes = state.apply(&values);
            let calibration = changes
                .calibration
                .then(|| (state.is_calibrated, state.last_calibration_result.clone()));
            (changes, calibration)
        };
        self.publish(changes, calibration);
    }

    fn apply_calibration(&self, response: &Response) {
        match response.request.as_deref() {
            Some(op::START) => {
                self.state.write().is_calibrating = true;
                let (handler, events) = {
                    let mut calibration = self.calibration.lock();
                    (calibration.handler(), calibration.on_started())
                };
                self.notify_handler(handler, events);
            }
            Some(op::POINT_START) => self.calibration.lock().on_point_start(),
            Some(op::POINT_END) => {
                let result = match response.values.get(keys::CALIBRATION_RESULT) {
                    Some(value) => match serde_json::from_value::<CalibrationResult>(value.clone()) {
                        Ok(result) => Some(result),
                        Err(e) => {
                            warn!(error = %e, "Undecodable calibration result");
                            None
                        }
                    },
                    None => None,
                };

                let (handler, events) = {
                    let mut calibration = self.calibration.lock();
                    (calibration.handler(), calibration.on_point_end(result.clone()))
                };

                if let Some(result) = &result {
                    let changed = self.state.write().apply_calibration_result(result);
                    if changed {
                        info!(
                            success = result.success,
                            error_deg = result.average_error_degree,
                            resample = result.resample_count(),
                            "Calibration result"
                        );
                        self.broadcaster.calibration(
                            &self.listeners,
                            result.success,
                            Some(result.clone()),
                        );
                    }
                }
                self.notify_handler(handler, events);
            }
            Some(op::ABORT) => {
                self.state.write().is_calibrating = false;
                self.calibration.lock().abort();
                self.refresh(keys::ALL_STATES);
            }
            _ => {}
        }
    }

    fn publish(&self, changes: StateChanges, calibration: Option<(bool, Option<CalibrationResult>)>) {
        if let Some(tracker_state) = changes.tracker_state {
            debug!(state = ?tracker_state, "Tracker state changed");
            self.broadcaster.tracker_state(&self.listeners, tracker_state);
        }
        if let Some((is_calibrated, result)) = calibration {
            self.broadcaster.calibration(&self.listeners, is_calibrated, result);
        }
        if let Some(screen) = changes.screen {
            debug!(screen = ?screen, "Screen changed");
            self.broadcaster.screen_state(&self.listeners, screen);
        }
        if let Some(frame) = changes.gaze {
            self.broadcaster.gaze(&self.listeners, frame);
        }
    }

    fn notify_handler(
        &self,
        handler: Option<Arc<dyn CalibrationProcessHandler>>,
        events: Vec<CalibrationEvent>,
    ) {
        if let Some(handler) = handler {
            if !events.is_empty() {
                self.broadcaster.calibration_events(handler, events);
            }
        }
    }

    fn handle_connection_lost(&self) {
        self.stop_heartbeat();
        let was_activated = {
            let mut state = self.state.write();
            let was_activated = state.is_activated;
            state.reset();
            was_activated
        };
        self.calibration.lock().clear();

        if was_activated {
            warn!("Session lost its connection");
            self.broadcaster.connection_state(&self.listeners, false);
        }
    }

    async fn activate(self: Arc<Self>, config: ActivationConfig) -> bool {
        let _guard = self.activation.lock().await;
        if self.state.read().is_activated && self.transport.is_connected() {
            return true;
        }

        *self.config.lock() = config.clone();
        let attempts = config.attempts();
        let window = config.attempt_window();
        info!(
            addr = %config.addr(),
            attempts = attempts,
            window_ms = window.as_millis() as u64,
            "Activating"
        );

        for attempt in 1..=attempts {
            let deadline = Instant::now() + window;
            match tokio::time::timeout_at(deadline, self.initialize(&config, window)).await {
                Ok(Ok(())) => {
                    self.state.write().is_activated = true;
                    self.start_heartbeat();
                    info!(attempt = attempt, "Activated");
                    self.broadcaster.connection_state(&self.listeners, true);
                    return true;
                }
                Ok(Err(e)) => warn!(attempt = attempt, error = %e, "Activation attempt failed"),
                Err(_) => warn!(attempt = attempt, "Activation attempt timed out"),
            }

            self.transport.close();
            self.state.write().reset();
            tokio::time::sleep_until(deadline).await;
        }

        warn!(addr = %config.addr(), attempts = attempts, "Activation failed");
        false
    }

    /// Connect, handshake, and wait for the first full state snapshot
    async fn initialize(&self, config: &ActivationConfig, window: Duration) -> Result<()> {
        if !self.transport.connect(&config.host, config.port, window).await {
            return Err(GazeError::NotConnected);
        }

        let handshake = Request::handshake(config.api_version)
            .with_id(self.transport.next_request_id());
        self.transport.send(handshake)?;

        self.call(Request::tracker_get(keys::ALL_STATES)).await?;
        Ok(())
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let handle = match self.pool.handle() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Heartbeat not started");
                return;
            }
        };

        let weak = Arc::downgrade(self);
        let task = handle.spawn(async move {
            loop {
                let Some(core) = weak.upgrade() else { break };
                let interval = core.state.read().heartbeat_interval_or_default();
                drop(core);
                tokio::time::sleep(interval).await;

                let Some(core) = weak.upgrade() else { break };
                if core.transport.send(Request::heartbeat()).is_err() {
                    break;
                }
            }
            debug!("Heartbeat stopped");
        });

        if let Some(previous) = self.heartbeat.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_heartbeat(&self) {
        if let Some(task) = self.heartbeat.lock().take() {
            task.abort();
        }
    }

    fn deactivate(&self) {
        self.listeners.clear_all();
        self.stop_heartbeat();
        self.transport.close();
        self.state.write().reset();
        self.calibration.lock().clear();
        self.pool.shutdown();
        debug!("Deactivated");
    }

    async fn calibration_start(&self, point_count: usize) -> bool {
        match self.call(Request::calibration_start(point_count)).await {
            Ok(_) => {
                info!(points = point_count, "Calibration started");
                true
            }
            Err(e) => {
                self.calibration.lock().on_start_failed();
                warn!(error = %e, "Calibration start failed");
                false
            }
        }
    }

    async fn calibration_abort(&self) -> bool {
        match self.call(Request::calibration_abort()).await {
            Ok(_) => {
                info!("Calibration aborted");
                true
            }
            Err(e) => {
                warn!(error = %e, "Calibration abort failed");
                false
            }
        }
    }

    async fn switch_screen(&self, screen: Screen) -> bool {
        if let Err(e) = self.call(Request::switch_screen(&screen)).await {
            warn!(error = %e, "Screen switch failed");
            return false;
        }
        if let Err(e) = self.call(Request::tracker_get(keys::SCREEN_STATES)).await {
            warn!(error = %e, "Screen state refresh failed");
            return false;
        }

        let current = self.state.read().screen;
        if current != Some(screen) {
            warn!(requested = ?screen, current = ?current, "Server did not apply screen switch");
            return false;
        }
        true
    }

    /// Run a request for its success alone
    async fn call_ok(&self, request: Request, what: &'static str) -> bool {
        match self.call(request).await {
            Ok(_) => true,
            Err(e) => {
                warn!(operation = what, error = %e, "Request failed");
                false
            }
        }
    }
}

impl GazeClient {
    /// Create an inactive client with its own worker pool
    pub fn new() -> Self {
        Self::with_pool(WorkerPool::new())
    }

    /// Create an inactive client that runs its work on `pool`
    pub fn with_pool(pool: WorkerPool) -> Self {
        let pool = Arc::new(pool);
        let core = Arc::new_cyclic(|weak: &Weak<ClientCore>| ClientCore {
            config: Mutex::new(ActivationConfig::default()),
            pool: pool.clone(),
            transport: TransportSession::new(Arc::new(CoreHandle(weak.clone()))),
            state: RwLock::new(SessionState::default()),
            calibration: Mutex::new(CalibrationSession::new()),
            listeners: Listeners::new(),
            broadcaster: Broadcaster::new(pool),
            heartbeat: Mutex::new(None),
            activation: tokio::sync::Mutex::new(()),
        });
        GazeClient { core }
    }

    fn spawn<F>(&self, operation: &'static str, future: F) -> Deferred<bool>
    where
        F: Future<Output = bool> + Send + 'static,
    {
        match self.core.pool.spawn(future) {
            Ok(deferred) => deferred,
            Err(e) => {
                warn!(operation = operation, error = %e, "Could not schedule operation");
                Deferred::failed()
            }
        }
    }

    fn request_timeout(&self) -> Duration {
        self.core.request_timeout()
    }

    // ---- lifecycle ----

    /// Activate with the default configuration
    pub fn activate(&self) -> bool {
        self.activate_with(ActivationConfig::default())
    }

    /// Connect, handshake and load the initial state snapshot
    ///
    /// Makes up to `config.retries` attempts, each allowed
    /// `config.timeout / config.retries`. Returns `false` once every attempt
    /// has failed, which takes about `config.timeout` in total.
    pub fn activate_with(&self, config: ActivationConfig) -> bool {
        let wait = (config.timeout + ACTIVATION_GRACE).max(config.request_timeout);
        self.activate_async_with(config)
            .wait(wait)
            .unwrap_or(false)
    }

    /// Non-blocking form of [`activate`](Self::activate)
    pub fn activate_async(&self) -> Deferred<bool> {
        self.activate_async_with(ActivationConfig::default())
    }

    /// Non-blocking form of [`activate_with`](Self::activate_with)
    pub fn activate_async_with(&self, config: ActivationConfig) -> Deferred<bool> {
        let core = self.core.clone();
        self.spawn("activate", core.activate(config))
    }

    /// Tear everything down and return to the undefined state
    ///
    /// Clears every listener registry, stops the heartbeat, closes the
    /// transport (releasing all pending callers), resets session state and
    /// stops the worker pool. Safe to call at any time, any number of times.
    pub fn deactivate(&self) {
        self.core.deactivate();
    }

    /// Teardown is immediate; the returned deferred is already resolved
    pub fn deactivate_async(&self) -> Deferred<()> {
        self.core.deactivate();
        Deferred::ready(())
    }

    // ---- calibration ----

    /// Start a calibration run of `point_count` points
    ///
    /// Fails without contacting the server while a run is already in
    /// progress, including a failed run still waiting for resampled points.
    pub fn calibration_start(
        &self,
        point_count: usize,
        handler: Option<Arc<dyn CalibrationProcessHandler>>,
    ) -> bool {
        self.calibration_start_async(point_count, handler)
            .wait(self.request_timeout())
            .unwrap_or(false)
    }

    /// Non-blocking form of [`calibration_start`](Self::calibration_start)
    pub fn calibration_start_async(
        &self,
        point_count: usize,
        handler: Option<Arc<dyn CalibrationProcessHandler>>,
    ) -> Deferred<bool> {
        if self.core.state.read().is_calibrating {
            warn!("Calibration start rejected: server reports a run in progress");
            return Deferred::ready(false);
        }
        if let Err(e) = self.core.calibration.lock().begin(point_count, handler) {
            warn!(error = %e, "Calibration start rejected");
            return Deferred::ready(false);
        }
        let core = self.core.clone();
        self.spawn("calibration_start", async move {
            core.calibration_start(point_count).await
        })
    }

    /// Tell the server the user is now looking at point `(x, y)`
    ///
    /// Only valid while a run is sampling or waiting for resampled points.
    pub fn calibration_point_start(&self, x: i32, y: i32) -> bool {
        self.calibration_point_start_async(x, y)
            .wait(self.request_timeout())
            .unwrap_or(false)
    }

    /// Non-blocking form of [`calibration_point_start`](Self::calibration_point_start)
    pub fn calibration_point_start_async(&self, x: i32, y: i32) -> Deferred<bool> {
        if !self.core.calibration.lock().can_sample() {
            warn!("Point start outside of a calibration run");
            return Deferred::ready(false);
        }
        let core = self.core.clone();
        self.spawn("calibration_point_start", async move {
            core.call_ok(Request::calibration_point_start(x, y), "pointstart")
                .await
        })
    }

    /// Finish sampling the current point; the last point carries the result
    pub fn calibration_point_end(&self) -> bool {
        self.calibration_point_end_async()
            .wait(self.request_timeout())
            .unwrap_or(false)
    }

    /// Non-blocking form of [`calibration_point_end`](Self::calibration_point_end)
    pub fn calibration_point_end_async(&self) -> Deferred<bool> {
        if !self.core.calibration.lock().can_sample() {
            warn!("Point end outside of a calibration run");
            return Deferred::ready(false);
        }
        let core = self.core.clone();
        self.spawn("calibration_point_end", async move {
            core.call_ok(Request::calibration_point_end(), "pointend").await
        })
    }

    /// Abort the current run; fails if no run is in progress
    pub fn calibration_abort(&self) -> bool {
        self.calibration_abort_async()
            .wait(self.request_timeout())
            .unwrap_or(false)
    }

    /// Non-blocking form of [`calibration_abort`](Self::calibration_abort)
    pub fn calibration_abort_async(&self) -> Deferred<bool> {
        if !self.is_calibrating() {
            warn!("Abort requested while not calibrating");
            return Deferred::ready(false);
        }
        let core = self.core.clone();
        self.spawn("calibration_abort", async move { core.calibration_abort().await })
    }

    /// Drop calibration flags and the stored result, then tell the server
    ///
    /// The local reset happens regardless of whether the request succeeds.
    pub fn calibration_clear(&self) -> bool {
        self.calibration_clear_async()
            .wait(self.request_timeout())
            .unwrap_or(false)
    }

    /// Non-blocking form of [`calibration_clear`](Self::calibration_clear)
    pub fn calibration_clear_async(&self) -> Deferred<bool> {
        let changed = self.core.state.write().clear_calibration();
        self.core.calibration.lock().clear();
        if changed {
            self.core
                .broadcaster
                .calibration(&self.core.listeners, false, None);
        }

        let core = self.core.clone();
        self.spawn("calibration_clear", async move {
            core.call_ok(Request::calibration_clear(), "clear").await
        })
    }

    // ---- screen ----

    /// Make `screen` the server's active screen
    ///
    /// Succeeds only if the state read back after the switch matches all
    /// five screen parameters.
    pub fn switch_screen(&self, screen: Screen) -> bool {
        self.switch_screen_async(screen)
            .wait(self.request_timeout() * 2)
            .unwrap_or(false)
    }

    /// Non-blocking form of [`switch_screen`](Self::switch_screen)
    pub fn switch_screen_async(&self, screen: Screen) -> Deferred<bool> {
        let core = self.core.clone();
        self.spawn("switch_screen", async move { core.switch_screen(screen).await })
    }

    // ---- listeners ----

    /// The five listener registries
    pub fn listeners(&self) -> &Listeners {
        &self.core.listeners
    }

    // ---- state ----

    /// Copy of the whole session state
    pub fn state(&self) -> SessionState {
        self.core.state.read().clone()
    }

    /// Whether activation completed and has not been undone
    pub fn is_activated(&self) -> bool {
        self.core.state.read().is_activated
    }

    /// Whether the transport has an open connection
    pub fn is_connected(&self) -> bool {
        self.core.transport.is_connected()
    }

    /// Whether the server reports a run or one is active locally
    pub fn is_calibrating(&self) -> bool {
        self.core.state.read().is_calibrating || self.core.calibration.lock().is_active()
    }

    /// Whether the server holds a successful calibration
    pub fn is_calibrated(&self) -> bool {
        self.core.state.read().is_calibrated
    }

    /// Last reported tracker state
    pub fn tracker_state(&self) -> TrackerState {
        self.core.state.read().tracker_state
    }

    /// Active screen, once known
    pub fn screen(&self) -> Option<Screen> {
        self.core.state.read().screen
    }

    /// Tracker frame rate
    pub fn frame_rate(&self) -> FrameRate {
        self.core.state.read().frame_rate
    }

    /// API version negotiated at activation
    pub fn version(&self) -> ApiVersion {
        self.core.state.read().version
    }

    /// Most recent calibration result, kept until cleared
    pub fn last_calibration_result(&self) -> Option<CalibrationResult> {
        self.core.state.read().last_calibration_result.clone()
    }

    /// Most recent gaze frame
    pub fn last_gaze_data(&self) -> Option<GazeData> {
        self.core.state.read().last_gaze_data.clone()
    }

    /// Heartbeat interval announced by the server, if any
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.core.state.read().heartbeat_interval
    }

    /// Whether the server pushes gaze frames without being asked
    pub fn is_push_mode(&self) -> bool {
        self.core.state.read().push_mode.unwrap_or(false)
    }

    /// Progress of the current calibration run, `sampled / total`
    pub fn calibration_progress(&self) -> f64 {
        self.core.calibration.lock().progress()
    }

    /// Transport counters, including malformed lines and write retries
    pub fn transport_stats(&self) -> TransportStats {
        self.core.transport.stats()
    }

    /// Request-queue statistics of the current connection
    pub fn queue_stats(&self) -> Option<QueueStats> {
        self.core.transport.queue_stats()
    }

    /// Configuration of the last activation
    pub fn config(&self) -> ActivationConfig {
        self.core.config.lock().clone()
    }
}

impl Default for GazeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GazeClient {
    fn drop(&mut self) {
        self.core.deactivate();
    }
}

impl std::fmt::Debug for GazeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.read();
        f.debug_struct("GazeClient")
            .field("activated", &state.is_activated)
            .field("tracker_state", &state.tracker_state)
            .field("calibrating", &state.is_calibrating)
            .field("connected", &self.core.transport.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::listeners::{ScreenStateListener, TrackerStateListener};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response(line: &str) -> Response {
        Response::from_line(line).unwrap()
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl TrackerStateListener for Counter {
        fn on_tracker_state_changed(&self, _state: TrackerState) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ScreenStateListener for Counter {
        fn on_screen_state_changed(&self, _screen: &Screen) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settle() {
        std::thread::sleep(Duration::from_millis(100));
    }

    #[test]
    fn test_new_client_is_undefined() {
        let client = GazeClient::new();
        assert!(!client.is_activated());
        assert!(!client.is_connected());
        assert_eq!(client.tracker_state(), TrackerState::Undefined);
        assert_eq!(client.frame_rate(), FrameRate::Undefined);
        assert_eq!(client.version(), ApiVersion::Undefined);
        assert!(client.screen().is_none());
    }

    #[test]
    fn test_deactivate_twice_without_activation() {
        let client = GazeClient::new();
        client.deactivate();
        client.deactivate();
        assert_eq!(client.deactivate_async().wait(Duration::ZERO), Some(()));
        assert_eq!(client.state(), SessionState::default());
    }

    #[test]
    fn test_tracker_push_updates_state_and_notifies_once() {
        let client = GazeClient::new();
        let counter = Arc::new(Counter::default());
        client.listeners().tracker_state.add(counter.clone());

        let push = response(
            r#"{"category":"tracker","request":"get","statuscode":200,"values":{"trackerstate":0,"framerate":60}}"#,
        );
        client.core.apply_response(&push);
        client.core.apply_response(&push);
        settle();

        assert_eq!(client.tracker_state(), TrackerState::Connected);
        assert_eq!(client.frame_rate(), FrameRate::Fps60);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_response_leaves_state_alone() {
        let client = GazeClient::new();
        client.core.apply_response(&response(
            r#"{"category":"tracker","request":"get","statuscode":500,"values":{"statusmessage":"boom"}}"#,
        ));
        assert_eq!(client.state(), SessionState::default());
    }

    #[test]
    fn test_calibration_ops_rejected_when_idle() {
        let client = GazeClient::new();
        assert!(!client.calibration_point_start(100, 100));
        assert!(!client.calibration_point_end());
        assert!(!client.calibration_abort());
    }

    #[test]
    fn test_calibration_start_without_connection_fails_and_resets() {
        let client = GazeClient::new();
        assert!(!client.calibration_start(9, None));
        assert!(!client.is_calibrating());

        // A fresh start is allowed again after the failure.
        assert!(client.core.calibration.lock().begin(9, None).is_ok());
    }

    #[test]
    fn test_connection_lost_resets_state() {
        let client = GazeClient::new();
        let screens = Arc::new(Counter::default());
        client.listeners().screen_state.add(screens.clone());

        client.core.state.write().is_activated = true;
        client.core.apply_response(&response(
            r#"{"category":"tracker","request":"get","statuscode":200,"values":{"screenindex":0,"screenresw":1920,"screenresh":1080,"screenpsyw":0.5,"screenpsyh":0.3}}"#,
        ));
        assert!(client.screen().is_some());

        client.core.handle_connection_lost();
        assert_eq!(client.state(), SessionState::default());
        assert_eq!(client.listeners().screen_state.count(), 1);
    }
}
