//! Listener registries and the broadcaster
//!
//! Five independent registries, one per callback shape. Broadcasting a
//! category only ever touches that category's registry, and every callback
//! runs as its own task on the worker pool behind a panic guard.

use crate::io::pool::WorkerPool;
use crate::protocol::types::{CalibrationResult, GazeData, Screen, TrackerState};
use crate::session::calibration::{CalibrationEvent, CalibrationProcessHandler};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receives every gaze frame, tracking failures included
pub trait GazeListener: Send + Sync {
    fn on_gaze_update(&self, frame: &GazeData);
}

/// Told when the calibrated flag or the stored calibration result changes
pub trait CalibrationResultListener: Send + Sync {
    fn on_calibration_changed(&self, is_calibrated: bool, result: Option<&CalibrationResult>);
}

pub trait TrackerStateListener: Send + Sync {
    fn on_tracker_state_changed(&self, state: TrackerState);
}

pub trait ScreenStateListener: Send + Sync {
    fn on_screen_state_changed(&self, screen: &Screen);
}

/// Told when the client becomes activated or loses its connection
pub trait ConnectionStateListener: Send + Sync {
    fn on_connection_state_changed(&self, connected: bool);
}

/// Duplicate-free, insertion-ordered set of listeners
///
/// Identity is the `Arc` allocation: adding the same `Arc` twice is a no-op,
/// while two separately allocated listeners are distinct even if equal.
pub struct ListenerRegistry<L: ?Sized> {
    entries: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        ListenerRegistry {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// # Returns
    /// `false` if `listener` was already registered
    pub fn add(&self, listener: Arc<L>) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|l| same(l, &listener)) {
            return false;
        }
        entries.push(listener);
        true
    }

    /// # Returns
    /// `false` if `listener` was not registered
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|l| !same(l, listener));
        entries.len() != before
    }

    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.entries.read().iter().any(|l| same(l, listener))
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current listeners, in registration order
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.read().clone()
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

fn same<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// The five registries of one client
///
/// Registrations survive reconnects; only deactivating the client clears them.
#[derive(Default)]
pub struct Listeners {
    pub gaze: ListenerRegistry<dyn GazeListener>,
    pub calibration: ListenerRegistry<dyn CalibrationResultListener>,
    pub tracker_state: ListenerRegistry<dyn TrackerStateListener>,
    pub screen_state: ListenerRegistry<dyn ScreenStateListener>,
    pub connection_state: ListenerRegistry<dyn ConnectionStateListener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_all(&self) {
        self.gaze.clear();
        self.calibration.clear();
        self.tracker_state.clear();
        self.screen_state.clear();
        self.connection_state.clear();
    }
}

type HandlerEvent = (Arc<dyn CalibrationProcessHandler>, CalibrationEvent);

/// Fans callbacks out onto the worker pool
pub struct Broadcaster {
    pool: Arc<WorkerPool>,
    calibration_lane: Mutex<Option<mpsc::UnboundedSender<HandlerEvent>>>,
}

impl Broadcaster {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Broadcaster {
            pool,
            calibration_lane: Mutex::new(None),
        }
    }

    /// Submit one task per listener in `registry`
    ///
    /// Execution order across listeners and across broadcasts is not
    /// guaranteed. A panicking listener is logged and the rest still run.
    pub fn broadcast<L, F>(&self, category: &'static str, registry: &ListenerRegistry<L>, call: F)
    where
        L: ?Sized + Send + Sync + 'static,
        F: Fn(&L) + Clone + Send + Sync + 'static,
    {
        let listeners = registry.snapshot();
        if listeners.is_empty() {
            return;
        }

        let handle = match self.pool.handle() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(category = category, error = %e, "Dropping broadcast");
                return;
            }
        };

        debug!(category = category, listeners = listeners.len(), "Broadcasting");
        for listener in listeners {
            let call = call.clone();
            handle.spawn(async move {
                guarded(category, || call(&listener));
            });
        }
    }

    pub fn gaze(&self, listeners: &Listeners, frame: GazeData) {
        let frame = Arc::new(frame);
        self.broadcast("gaze", &listeners.gaze, move |l| l.on_gaze_update(&frame));
    }

    pub fn calibration(&self, listeners: &Listeners, is_calibrated: bool, result: Option<CalibrationResult>) {
        let result = Arc::new(result);
        self.broadcast("calibration", &listeners.calibration, move |l| {
            l.on_calibration_changed(is_calibrated, (*result).as_ref())
        });
    }

    pub fn tracker_state(&self, listeners: &Listeners, state: TrackerState) {
        self.broadcast("tracker_state", &listeners.tracker_state, move |l| {
            l.on_tracker_state_changed(state)
        });
    }

    pub fn screen_state(&self, listeners: &Listeners, screen: Screen) {
        self.broadcast("screen_state", &listeners.screen_state, move |l| {
            l.on_screen_state_changed(&screen)
        });
    }

    pub fn connection_state(&self, listeners: &Listeners, connected: bool) {
        self.broadcast("connection_state", &listeners.connection_state, move |l| {
            l.on_connection_state_changed(connected)
        });
    }

    /// Deliver calibration process events to `handler`, strictly in order
    ///
    /// Events from every call share one consumer task, so progress never
    /// arrives after the result that follows it.
    pub fn calibration_events(
        &self,
        handler: Arc<dyn CalibrationProcessHandler>,
        events: Vec<CalibrationEvent>,
    ) {
        let mut lane = self.calibration_lane.lock();
        for event in events {
            let mut item = (handler.clone(), event);
            loop {
                if let Some(tx) = lane.as_ref() {
                    match tx.send(item) {
                        Ok(()) => break,
                        // Consumer died with a previous runtime.
                        Err(mpsc::error::SendError(returned)) => item = returned,
                    }
                }
                match self.start_lane() {
                    Some(tx) => *lane = Some(tx),
                    None => return,
                }
            }
        }
    }

    fn start_lane(&self) -> Option<mpsc::UnboundedSender<HandlerEvent>> {
        let handle = match self.pool.handle() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Dropping calibration events");
                return None;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<HandlerEvent>();
        handle.spawn(async move {
            while let Some((handler, event)) = rx.recv().await {
                guarded("calibration_process", || event.deliver(handler.as_ref()));
            }
        });
        Some(tx)
    }
}

fn guarded(category: &'static str, call: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(call)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(category = category, panic = %message, "Listener panicked");
    }
}
