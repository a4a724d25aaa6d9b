//! Outbound request with its correlation and delivery state
//!
//! A [`Request`] wraps the wire [`RequestFrame`] together with the control
//! fields the transport needs: a cancellation flag, a write-retry counter,
//! and an optional one-shot wait-handle resolved exactly once with the
//! correlated [`Response`] or an error.

use crate::error::{GazeError, Result};
use crate::protocol::message::{keys, op, Category, RequestFrame, Response};
use crate::protocol::types::{ApiVersion, Screen};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Outcome delivered through a request's wait-handle
pub type Reply = Result<Response>;

/// Receiving side of a request's wait-handle
pub type ReplyReceiver = oneshot::Receiver<Reply>;

/// A request queued for the writer loop
#[derive(Debug)]
pub struct Request {
    pub frame: RequestFrame,
    /// Set once the request has been abandoned; the writer skips it
    pub cancelled: bool,
    /// Failed write attempts so far
    pub retries: u32,
    waiter: Option<oneshot::Sender<Reply>>,
}

impl Request {
    pub fn new(category: Category, request: Option<&str>, values: Option<Value>) -> Self {
        Request {
            frame: RequestFrame::new(category, request, values),
            cancelled: false,
            retries: 0,
            waiter: None,
        }
    }

    /// Tracker `get` for the given keys
    pub fn tracker_get(keys: &[&str]) -> Self {
        Self::new(Category::Tracker, Some(op::GET), Some(json!(keys)))
    }

    /// Tracker `set` with raw values
    pub fn tracker_set(values: Value) -> Self {
        Self::new(Category::Tracker, Some(op::SET), Some(values))
    }

    /// Handshake: declare the API version and enable push mode
    pub fn handshake(version: ApiVersion) -> Self {
        Self::tracker_set(json!({
            (keys::VERSION): version.number().unwrap_or(1),
            (keys::PUSH): true,
        }))
    }

    /// Switch the server's active screen
    pub fn switch_screen(screen: &Screen) -> Self {
        Self::tracker_set(json!({
            (keys::SCREEN_INDEX): screen.index,
            (keys::SCREEN_RESOLUTION_WIDTH): screen.resolution_width,
            (keys::SCREEN_RESOLUTION_HEIGHT): screen.resolution_height,
            (keys::SCREEN_PHYSICAL_WIDTH): screen.physical_width,
            (keys::SCREEN_PHYSICAL_HEIGHT): screen.physical_height,
        }))
    }

    pub fn calibration_start(point_count: usize) -> Self {
        Self::new(
            Category::Calibration,
            Some(op::START),
            Some(json!({ (keys::POINT_COUNT): point_count })),
        )
    }

    pub fn calibration_point_start(x: i32, y: i32) -> Self {
        Self::new(
            Category::Calibration,
            Some(op::POINT_START),
            Some(json!({ "x": x, "y": y })),
        )
    }

    pub fn calibration_point_end() -> Self {
        Self::new(Category::Calibration, Some(op::POINT_END), None)
    }

    pub fn calibration_abort() -> Self {
        Self::new(Category::Calibration, Some(op::ABORT), None)
    }

    pub fn calibration_clear() -> Self {
        Self::new(Category::Calibration, Some(op::CLEAR), None)
    }

    pub fn heartbeat() -> Self {
        Self::new(Category::Heartbeat, None, None)
    }

    /// Assign the correlation id
    pub fn with_id(mut self, id: u64) -> Self {
        self.frame.id = id;
        self
    }

    pub fn id(&self) -> u64 {
        self.frame.id
    }

    /// Requests with an assigned id are written before bare notifications
    pub fn has_id(&self) -> bool {
        self.frame.id != 0
    }

    pub fn category(&self) -> Category {
        self.frame.category
    }

    pub fn operation(&self) -> &str {
        self.frame.request.as_deref().unwrap_or("")
    }

    /// Attach a wait-handle, replacing any previous one
    pub fn attach_waiter(&mut self) -> ReplyReceiver {
        let (tx, rx) = oneshot::channel();
        self.waiter = Some(tx);
        rx
    }

    pub fn has_waiter(&self) -> bool {
        self.waiter.is_some()
    }

    /// Resolve the wait-handle; later calls are no-ops
    pub fn complete(&mut self, reply: Reply) {
        if let Some(waiter) = self.waiter.take() {
            // Receiver may have timed out and gone away.
            let _ = waiter.send(reply);
        }
    }

    /// Mark as cancelled and release any waiter with [`GazeError::Cancelled`]
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.complete(Err(GazeError::Cancelled));
    }

    pub fn to_line(&self) -> Result<String> {
        self.frame.to_line()
    }
}
