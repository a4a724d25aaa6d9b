//! Outbound request queue feeding the writer loop
//!
//! Two FIFO tiers: requests carrying a correlation id go out before bare
//! notifications (id 0). Within a tier, submission order is kept.

use crate::protocol::request::Request;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// Statistics for the request queue
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Total requests enqueued
    pub enqueued: u64,
    /// Total requests handed to the writer
    pub dequeued: u64,
    /// Total requests discarded by [`RequestQueue::clear`]
    pub cleared: u64,
    /// Current queue size
    pub current_size: usize,
    /// Peak queue size
    pub peak_size: usize,
}

#[derive(Default)]
struct Tiers {
    priority: VecDeque<Request>,
    normal: VecDeque<Request>,
    closed: bool,
    stats: QueueStats,
}

impl Tiers {
    fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }
}

/// Request queue shared by callers and the writer loop
pub struct RequestQueue {
    tiers: Mutex<Tiers>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            tiers: Mutex::new(Tiers::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue a request (non-blocking)
    ///
    /// # Returns
    /// `Err(request)` with the request handed back if the queue is closed
    pub fn push(&self, request: Request) -> std::result::Result<(), Request> {
        {
            let mut tiers = self.tiers.lock();
            if tiers.closed {
                return Err(request);
            }

            if request.has_id() {
                tiers.priority.push_back(request);
            } else {
                tiers.normal.push_back(request);
            }

            let size = tiers.len();
            tiers.stats.enqueued += 1;
            tiers.stats.current_size = size;
            if size > tiers.stats.peak_size {
                tiers.stats.peak_size = size;
            }
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Take the next request without waiting
    pub fn try_pop(&self) -> Option<Request> {
        let mut tiers = self.tiers.lock();
        let request = match tiers.priority.pop_front() {
            Some(request) => Some(request),
            None => tiers.normal.pop_front(),
        };

        if request.is_some() {
            tiers.stats.dequeued += 1;
            tiers.stats.current_size = tiers.len();
        }
        request
    }

    /// Dequeue the next request, waiting while the queue is empty
    ///
    /// # Returns
    /// `None` once the queue has been closed
    pub async fn pop(&self) -> Option<Request> {
        loop {
            let notified = self.notify.notified();

            if let Some(request) = self.try_pop() {
                return Some(request);
            }
            if self.tiers.lock().closed {
                return None;
            }

            notified.await;
        }
    }

    /// Cancel and drop every queued request
    ///
    /// # Returns
    /// Number of requests discarded
    pub fn clear(&self) -> usize {
        let drained: Vec<Request> = {
            let mut tiers = self.tiers.lock();
            let mut drained: Vec<Request> = tiers.priority.drain(..).collect();
            drained.extend(tiers.normal.drain(..));
            tiers.stats.cleared += drained.len() as u64;
            tiers.stats.current_size = 0;
            drained
        };

        let count = drained.len();
        for mut request in drained {
            request.cancel();
        }
        count
    }

    /// Close the queue, cancel what is left, and wake the writer
    pub fn close(&self) -> usize {
        self.tiers.lock().closed = true;
        let cleared = self.clear();
        self.notify.notify_waiters();
        cleared
    }

    pub fn is_closed(&self) -> bool {
        self.tiers.lock().closed
    }

    pub fn size(&self) -> usize {
        self.tiers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn stats(&self) -> QueueStats {
        self.tiers.lock().stats.clone()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GazeError;
    use std::sync::Arc;

    fn ids(queue: &RequestQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.try_pop()).map(|r| r.id()).collect()
    }

    #[test]
    fn test_id_requests_before_notifications() {
        let queue = RequestQueue::new();

        queue.push(Request::heartbeat()).unwrap();
        queue.push(Request::tracker_get(&["push"]).with_id(1)).unwrap();
        queue.push(Request::heartbeat()).unwrap();
        queue.push(Request::tracker_get(&["push"]).with_id(2)).unwrap();
        queue.push(Request::tracker_get(&["push"]).with_id(3)).unwrap();

        assert_eq!(ids(&queue), vec![1, 2, 3, 0, 0]);
    }

    #[test]
    fn test_submission_order_within_tier() {
        let queue = RequestQueue::new();
        for id in 1..=50 {
            queue.push(Request::calibration_point_end().with_id(id)).unwrap();
        }
        assert_eq!(ids(&queue), (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn test_clear_cancels_waiters() {
        let queue = RequestQueue::new();
        let mut request = Request::calibration_abort().with_id(9);
        let mut rx = request.attach_waiter();
        queue.push(request).unwrap();
        queue.push(Request::heartbeat()).unwrap();

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(matches!(rx.try_recv(), Ok(Err(GazeError::Cancelled))));

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.cleared, 2);
        assert_eq!(stats.peak_size, 2);
    }

    #[test]
    fn test_push_after_close_is_rejected() {
        let queue = RequestQueue::new();
        queue.close();

        let rejected = queue.push(Request::heartbeat().with_id(4));
        assert_eq!(rejected.unwrap_err().id(), 4);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(RequestQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await.map(|r| r.id()) })
        };

        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        queue.push(Request::heartbeat().with_id(77)).unwrap();

        assert_eq!(consumer.await.unwrap(), Some(77));
    }

    #[tokio::test]
    async fn test_close_wakes_pop() {
        let queue = Arc::new(RequestQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await.is_none() })
        };

        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        queue.close();

        assert!(consumer.await.unwrap());
    }
}
