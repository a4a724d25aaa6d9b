//! Transport session tests: correlation, ordering, and teardown

mod common;

use common::MockServer;
use gazelink::io::{ResponseHandler, TransportSession};
use gazelink::protocol::{Category, Request, Response};
use gazelink::GazeError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Collector {
    responses: Mutex<Vec<Response>>,
}

impl ResponseHandler for Collector {
    fn on_response(&self, response: &Response) {
        self.responses.lock().push(response.clone());
    }
}

async fn connected(server: &MockServer) -> (TransportSession, Arc<Collector>) {
    let collector = Arc::new(Collector::default());
    let transport = TransportSession::new(collector.clone());
    assert!(
        transport
            .connect("127.0.0.1", server.port, Duration::from_secs(1))
            .await
    );
    (transport, collector)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_each_reply_reaches_its_caller() {
    let (server, _tracker) = MockServer::tracker();
    let (transport, _collector) = connected(&server).await;

    let mut waiters = Vec::new();
    let key_sets: [&[&str]; 3] = [&["trackerstate"], &["framerate"], &["screenresw", "screenresh"]];
    for keys in key_sets {
        let id = transport.next_request_id();
        let mut request = Request::tracker_get(keys).with_id(id);
        waiters.push((id, keys, request.attach_waiter()));
        transport.send(request).unwrap();
    }

    for (id, keys, waiter) in waiters {
        let response = waiter.await.unwrap().unwrap();
        assert_eq!(response.id, id);
        let returned: Vec<&String> = response.values.as_object().unwrap().keys().collect();
        assert_eq!(returned.len(), keys.len());
    }
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_releases_all_pending_callers() {
    let server = MockServer::silent();
    let (transport, _collector) = connected(&server).await;

    let mut waiters = Vec::new();
    for _ in 0..8 {
        let mut request = Request::calibration_abort().with_id(transport.next_request_id());
        waiters.push(request.attach_waiter());
        transport.send(request).unwrap();
    }
    common::eventually(|| server.requests().len() == 8);

    let started = Instant::now();
    transport.close();

    for waiter in waiters {
        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("caller still blocked after close");
        assert!(matches!(outcome, Ok(Err(GazeError::Cancelled))));
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(transport.stats().requests_cancelled, 8);
    assert!(!transport.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failure_status_completes_caller_with_error() {
    let (server, _tracker) = MockServer::tracker();
    let (transport, collector) = connected(&server).await;

    let mut request = Request::new(Category::Tracker, Some("bogus"), None)
        .with_id(transport.next_request_id());
    let waiter = request.attach_waiter();
    transport.send(request).unwrap();

    match waiter.await.unwrap() {
        Err(GazeError::Status { code, message }) => {
            assert_eq!(code, 400);
            assert_eq!(message, "unknown request");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    // The handler still saw the failure.
    assert_eq!(collector.responses.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsolicited_push_reaches_handler() {
    let (server, _tracker) = MockServer::tracker();
    let (transport, collector) = connected(&server).await;
    assert!(common::eventually(|| server.accepted() == 1));

    server.push(serde_json::json!({
        "category": "tracker",
        "request": "get",
        "statuscode": 200,
        "values": {"frame": {"state": 7, "time": 12}},
    }));

    for _ in 0..100 {
        if !collector.responses.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let responses = collector.responses.lock();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].id, 0);
    assert!(transport.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_replaces_connection() {
    let (server, _tracker) = MockServer::tracker();
    let (transport, _collector) = connected(&server).await;

    assert!(
        transport
            .connect("127.0.0.1", server.port, Duration::from_secs(1))
            .await
    );
    assert!(transport.is_connected());
    assert!(common::eventually(|| server.accepted() == 2));

    let mut request = Request::heartbeat().with_id(transport.next_request_id());
    let waiter = request.attach_waiter();
    transport.send(request).unwrap();
    assert!(waiter.await.unwrap().is_ok());
}
