//! In-process tracker server for integration tests
//!
//! A std `TcpListener` on a background thread. Every accepted connection gets
//! a reader thread that records each request line and answers it through a
//! scripted responder. Tests can also push unsolicited lines to the most
//! recent connection.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

pub struct MockServer {
    pub port: u16,
    accepted: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
    connection: Arc<Mutex<Option<TcpStream>>>,
}

impl MockServer {
    pub fn start(responder: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connection = Arc::new(Mutex::new(None));

        let server = MockServer {
            port,
            accepted: accepted.clone(),
            requests: requests.clone(),
            connection: connection.clone(),
        };

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                *connection.lock() = stream.try_clone().ok();
                accepted.fetch_add(1, Ordering::SeqCst);

                let responder = responder.clone();
                let requests = requests.clone();
                std::thread::spawn(move || serve(stream, responder, requests));
            }
        });

        server
    }

    /// Server that answers like a healthy tracker
    pub fn tracker() -> (Self, Arc<Tracker>) {
        let tracker = Arc::new(Tracker::default());
        let responder = tracker.clone();
        let server = Self::start(Arc::new(move |request| responder.respond(request)));
        (server, tracker)
    }

    /// Server that accepts connections and never answers
    pub fn silent() -> Self {
        Self::start(Arc::new(|_| None))
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, category: &str, request: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r["category"] == category && r["request"] == request)
            .collect()
    }

    /// Write an unsolicited line to the latest connection
    pub fn push(&self, line: Value) {
        if let Some(stream) = self.connection.lock().as_mut() {
            writeln!(stream, "{}", line).unwrap();
        }
    }

    /// Close the latest connection from the server side
    pub fn disconnect(&self) {
        if let Some(stream) = self.connection.lock().take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

fn serve(stream: TcpStream, responder: Responder, requests: Arc<Mutex<Vec<Value>>>) {
    let Ok(mut writer) = stream.try_clone() else { return };
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        let Ok(request) = serde_json::from_str::<Value>(&line) else { continue };
        requests.lock().push(request.clone());

        if let Some(reply) = responder(&request) {
            if writeln!(writer, "{}", reply).is_err() {
                break;
            }
        }
    }
}

/// Reply frame for `request` with the given status and values
pub fn reply(request: &Value, status: u16, values: Value) -> Value {
    let mut reply = json!({
        "category": request["category"],
        "statuscode": status,
        "values": values,
    });
    if let Some(op) = request.get("request") {
        reply["request"] = op.clone();
    }
    if let Some(id) = request.get("id").filter(|id| id.as_u64() != Some(0)) {
        reply["id"] = id.clone();
    }
    reply
}

/// Scripted tracker: keeps a key/value state and runs calibrations
pub struct Tracker {
    pub values: Mutex<Map<String, Value>>,
    /// Whether screen `set` requests are applied
    pub accepts_screen_switch: Mutex<bool>,
    /// Outcome reported at the end of a calibration run
    pub calibration_succeeds: Mutex<bool>,
    calibration: Mutex<(usize, usize)>,
}

impl Default for Tracker {
    fn default() -> Self {
        let values = json!({
            "push": true,
            "heartbeatinterval": 3000,
            "version": 1,
            "trackerstate": 0,
            "framerate": 30,
            "iscalibrated": false,
            "iscalibrating": false,
            "screenindex": 0,
            "screenresw": 1920,
            "screenresh": 1080,
            "screenpsyw": 0.51,
            "screenpsyh": 0.29,
        });
        let Value::Object(values) = values else { unreachable!() };

        Tracker {
            values: Mutex::new(values),
            accepts_screen_switch: Mutex::new(true),
            calibration_succeeds: Mutex::new(true),
            calibration: Mutex::new((0, 0)),
        }
    }
}

impl Tracker {
    pub fn respond(&self, request: &Value) -> Option<Value> {
        let category = request["category"].as_str().unwrap_or_default();
        let op = request["request"].as_str().unwrap_or_default();

        match (category, op) {
            ("heartbeat", _) => Some(reply(request, 200, Value::Null)),
            ("tracker", "get") => {
                let values = self.values.lock();
                let mut out = Map::new();
                for key in request["values"].as_array().into_iter().flatten() {
                    let Some(key) = key.as_str() else { continue };
                    if let Some(value) = values.get(key) {
                        out.insert(key.to_string(), value.clone());
                    }
                }
                Some(reply(request, 200, Value::Object(out)))
            }
            ("tracker", "set") => {
                let mut values = self.values.lock();
                if let Some(set) = request["values"].as_object() {
                    for (key, value) in set {
                        if key.starts_with("screen") && !*self.accepts_screen_switch.lock() {
                            continue;
                        }
                        values.insert(key.clone(), value.clone());
                    }
                }
                Some(reply(request, 200, json!({})))
            }
            ("calibration", "start") => {
                let total = request["values"]["pointcount"].as_u64().unwrap_or(0) as usize;
                *self.calibration.lock() = (total, 0);
                self.values.lock().insert("iscalibrating".into(), json!(true));
                Some(reply(request, 200, json!({})))
            }
            ("calibration", "pointstart") => Some(reply(request, 200, json!({}))),
            ("calibration", "pointend") => {
                let mut calibration = self.calibration.lock();
                calibration.1 += 1;
                if calibration.1 < calibration.0 {
                    return Some(reply(request, 200, json!({})));
                }

                let success = *self.calibration_succeeds.lock();
                let result = calibration_result(calibration.0, success);
                let mut values = self.values.lock();
                values.insert("iscalibrated".into(), json!(success));
                values.insert("iscalibrating".into(), json!(!success));
                values.insert("calibresult".into(), result.clone());
                Some(reply(request, 200, json!({ "calibresult": result })))
            }
            ("calibration", "abort") => {
                self.values.lock().insert("iscalibrating".into(), json!(false));
                Some(reply(request, 200, json!({})))
            }
            ("calibration", "clear") => {
                let mut values = self.values.lock();
                values.insert("iscalibrated".into(), json!(false));
                values.remove("calibresult");
                Some(reply(request, 200, json!({})))
            }
            _ => Some(reply(
                request,
                400,
                json!({ "statusmessage": "unknown request" }),
            )),
        }
    }
}

/// `calibresult` for `points` points laid out on a grid; on failure the
/// first two points are flagged for resampling
pub fn calibration_result(points: usize, success: bool) -> Value {
    let calibpoints: Vec<Value> = (0..points)
        .map(|i| {
            let state = if !success && i < 2 { 1 } else { 2 };
            json!({
                "state": state,
                "cp": { "x": 160.0 + 800.0 * (i % 3) as f64, "y": 120.0 + 420.0 * (i / 3) as f64 },
                "mecp": { "x": 161.5 + 800.0 * (i % 3) as f64, "y": 118.0 + 420.0 * (i / 3) as f64 },
                "acd": { "ad": 0.41, "adl": 0.44, "adr": 0.39 },
                "mepix": { "mep": 12.0, "mepl": 13.0, "mepr": 11.0 },
                "asdp": { "asd": 4.2, "asdl": 4.5, "asdr": 3.9 },
            })
        })
        .collect();

    json!({
        "result": success,
        "deg": 0.41,
        "degl": 0.44,
        "degr": 0.39,
        "calibpoints": calibpoints,
    })
}

/// Poll `done` until it holds or two seconds pass
pub fn eventually(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

/// Port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
