//! Gaze monitor example
//!
//! Activates a session against a running tracker server, prints state
//! changes and a gaze sample every few frames, then deactivates.
//!
//! Usage:
//!   cargo run --example gaze_monitor [host] [port] [seconds]
//!
//! Set `RUST_LOG=gazelink=debug` to see request/response traffic.

use gazelink::io::ActivationConfig;
use gazelink::protocol::types::{GazeData, Screen, TrackerState};
use gazelink::session::{
    ConnectionStateListener, GazeListener, ScreenStateListener, TrackerStateListener,
};
use gazelink::GazeClient;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Prints every 30th frame and counts failures
#[derive(Default)]
struct Monitor {
    frames: AtomicU64,
    failed: AtomicU64,
}

impl GazeListener for Monitor {
    fn on_gaze_update(&self, frame: &GazeData) {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if frame.is_tracking_fail() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if n % 30 == 0 {
            println!(
                "[gaze] #{:<6} x={:7.1} y={:7.1} fixated={} state={:#04x}",
                n,
                frame.smoothed_coordinates.x,
                frame.smoothed_coordinates.y,
                frame.is_fixated,
                frame.state
            );
        }
    }
}

impl TrackerStateListener for Monitor {
    fn on_tracker_state_changed(&self, state: TrackerState) {
        println!("[tracker] {:?}", state);
    }
}

impl ScreenStateListener for Monitor {
    fn on_screen_state_changed(&self, screen: &Screen) {
        println!(
            "[screen] #{} {}x{} px, {:.2}x{:.2} m",
            screen.index,
            screen.resolution_width,
            screen.resolution_height,
            screen.physical_width,
            screen.physical_height
        );
    }
}

impl ConnectionStateListener for Monitor {
    fn on_connection_state_changed(&self, connected: bool) {
        println!("[connection] {}", if connected { "up" } else { "down" });
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gazelink=info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).cloned().unwrap_or_else(|| "localhost".to_string());
    let port: u16 = args.get(2).map(|p| p.parse()).transpose()?.unwrap_or(6555);
    let seconds: u64 = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(10);

    println!("=== Gaze Monitor ===\n");

    let client = GazeClient::new();
    let monitor = Arc::new(Monitor::default());
    client.listeners().gaze.add(monitor.clone());
    client.listeners().tracker_state.add(monitor.clone());
    client.listeners().screen_state.add(monitor.clone());
    client.listeners().connection_state.add(monitor.clone());

    let config = ActivationConfig::with_endpoint(host, port)
        .with_timeout(Duration::from_secs(9))
        .with_retries(3);
    println!("Connecting to {} ...", config.addr());

    if !client.activate_with(config) {
        eprintln!("Tracker server not reachable");
        return Ok(());
    }

    println!(
        "Activated: version {:?}, {:?}, calibrated={}\n",
        client.version(),
        client.frame_rate(),
        client.is_calibrated()
    );

    std::thread::sleep(Duration::from_secs(seconds));

    let stats = client.transport_stats();
    println!(
        "\n{} frames ({} tracking failures), {} lines in, {} lines out, {} malformed",
        monitor.frames.load(Ordering::Relaxed),
        monitor.failed.load(Ordering::Relaxed),
        stats.lines_received,
        stats.lines_sent,
        stats.malformed_lines
    );

    client.deactivate();
    Ok(())
}
