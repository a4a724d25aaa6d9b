//! Transport session: one TCP connection and its two I/O loops
//!
//! The socket is split into owned halves. A writer task drains the
//! [`RequestQueue`], writes one JSON line per request and registers it in the
//! [`PendingTable`]. A reader task reads lines, resolves the matching pending
//! request, and hands every parsed response to a [`ResponseHandler`].
//!
//! ```text
//!  send() ──► RequestQueue ──► writer task ──► socket
//!                                  │
//!                                  └─► PendingTable ◄── reader task ◄── socket
//!                                                          │
//!                                                          └─► ResponseHandler
//! ```

use crate::error::{GazeError, Result};
use crate::io::pending::PendingTable;
use crate::io::request_queue::{QueueStats, RequestQueue};
use crate::protocol::message::{status, Response};
use crate::protocol::request::Request;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Write attempts per request before the connection is considered lost
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Receiver of everything the reader loop parses
///
/// Called on the reader task, strictly in arrival order. Implementations
/// must not block; user callbacks belong on the worker pool.
pub trait ResponseHandler: Send + Sync {
    /// Every parsed response, correlated or unsolicited
    fn on_response(&self, response: &Response);

    /// The connection dropped without [`TransportSession::close`] being called
    fn on_connection_lost(&self) {}
}

/// Transport counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Lines written to the socket
    pub lines_sent: u64,
    /// Lines read from the socket
    pub lines_received: u64,
    /// Inbound lines that were not valid response JSON
    pub malformed_lines: u64,
    /// Failed write attempts
    pub write_retries: u64,
    /// Requests released with a cancellation on close
    pub requests_cancelled: u64,
}

#[derive(Default)]
struct Counters {
    lines_sent: AtomicU64,
    lines_received: AtomicU64,
    malformed_lines: AtomicU64,
    write_retries: AtomicU64,
    requests_cancelled: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TransportStats {
        TransportStats {
            lines_sent: self.lines_sent.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            write_retries: self.write_retries.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// State of one open connection
struct Link {
    peer: String,
    queue: RequestQueue,
    pending: PendingTable,
    open: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    handler: Arc<dyn ResponseHandler>,
}

impl Link {
    fn open(
        peer: String,
        counters: Arc<Counters>,
        handler: Arc<dyn ResponseHandler>,
    ) -> (Arc<Self>, watch::Receiver<bool>) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let link = Arc::new(Link {
            peer,
            queue: RequestQueue::new(),
            pending: PendingTable::new(),
            open: AtomicBool::new(true),
            shutdown,
            tasks: Mutex::new(Vec::with_capacity(2)),
            counters,
            handler,
        });
        (link, shutdown_rx)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Tear the connection down; only the first call does anything
    fn close(&self, lost: bool) -> bool {
        if !self.open.swap(false, Ordering::SeqCst) {
            return false;
        }

        let _ = self.shutdown.send(true);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        let cancelled = self.queue.close() + self.pending.cancel_all();
        Counters::bump(&self.counters.requests_cancelled, cancelled as u64);

        if lost {
            warn!(peer = %self.peer, cancelled = cancelled, "Connection lost");
            self.handler.on_connection_lost();
        } else {
            info!(peer = %self.peer, cancelled = cancelled, "Connection closed");
        }
        true
    }

    fn dispatch_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        Counters::bump(&self.counters.lines_received, 1);
        trace!(line = line, "Received line");

        let mut response = match Response::from_line(line) {
            Ok(response) => response,
            Err(e) => {
                Counters::bump(&self.counters.malformed_lines, 1);
                warn!(error = %e, line = line, "Discarding malformed line");
                return;
            }
        };

        let in_flight = match response.id {
            0 => None,
            id => self.pending.take(id),
        };

        let Some(mut entry) = in_flight else {
            if response.id != 0 {
                debug!(id = response.id, "No pending request for id, handling as unsolicited");
            }
            self.handler.on_response(&response);
            return;
        };

        let round_trip = entry.sent_at.elapsed();
        response.round_trip = Some(round_trip);
        debug!(
            id = response.id,
            category = response.category.as_str(),
            request = response.request.as_deref().unwrap_or(""),
            status = response.status_code,
            rtt_ms = round_trip.as_millis() as u64,
            "Received response"
        );

        self.handler.on_response(&response);

        let reply = if response.is_ok() || status::is_reserved(response.status_code) {
            Ok(response)
        } else {
            Err(GazeError::Status {
                code: response.status_code,
                message: response.status_message(),
            })
        };
        entry.request.complete(reply);
    }
}

/// Client side of the line-delimited JSON connection
///
/// One `TransportSession` lives for the whole client; each successful
/// [`connect`](Self::connect) creates a fresh connection with its own queue,
/// pending table and I/O tasks. Must be used from within a Tokio runtime.
pub struct TransportSession {
    handler: Arc<dyn ResponseHandler>,
    link: Mutex<Option<Arc<Link>>>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl TransportSession {
    /// Create a disconnected session reporting to `handler`
    pub fn new(handler: Arc<dyn ResponseHandler>) -> Self {
        TransportSession {
            handler,
            link: Mutex::new(None),
            next_id: AtomicU64::new(0),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Open a connection, closing any previous one first
    ///
    /// # Returns
    /// `false` on timeout, refusal or I/O error
    pub async fn connect(&self, host: &str, port: u16, timeout: Duration) -> bool {
        match self.try_connect(host, port, timeout).await {
            Ok(()) => true,
            Err(e) => {
                warn!(host = host, port = port, error = %e, "Connect failed");
                false
            }
        }
    }

    async fn try_connect(&self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        self.close();

        let addr = format!("{}:{}", host, port);
        info!(addr = %addr, timeout_ms = timeout.as_millis() as u64, "Connecting to tracker server");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(connected) => connected?,
            Err(_) => {
                return Err(GazeError::ConnectTimeout {
                    addr,
                    timeout_ms: timeout.as_millis(),
                })
            }
        };
        stream.set_nodelay(true)?;
        let local_addr = stream.local_addr()?;
        let (reader, writer) = stream.into_split();

        let (link, shutdown_rx) = Link::open(addr.clone(), self.counters.clone(), self.handler.clone());

        let writer_task = tokio::spawn(write_loop(link.clone(), writer));
        let reader_task = tokio::spawn(read_loop(link.clone(), reader, shutdown_rx));
        link.tasks.lock().extend([writer_task, reader_task]);

        *self.link.lock() = Some(link);
        info!(local_addr = %local_addr, remote_addr = %addr, "Connected to tracker server");
        Ok(())
    }

    /// Next correlation id; never 0
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Queue a request for the writer loop
    ///
    /// The caller assigns the id. When not connected the request's waiter is
    /// released with [`GazeError::NotConnected`].
    pub fn send(&self, mut request: Request) -> Result<()> {
        let link = self.link.lock().clone();
        let link = match link {
            Some(link) if link.is_open() => link,
            _ => {
                request.complete(Err(GazeError::NotConnected));
                return Err(GazeError::NotConnected);
            }
        };

        trace!(
            id = request.id(),
            category = request.category().as_str(),
            request = request.operation(),
            "Queueing request"
        );
        link.queue.push(request).map_err(|mut rejected| {
            rejected.complete(Err(GazeError::NotConnected));
            GazeError::NotConnected
        })
    }

    /// Drop the pending entry of a request whose caller stopped waiting
    ///
    /// A late response for `id` is then handled as unsolicited.
    pub fn abandon(&self, id: u64) -> bool {
        let link = self.link.lock().clone();
        link.and_then(|link| link.pending.take(id)).is_some()
    }

    /// Stop both loops, close the socket and cancel everything outstanding
    ///
    /// Closing a session that is not connected is a no-op.
    pub fn close(&self) {
        let link = self.link.lock().take();
        if let Some(link) = link {
            link.close(false);
        }
    }

    /// Whether a connection is open and its loops are running
    pub fn is_connected(&self) -> bool {
        self.link
            .lock()
            .as_ref()
            .map_or(false, |link| link.is_open())
    }

    /// Requests written and still awaiting a response
    pub fn pending_count(&self) -> usize {
        self.link
            .lock()
            .as_ref()
            .map_or(0, |link| link.pending.len())
    }

    /// Queue statistics of the current connection
    pub fn queue_stats(&self) -> Option<QueueStats> {
        self.link.lock().as_ref().map(|link| link.queue.stats())
    }

    /// Counters accumulated over the session's lifetime
    pub fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Write the rest of `line` starting at `*written`
///
/// `*written` advances with every accepted chunk, so a retry after a failed
/// attempt resumes where the previous one stopped instead of resending bytes
/// the peer already has.
async fn write_line<W>(writer: &mut W, line: &[u8], written: &mut usize) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while *written < line.len() {
        let n = writer.write(&line[*written..]).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        *written += n;
    }
    writer.flush().await
}

async fn write_loop<W>(link: Arc<Link>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut request) = link.queue.pop().await {
        if request.cancelled {
            continue;
        }

        let line = match request.to_line() {
            Ok(mut line) => {
                line.push('\n');
                line
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode request");
                request.complete(Err(e));
                continue;
            }
        };

        let id = request.id();
        // Registered before writing so a fast reply always finds its entry.
        let mut unregistered = None;
        if request.has_id() {
            if let Err(mut duplicate) = link.pending.insert(request) {
                duplicate.complete(Err(GazeError::InvalidState(format!(
                    "request id {} already in flight",
                    id
                ))));
                continue;
            }
        } else {
            unregistered = Some(request);
        }

        let mut attempts = 0;
        let mut written = 0;
        loop {
            attempts += 1;
            match write_line(&mut writer, line.as_bytes(), &mut written).await {
                Ok(()) => {
                    Counters::bump(&link.counters.lines_sent, 1);
                    if id != 0 {
                        link.pending.mark_sent(id);
                    }
                    trace!(id = id, bytes = line.len(), "Request written");
                    break;
                }
                Err(e) => {
                    Counters::bump(&link.counters.write_retries, 1);
                    warn!(
                        id = id,
                        attempt = attempts,
                        written = written,
                        bytes = line.len(),
                        error = %e,
                        "Write failed"
                    );

                    if attempts >= MAX_WRITE_ATTEMPTS {
                        let failed = match id {
                            0 => unregistered.take(),
                            _ => link.pending.take(id).map(|entry| entry.request),
                        };
                        if let Some(mut failed) = failed {
                            failed.retries = attempts;
                            failed.complete(Err(GazeError::WriteFailed { attempts }));
                        }
                        link.close(true);
                        return;
                    }
                }
            }
        }
    }
    debug!(peer = %link.peer, "Writer loop stopped");
}

async fn read_loop(link: Arc<Link>, reader: OwnedReadHalf, mut shutdown: watch::Receiver<bool>) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => break,
            next = lines.next_line() => next,
        };

        match next {
            Ok(Some(line)) => link.dispatch_line(&line),
            Ok(None) => {
                if link.is_open() {
                    info!(peer = %link.peer, "Server closed the connection");
                    link.close(true);
                }
                break;
            }
            Err(e) => {
                if link.is_open() {
                    warn!(peer = %link.peer, error = %e, "Read failed");
                    link.close(true);
                }
                break;
            }
        }
    }
    debug!(peer = %link.peer, "Reader loop stopped");
}
