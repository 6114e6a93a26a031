//! Connection lifecycle tracking and the socket idle watchdog.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track open connections for graceful shutdown
//! - Record I/O activity and in-flight requests per connection
//! - Serve one connection with hyper, closing it when a request stalls
//!
//! # Design Decisions
//! - The watchdog only closes connections with an unfinished request; idle
//!   keep-alive connections are left to the client
//! - Closing means dropping the hyper connection; handler work already
//!   started is not cancelled by the gateway

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower::ServiceExt;

use crate::http::request::ConnectionMeta;
use crate::observability::metrics;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks open connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_for_drain(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Last I/O time and in-flight request count of one connection.
#[derive(Debug)]
pub struct Activity {
    origin: Instant,
    last_io_ms: AtomicU64,
    in_flight: AtomicUsize,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_io_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn touch(&self) {
        let now = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_io_ms.store(now, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_io_ms.load(Ordering::Relaxed));
        self.origin.elapsed().saturating_sub(last)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark a request as started until the guard drops.
    pub fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.touch();
        InFlightGuard {
            activity: Arc::clone(self),
        }
    }

    /// Resolves once a request is in flight and no I/O happened for `timeout`.
    pub async fn stalled(&self, timeout: Duration) {
        loop {
            let idle = self.idle_for();
            if self.in_flight() > 0 && idle >= timeout {
                return;
            }
            let wait = if self.in_flight() > 0 {
                timeout - idle
            } else {
                timeout
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    activity: Arc<Activity>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.activity.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.activity.touch();
    }
}

/// An I/O stream that records activity on every successful read or write.
pub struct ActivityStream<S> {
    inner: S,
    activity: Arc<Activity>,
}

impl<S> ActivityStream<S> {
    pub fn new(inner: S, activity: Arc<Activity>) -> Self {
        Self { inner, activity }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ActivityStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            self.activity.touch();
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ActivityStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if matches!(poll, Poll::Ready(Ok(n)) if n > 0) {
            self.activity.touch();
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Serve HTTP/1 and HTTP/2 on one accepted stream until it closes, stalls
/// past `idle_timeout`, or shutdown drains it.
pub async fn serve_connection<S>(
    stream: S,
    router: Router,
    meta: ConnectionMeta,
    idle_timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let activity = Arc::new(Activity::new());
    let io = TokioIo::new(ActivityStream::new(stream, Arc::clone(&activity)));

    let service_activity = Arc::clone(&activity);
    let service_meta = meta.clone();
    let service = tower::service_fn(move |mut request: Request<Incoming>| {
        let router = router.clone();
        let activity = Arc::clone(&service_activity);
        request.extensions_mut().insert(service_meta.clone());
        async move {
            let _in_flight = activity.begin_request();
            router.oneshot(request).await
        }
    });

    let builder = Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection_with_upgrades(io, TowerToHyperService::new(service));
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = meta.connection_id, error = %e, "Connection error");
                }
                break;
            }
            _ = activity.stalled(idle_timeout) => {
                tracing::warn!(
                    connection_id = meta.connection_id,
                    peer = ?meta.peer,
                    timeout_secs = idle_timeout.as_secs(),
                    "Closing idle connection with unfinished request"
                );
                metrics::record_socket_timeout();
                break;
            }
            _ = shutdown.recv(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_without_request_never_stalls() {
        let activity = Arc::new(Activity::new());
        let stalled = tokio::time::timeout(Duration::from_secs(600), activity.stalled(Duration::from_secs(120)));
        assert!(stalled.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unfinished_request_stalls_after_timeout() {
        let activity = Arc::new(Activity::new());
        let _request = activity.begin_request();
        let start = Instant::now();
        activity.stalled(Duration::from_secs(120)).await;
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(start.elapsed() < Duration::from_secs(121));
    }

    #[tokio::test(start_paused = true)]
    async fn io_pushes_the_deadline_back() {
        let activity = Arc::new(Activity::new());
        let _request = activity.begin_request();
        let start = Instant::now();

        let watcher = {
            let activity = Arc::clone(&activity);
            tokio::spawn(async move { activity.stalled(Duration::from_secs(10)).await })
        };
        tokio::time::sleep(Duration::from_secs(8)).await;
        activity.touch();
        watcher.await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(18));
    }

    fn serve_hanging(
        idle_timeout: Duration,
    ) -> (tokio::io::DuplexStream, tokio::task::JoinHandle<()>, broadcast::Sender<()>) {
        let (client, server) = tokio::io::duplex(4096);
        let router = Router::new().route(
            "/",
            axum::routing::get(|| std::future::pending::<&'static str>()),
        );
        let meta = ConnectionMeta {
            peer: None,
            transport: crate::http::request::Transport::Insecure,
            connection_id: 7,
        };
        let (shutdown, rx) = broadcast::channel(1);
        let task = tokio::spawn(serve_connection(server, router, meta, idle_timeout, rx));
        (client, task, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_closes_connection_at_idle_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut client, task, _shutdown) = serve_hanging(Duration::from_secs(120));
        client
            .write_all(b"GET / HTTP/1.1\r\nhost: gateway.test\r\n\r\n")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(!task.is_finished());

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("connection should close once the request stalls")
            .unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_keep_alive_connection_stays_open() {
        let (client, task, _shutdown) = serve_hanging(Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(!task.is_finished());
        drop(client);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_request_clears_in_flight() {
        let activity = Arc::new(Activity::new());
        drop(activity.begin_request());
        assert_eq!(activity.in_flight(), 0);
    }
}
