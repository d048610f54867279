//! Drives real readers against a local sliding-window HLS server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use hlsprobe_engine::{DownloaderConfig, ProbeConfig, Reader, ReaderState};
use parking_lot::Mutex;
use tokio::net::TcpListener;

const SEGMENT_MS: u64 = 400;
const WINDOW: u64 = 3;
const SEGMENT_BYTES: usize = 16 * 1024;

struct LiveServer {
    started: Instant,
    manifest_requests: AtomicUsize,
    segment_requests: Mutex<HashMap<String, usize>>,
    segment_queries: AtomicUsize,
}

impl LiveServer {
    fn playlist(&self) -> String {
        let head = self.started.elapsed().as_millis() as u64 / SEGMENT_MS;
        let first = head.saturating_sub(WINDOW - 1);
        let secs = SEGMENT_MS as f64 / 1000.0;

        let mut body = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:1\n#EXT-X-MEDIA-SEQUENCE:{first}\n"
        );
        for seq in first..=head {
            body.push_str(&format!("#EXTINF:{secs:.3},\nseg/{seq}.ts\n"));
        }
        body
    }
}

async fn manifest(State(server): State<Arc<LiveServer>>) -> impl IntoResponse {
    server.manifest_requests.fetch_add(1, Ordering::SeqCst);
    server.playlist()
}

async fn segment(
    State(server): State<Arc<LiveServer>>,
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    if query.is_some() {
        server.segment_queries.fetch_add(1, Ordering::SeqCst);
    }
    *server.segment_requests.lock().entry(name).or_default() += 1;
    vec![0x47u8; SEGMENT_BYTES]
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable")
}

async fn spawn_server() -> (SocketAddr, Arc<LiveServer>) {
    let server = Arc::new(LiveServer {
        started: Instant::now(),
        manifest_requests: AtomicUsize::new(0),
        segment_requests: Mutex::new(HashMap::new()),
        segment_queries: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/live/index.m3u8", get(manifest))
        .route("/live/seg/{name}", get(segment))
        .route("/broken/index.m3u8", get(broken))
        .with_state(Arc::clone(&server));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, server)
}

fn config() -> ProbeConfig {
    ProbeConfig {
        downloader: DownloaderConfig {
            use_system_proxy: false,
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
        manifest_retry_delay: Duration::from_millis(50),
        ..Default::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reader_follows_sliding_window() {
    init_tracing();
    let (addr, server) = spawn_server().await;
    let url = format!("http://{addr}/live/index.m3u8?token=secret&e=1634068066");

    let reader = Reader::new(0, &url, Arc::new(config())).unwrap();
    reader.start();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    reader.stop();
    reader.wait().await;
    assert!(reader.wait_for_downloads(Duration::from_secs(5)).await);
    assert_eq!(reader.state(), ReaderState::Stopped);

    let requests = server.segment_requests.lock().clone();
    // The window moved on several times and every segment was fetched once.
    assert!(requests.len() > WINDOW as usize, "requested {requests:?}");
    assert!(requests.values().all(|&count| count == 1), "requested {requests:?}");
    // Manifest access tokens are not forwarded to segments.
    assert_eq!(server.segment_queries.load(Ordering::SeqCst), 0);

    let stats = reader.stats();
    let manifest_requests = server.manifest_requests.load(Ordering::SeqCst) as u64;
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.connections, manifest_requests + requests.len() as u64);
    assert!(stats.bytes_received >= requests.len() as u64 * SEGMENT_BYTES as u64);
    assert!(reader.report().bitrate_mbps.is_some());
    // The window never holds more than what the latest manifest listed.
    assert!(reader.segments().len() <= WINDOW as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_are_independent() {
    init_tracing();
    let (addr, _server) = spawn_server().await;
    let good = format!("http://{addr}/live/index.m3u8");
    let bad = format!("http://{addr}/broken/index.m3u8");
    let config = Arc::new(config());

    let readers = [
        Reader::new(0, &good, Arc::clone(&config)).unwrap(),
        Reader::new(1, &bad, Arc::clone(&config)).unwrap(),
    ];
    for reader in &readers {
        reader.start();
    }
    tokio::time::sleep(Duration::from_millis(1000)).await;
    for reader in &readers {
        reader.stop();
        reader.wait().await;
        reader.wait_for_downloads(Duration::from_secs(5)).await;
    }

    let good_stats = readers[0].stats();
    assert_eq!(good_stats.errors, 0);
    assert!(good_stats.connections > 1);

    let bad_stats = readers[1].stats();
    assert!(bad_stats.errors > 1);
    assert_eq!(bad_stats.connections, 0);
    assert_eq!(bad_stats.bytes_received, 0);
    assert!(readers[1].segments().is_empty());
}
