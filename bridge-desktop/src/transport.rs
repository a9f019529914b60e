//! Desktop transport worker.
//!
//! One Tokio task per worker reads requests in order; every fetch runs on its
//! own task so a slow range request never blocks `Close`. `Close` cancels the
//! fetches started so far and the worker keeps serving later requests.

use bridge_traits::{
    error::Result,
    transport::{ProtocolKind, TransportRequest, TransportResponse, TransportWorker},
    worker::{worker_channel, WorkerChannel, WorkerEndpoint},
};
use core_async::sync::CancellationToken;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, debug_span, trace, Instrument};

use crate::filesystem;
use crate::http::HttpFetcher;

/// Timeout for metadata and range requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const STATUS_NOT_IMPLEMENTED: u16 = 501;

pub(crate) fn failed(sequence: u64, status: u16, message: impl Into<String>) -> TransportResponse {
    TransportResponse::Failed {
        sequence,
        status,
        message: message.into(),
    }
}

/// Transport worker for `http(s)://` and `file://` resources.
///
/// WebSocket sources are recognized but not served: metadata requests answer
/// status 501 and chunk or stream requests fail with it.
#[derive(Clone)]
pub struct DesktopTransportWorker {
    http: HttpFetcher,
}

impl DesktopTransportWorker {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(HttpFetcher::build_client()?, timeout),
        })
    }

    /// Uses a caller-configured client (proxies, custom TLS roots).
    pub fn with_client(client: Client) -> Self {
        Self {
            http: HttpFetcher::new(client, DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl TransportWorker for DesktopTransportWorker {
    fn spawn(&self) -> Result<WorkerChannel<TransportRequest, TransportResponse>> {
        let (channel, endpoint) = worker_channel();
        core_async::spawn(serve(self.http.clone(), endpoint).instrument(debug_span!("transport")));
        Ok(channel)
    }
}

async fn serve(http: HttpFetcher, mut endpoint: WorkerEndpoint<TransportRequest, TransportResponse>) {
    debug!("Transport worker started");
    let mut fetches = CancellationToken::new();

    while let Some(request) = endpoint.next_request().await {
        if request == TransportRequest::Close {
            fetches.cancel();
            fetches = CancellationToken::new();
            debug!("Fetches in flight aborted");
            continue;
        }

        let http = http.clone();
        let responses = endpoint.responder();
        let cancelled = fetches.clone();
        core_async::spawn(
            async move {
                tokio::select! {
                    _ = cancelled.cancelled() => trace!("Fetch aborted"),
                    _ = fetch(&http, request, &responses) => {}
                }
            }
            .in_current_span(),
        );
    }

    fetches.cancel();
    debug!("Transport worker exited");
}

async fn fetch(
    http: &HttpFetcher,
    request: TransportRequest,
    responses: &UnboundedSender<TransportResponse>,
) {
    let response = match request {
        TransportRequest::GetFileInfo { url, protocol } => match protocol {
            ProtocolKind::Http => http.file_info(&url).await,
            ProtocolKind::File => filesystem::file_info(&url).await,
            ProtocolKind::WebSocket => TransportResponse::FileInfo {
                status: STATUS_NOT_IMPLEMENTED,
                size: -1,
            },
        },
        TransportRequest::DownloadChunk {
            url,
            start,
            end,
            sequence,
            protocol,
        } => {
            trace!(sequence, start, end, "Fetching range");
            match protocol {
                ProtocolKind::Http => http.chunk(&url, start, end, sequence).await,
                ProtocolKind::File => filesystem::chunk(&url, start, end, sequence).await,
                ProtocolKind::WebSocket => failed(
                    sequence,
                    STATUS_NOT_IMPLEMENTED,
                    "WebSocket range requests are not supported",
                ),
            }
        }
        TransportRequest::OpenStream { url, sequence } => {
            match ProtocolKind::from_url(&url) {
                ProtocolKind::Http => http.stream(&url, sequence, responses).await,
                ProtocolKind::File => filesystem::stream(&url, sequence, responses).await,
                ProtocolKind::WebSocket => {
                    let _ = responses.send(failed(
                        sequence,
                        STATUS_NOT_IMPLEMENTED,
                        "WebSocket streams are not supported",
                    ));
                }
            }
            return;
        }
        TransportRequest::Close => return,
    };

    if responses.send(response).is_err() {
        debug!("Player went away before the response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::env;

    async fn next(channel: &mut WorkerChannel<TransportRequest, TransportResponse>) -> TransportResponse {
        tokio::time::timeout(Duration::from_secs(5), channel.recv())
            .await
            .expect("timed out waiting for the worker")
            .expect("worker exited")
    }

    #[tokio::test]
    async fn test_serves_local_file() {
        let path = env::temp_dir().join(format!("bridge-desktop-worker-{}", std::process::id()));
        std::fs::write(&path, b"abcdefgh").unwrap();
        let url = format!("file://{}", path.display());

        let worker = DesktopTransportWorker::new().unwrap();
        let mut channel = worker.spawn().unwrap();

        channel
            .send(TransportRequest::GetFileInfo {
                url: url.clone(),
                protocol: ProtocolKind::File,
            })
            .unwrap();
        assert_eq!(
            next(&mut channel).await,
            TransportResponse::FileInfo { status: 200, size: 8 }
        );

        // Close keeps the worker serving.
        channel.send(TransportRequest::Close).unwrap();
        channel
            .send(TransportRequest::DownloadChunk {
                url,
                start: 4,
                end: 7,
                sequence: 2,
                protocol: ProtocolKind::File,
            })
            .unwrap();
        assert_eq!(
            next(&mut channel).await,
            TransportResponse::ChunkData {
                data: Bytes::from_static(b"efgh"),
                start: 4,
                end: 7,
                sequence: 2
            }
        );

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_websocket_not_served() {
        let worker = DesktopTransportWorker::new().unwrap();
        let mut channel = worker.spawn().unwrap();

        channel
            .send(TransportRequest::GetFileInfo {
                url: "wss://live.example/feed".into(),
                protocol: ProtocolKind::WebSocket,
            })
            .unwrap();
        assert_eq!(
            next(&mut channel).await,
            TransportResponse::FileInfo {
                status: 501,
                size: -1
            }
        );

        channel
            .send(TransportRequest::OpenStream {
                url: "wss://live.example/feed".into(),
                sequence: 1,
            })
            .unwrap();
        assert!(matches!(
            next(&mut channel).await,
            TransportResponse::Failed {
                sequence: 1,
                status: 501,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_worker_exits_with_player() {
        let worker = DesktopTransportWorker::new().unwrap();
        let (requests, mut responses) = worker.spawn().unwrap().into_parts();
        drop(requests);

        let closed = tokio::time::timeout(Duration::from_secs(5), responses.recv()).await;
        assert_eq!(closed.unwrap(), None);
    }
}
