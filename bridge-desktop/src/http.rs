//! HTTP fetches using Reqwest

use bridge_traits::{
    error::{BridgeError, Result},
    transport::TransportResponse,
};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::transport::failed;

/// Reqwest-backed fetcher for `http://` and `https://` resources.
///
/// Provides:
/// - Connection pooling via reqwest
/// - `HEAD` for the resource size
/// - Inclusive `Range` requests for chunks
/// - Chunked body streaming for live sources
///
/// Metadata and range requests carry a per-request timeout. Live streams do
/// not, they stay open until the source ends or the player closes them.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    request_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Builds the pooled client used by default.
    pub fn build_client() -> Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("video-playback-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e)))
    }

    /// `HEAD` the resource. A missing or unparsable `Content-Length`
    /// reports size -1.
    pub async fn file_info(&self, url: &str) -> TransportResponse {
        match self
            .client
            .head(url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let size = if response.status().is_success() {
                    content_length(response.headers()).unwrap_or(-1)
                } else {
                    -1
                };
                debug!(status, size, "HEAD completed");
                TransportResponse::FileInfo { status, size }
            }
            Err(e) => {
                warn!(error = %e, "HEAD request failed");
                TransportResponse::FileInfo {
                    status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                    size: -1,
                }
            }
        }
    }

    /// Fetches `start..=end`.
    pub async fn chunk(&self, url: &str, start: u64, end: u64, sequence: u64) -> TransportResponse {
        let response = match self
            .client
            .get(url)
            .header(RANGE, range_header(start, end))
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, sequence, start, end, "Range request failed");
                return failed(
                    sequence,
                    e.status().map(|s| s.as_u16()).unwrap_or(0),
                    e.to_string(),
                );
            }
        };

        let status = response.status();
        if !status.is_success() {
            return failed(sequence, status.as_u16(), format!("HTTP {}", status));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return failed(sequence, status.as_u16(), e.to_string()),
        };

        let data = if status == StatusCode::PARTIAL_CONTENT {
            body
        } else {
            // Server ignored the range and sent the whole resource.
            match slice_range(&body, start, end) {
                Some(data) => data,
                None => {
                    return failed(sequence, status.as_u16(), "Range outside of response body")
                }
            }
        };

        if data.is_empty() {
            return failed(sequence, status.as_u16(), "Empty range response");
        }

        let end = start + data.len() as u64 - 1;
        TransportResponse::ChunkData {
            data,
            start,
            end,
            sequence,
        }
    }

    /// Forwards the response body as it arrives, then reports the end.
    pub async fn stream(
        &self,
        url: &str,
        sequence: u64,
        responses: &UnboundedSender<TransportResponse>,
    ) {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, sequence, "Stream request failed");
                let _ = responses.send(failed(
                    sequence,
                    e.status().map(|s| s.as_u16()).unwrap_or(0),
                    e.to_string(),
                ));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let _ = responses.send(failed(sequence, status.as_u16(), format!("HTTP {}", status)));
            return;
        }

        debug!(sequence, "Stream opened");
        let mut body = response.bytes_stream();
        while let Some(item) = body.next().await {
            match item {
                Ok(data) => {
                    if responses
                        .send(TransportResponse::StreamData { data, sequence })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, sequence, "Stream interrupted");
                    let _ = responses.send(failed(sequence, status.as_u16(), e.to_string()));
                    return;
                }
            }
        }

        debug!(sequence, "Stream ended");
        let _ = responses.send(TransportResponse::StreamEnded { sequence });
    }
}

/// `Range` header value for the inclusive range `start..=end`.
pub(crate) fn range_header(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end)
}

fn content_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|len| *len >= 0)
}

/// Cuts `start..=end` out of a full body, clamped to its length.
fn slice_range(body: &Bytes, start: u64, end: u64) -> Option<Bytes> {
    let start = usize::try_from(start).ok()?;
    let end = usize::try_from(end.saturating_add(1))
        .unwrap_or(usize::MAX)
        .min(body.len());
    (start < end).then(|| body.slice(start..end))
}
