//! Local `file://` fetches using Tokio

use bridge_traits::transport::TransportResponse;
use bytes::Bytes;
use futures_util::StreamExt;
use std::io::{self, ErrorKind, SeekFrom};
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::transport::failed;

const STREAM_READ_SIZE: usize = 64 * 1024;

/// Path part of a `file://` URL.
pub(crate) fn local_path(url: &str) -> Option<PathBuf> {
    url.strip_prefix("file://")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// HTTP-like status for a failed local read.
fn io_status(err: &io::Error) -> u16 {
    match err.kind() {
        ErrorKind::NotFound => 404,
        ErrorKind::PermissionDenied => 403,
        ErrorKind::InvalidInput | ErrorKind::UnexpectedEof => 416,
        _ => 500,
    }
}

pub async fn file_info(url: &str) -> TransportResponse {
    let Some(path) = local_path(url) else {
        return TransportResponse::FileInfo {
            status: 400,
            size: -1,
        };
    };

    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => {
            let size = i64::try_from(metadata.len()).unwrap_or(-1);
            debug!(size, "Local file info");
            TransportResponse::FileInfo { status: 200, size }
        }
        Ok(_) => TransportResponse::FileInfo {
            status: 400,
            size: -1,
        },
        Err(e) => {
            warn!(error = %e, path = ?path, "Local file unavailable");
            TransportResponse::FileInfo {
                status: io_status(&e),
                size: -1,
            }
        }
    }
}

pub async fn chunk(url: &str, start: u64, end: u64, sequence: u64) -> TransportResponse {
    let Some(path) = local_path(url) else {
        return failed(sequence, 400, "Not a file URL");
    };

    match read_range(path, start, end).await {
        Ok(data) => {
            let end = start + data.len() as u64 - 1;
            TransportResponse::ChunkData {
                data,
                start,
                end,
                sequence,
            }
        }
        Err(e) => failed(sequence, io_status(&e), e.to_string()),
    }
}

async fn read_range(path: PathBuf, start: u64, end: u64) -> io::Result<Bytes> {
    if end < start {
        return Err(io::Error::new(ErrorKind::InvalidInput, "Inverted byte range"));
    }

    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let len = end - start + 1;
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.take(len).read_to_end(&mut buf).await?;

    if buf.is_empty() {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "Range starts past the end of the file",
        ));
    }
    Ok(Bytes::from(buf))
}

/// Streams the whole file in fixed-size reads.
pub async fn stream(url: &str, sequence: u64, responses: &UnboundedSender<TransportResponse>) {
    let Some(path) = local_path(url) else {
        let _ = responses.send(failed(sequence, 400, "Not a file URL"));
        return;
    };

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            let _ = responses.send(failed(sequence, io_status(&e), e.to_string()));
            return;
        }
    };

    let mut reads = ReaderStream::with_capacity(file, STREAM_READ_SIZE);
    while let Some(item) = reads.next().await {
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
                let _ = responses.send(failed(sequence, io_status(&e), e.to_string()));
                return;
            }
        }
    }

    let _ = responses.send(TransportResponse::StreamEnded { sequence });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn fixture(name: &str, contents: &[u8]) -> PathBuf {
        let path = env::temp_dir().join(format!(
            "bridge-desktop-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn url(path: &std::path::Path) -> String {
        format!("file://{}", path.display())
    }

    #[test]
    fn test_local_path() {
        assert_eq!(
            local_path("file:///tmp/movie.mp4"),
            Some(PathBuf::from("/tmp/movie.mp4"))
        );
        assert_eq!(local_path("file://"), None);
        assert_eq!(local_path("https://host/movie.mp4"), None);
    }

    #[tokio::test]
    async fn test_file_info_and_ranges() {
        let path = fixture("ranges", b"0123456789");
        let url = url(&path);

        assert_eq!(
            file_info(&url).await,
            TransportResponse::FileInfo {
                status: 200,
                size: 10
            }
        );
        assert_eq!(
            chunk(&url, 2, 5, 3).await,
            TransportResponse::ChunkData {
                data: Bytes::from_static(b"2345"),
                start: 2,
                end: 5,
                sequence: 3
            }
        );

        // The last chunk is clamped to the file.
        match chunk(&url, 8, 20, 3).await {
            TransportResponse::ChunkData { data, end, .. } => {
                assert_eq!(&data[..], b"89");
                assert_eq!(end, 9);
            }
            other => panic!("unexpected response {:?}", other),
        }

        assert!(matches!(
            chunk(&url, 10, 12, 3).await,
            TransportResponse::Failed {
                status: 416,
                sequence: 3,
                ..
            }
        ));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file() {
        let url = "file:///definitely/not/here.mp4";
        assert_eq!(
            file_info(url).await,
            TransportResponse::FileInfo {
                status: 404,
                size: -1
            }
        );
        assert!(matches!(
            chunk(url, 0, 9, 1).await,
            TransportResponse::Failed { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_stream_reads_whole_file() {
        let path = fixture("stream", &[7u8; 100]);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        stream(&url(&path), 2, &tx).await;

        let mut received = 0;
        let mut ended = false;
        while let Ok(response) = rx.try_recv() {
            match response {
                TransportResponse::StreamData { data, sequence } => {
                    assert_eq!(sequence, 2);
                    received += data.len();
                }
                TransportResponse::StreamEnded { sequence } => {
                    assert_eq!(sequence, 2);
                    ended = true;
                }
                other => panic!("unexpected response {:?}", other),
            }
        }
        assert!(ended);
        assert_eq!(received, 100);

        std::fs::remove_file(path).unwrap();
    }
}
