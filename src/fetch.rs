//! HTTP fetching with progress reporting.
//!
//! [`Fetcher::fetch`] downloads one resource, reporting the cumulative
//! number of bytes received as chunks arrive, and stores the finished
//! buffer in the [`ByteCache`]. A cached URL is returned without touching
//! the network and without any progress callback.
//!
//! The HTTP side is behind the [`Transport`] trait; [`ReqwestTransport`] is
//! the production implementation.

use crate::cache::ByteCache;
use crate::error::{QuarryError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Progress callback: `(bytes_received_so_far, content_length)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// A chunked response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Response body, streamed when the transport supports it.
pub enum ResponseBody {
    /// Body delivered incrementally.
    Streaming(ByteStream),
    /// Body only available as a whole.
    Buffered(Bytes),
}

/// An HTTP response as seen by the fetcher.
pub struct HttpResponse {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase, e.g. `Not Found`.
    pub status_text: String,
    /// Value of the `content-length` header, when present and non-zero.
    pub content_length: Option<u64>,
    /// Response body.
    pub body: ResponseBody,
}

impl HttpResponse {
    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body into one buffer.
    pub async fn bytes(self) -> Result<Bytes> {
        match self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Issues HTTP GET requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`. Transport failures are `QuarryError::Network`; a
    /// non-success status is returned as a response, not an error.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a connect timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QuarryError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QuarryError::network(url, e))?;

        let status = response.status();
        let content_length = response.content_length().filter(|len| *len > 0);
        let owned_url = url.to_string();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| QuarryError::network(owned_url.as_str(), e)))
            .boxed();

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            content_length,
            body: ResponseBody::Streaming(stream),
        })
    }
}

/// Fetches URLs through the byte cache.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    cache: Arc<ByteCache>,
}

impl Fetcher {
    /// Create a fetcher.
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<ByteCache>) -> Self {
        Self { transport, cache }
    }

    /// The cache this fetcher fills.
    pub fn cache(&self) -> &Arc<ByteCache> {
        &self.cache
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Fetch `url`, reporting progress to `on_progress`.
    ///
    /// # Errors
    ///
    /// `QuarryError::Fetch` for a non-success status, `QuarryError::Network`
    /// when the request or the body read fails.
    pub async fn fetch(&self, url: &str, on_progress: Option<ProgressFn<'_>>) -> Result<Bytes> {
        if let Some(cached) = self.cache.get(url).await {
            debug!(url = %url, bytes = cached.len(), "Serving file from cache");
            return Ok(cached);
        }

        let response = self.transport.get(url).await?;
        if !response.is_success() {
            return Err(QuarryError::fetch(url, response.status_text));
        }

        let content_length = response.content_length;
        let buffer = match (response.body, on_progress) {
            (ResponseBody::Streaming(mut stream), Some(report)) => {
                let mut chunks: Vec<Bytes> = Vec::new();
                let mut received: u64 = 0;
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        continue;
                    }
                    received += chunk.len() as u64;
                    chunks.push(chunk);
                    report(received, content_length);
                }
                concat(chunks, received)
            }
            (body, report) => {
                let buffer = HttpResponse {
                    status: 200,
                    status_text: String::new(),
                    content_length,
                    body,
                }
                .bytes()
                .await?;
                if let Some(report) = report {
                    report(buffer.len() as u64, content_length);
                }
                buffer
            }
        };

        self.cache.set(url, buffer.clone()).await;

        info!(url = %url, bytes = buffer.len(), "Fetched file");
        Ok(buffer)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("cache", &self.cache).finish_non_exhaustive()
    }
}

fn concat(chunks: Vec<Bytes>, total: u64) -> Bytes {
    if chunks.len() == 1 {
        return chunks.into_iter().next().unwrap_or_default();
    }
    let mut buf = BytesMut::with_capacity(total as usize);
    for chunk in chunks {
        buf.extend_from_slice(&chunk);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed body, optionally chunked, and counts requests.
    struct StaticTransport {
        status: u16,
        chunks: Vec<&'static [u8]>,
        streaming: bool,
        content_length: Option<u64>,
        requests: AtomicUsize,
    }

    impl StaticTransport {
        fn ok(chunks: Vec<&'static [u8]>, streaming: bool) -> Self {
            let len = chunks.iter().map(|c| c.len() as u64).sum();
            Self {
                status: 200,
                chunks,
                streaming,
                content_length: Some(len),
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get(&self, _url: &str) -> Result<HttpResponse> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let body = if self.streaming {
                let items: Vec<Result<Bytes>> = self
                    .chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c)))
                    .collect();
                ResponseBody::Streaming(stream::iter(items).boxed())
            } else {
                ResponseBody::Buffered(Bytes::from(self.chunks.concat()))
            };
            Ok(HttpResponse {
                status: self.status,
                status_text: if self.status == 404 { "Not Found".into() } else { "OK".into() },
                content_length: self.content_length,
                body,
            })
        }
    }

    fn fetcher(transport: Arc<StaticTransport>) -> Fetcher {
        Fetcher::new(transport, Arc::new(ByteCache::memory_only()))
    }

    #[tokio::test]
    async fn test_streaming_reports_cumulative_progress() {
        let transport = Arc::new(StaticTransport::ok(vec![b"PAR1", b"abcd", b"PAR1"], true));
        let fetcher = fetcher(transport.clone());
        let reports = Mutex::new(Vec::new());
        let on_progress = |loaded: u64, total: Option<u64>| reports.lock().push((loaded, total));

        let bytes = fetcher.fetch("http://h/a.parquet", Some(&on_progress)).await.unwrap();

        assert_eq!(&bytes[..], b"PAR1abcdPAR1");
        assert_eq!(
            *reports.lock(),
            vec![(4, Some(12)), (8, Some(12)), (12, Some(12))]
        );
    }

    #[tokio::test]
    async fn test_buffered_body_reports_once() {
        let transport = Arc::new(StaticTransport::ok(vec![b"hello", b"world"], false));
        let fetcher = fetcher(transport);
        let reports = Mutex::new(Vec::new());
        let on_progress = |loaded: u64, total: Option<u64>| reports.lock().push((loaded, total));

        let bytes = fetcher.fetch("http://h/b", Some(&on_progress)).await.unwrap();

        assert_eq!(&bytes[..], b"helloworld");
        assert_eq!(*reports.lock(), vec![(10, Some(10))]);
    }

    #[tokio::test]
    async fn test_missing_content_length_is_tolerated() {
        let mut inner = StaticTransport::ok(vec![b"abc"], true);
        inner.content_length = None;
        let fetcher = fetcher(Arc::new(inner));
        let reports = Mutex::new(Vec::new());
        let on_progress = |loaded: u64, total: Option<u64>| reports.lock().push((loaded, total));

        fetcher.fetch("http://h/c", Some(&on_progress)).await.unwrap();
        assert_eq!(*reports.lock(), vec![(3, None)]);
    }

    #[tokio::test]
    async fn test_cached_url_skips_network_and_progress() {
        let transport = Arc::new(StaticTransport::ok(vec![b"abc"], true));
        let fetcher = fetcher(transport.clone());

        fetcher.fetch("http://h/d", None).await.unwrap();
        let calls = AtomicUsize::new(0);
        let on_progress = |_: u64, _: Option<u64>| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let again = fetcher.fetch("http://h/d", Some(&on_progress)).await.unwrap();

        assert_eq!(&again[..], b"abc");
        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error_and_not_cached() {
        let mut inner = StaticTransport::ok(vec![b"nope"], true);
        inner.status = 404;
        let transport = Arc::new(inner);
        let fetcher = fetcher(transport.clone());

        let err = fetcher.fetch("http://h/missing", None).await.unwrap_err();

        assert!(matches!(err, QuarryError::Fetch { ref status, .. } if status == "Not Found"));
        assert!(fetcher.cache().get("http://h/missing").await.is_none());
    }
}
