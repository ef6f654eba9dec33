//! S3-compatible HTTP blob store.
//!
//! Async reqwest driven through a shared tokio runtime, exposed as the sync
//! [`BlobStore`] interface the rayon fetch workers expect. Response headers
//! and every body chunk are awaited under a stall timeout.

use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::blob::{BlobError, BlobStore, is_ignored};

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-chunk stall timeout
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

fn stalled(what: &str, timeout: Duration) -> BlobError {
    BlobError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("{what} stalled for {}s", timeout.as_secs_f64()),
    ))
}

fn from_reqwest(e: &reqwest::Error) -> BlobError {
    BlobError::Http {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// Bucket reachable over plain HTTP(S), e.g. `https://bucket.s3.amazonaws.com`
/// or a MinIO endpoint.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    base_url: String,
    read_timeout: Duration,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage, BlobError> {
        let mut query: Vec<(&str, &str)> = vec![("list-type", "2"), ("prefix", prefix)];
        if let Some(t) = token {
            query.push(("continuation-token", t));
        }
        let read_timeout = self.read_timeout;
        let body = SHARED_RUNTIME.handle().block_on(async {
            let request = SHARED_CLIENT
                .get(format!("{}/", self.base_url))
                .query(&query)
                .send();
            let response = tokio::time::timeout(read_timeout, request)
                .await
                .map_err(|_| stalled("listing response", read_timeout))?
                .and_then(|r| r.error_for_status())
                .map_err(|e| from_reqwest(&e))?;
            tokio::time::timeout(read_timeout, response.text())
                .await
                .map_err(|_| stalled("listing body", read_timeout))?
                .map_err(|e| from_reqwest(&e))
        })?;
        parse_list_objects(&body)
    }
}

impl BlobStore for HttpBlobStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(prefix, token.as_deref())?;
            keys.extend(page.keys.into_iter().filter(|k| !is_ignored(k)));
            match page.next_token {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        log::debug!("listed {} objects under {prefix:?}", keys.len());
        Ok(keys)
    }

    fn download(&self, key: &str, dest: &Path) -> Result<u64, BlobError> {
        let url = self.object_url(key);
        let mut file = std::fs::File::create(dest)?;
        let read_timeout = self.read_timeout;

        let written = SHARED_RUNTIME.handle().block_on(async {
            let mut response = tokio::time::timeout(read_timeout, SHARED_CLIENT.get(&url).send())
                .await
                .map_err(|_| stalled("response", read_timeout))?
                .map_err(|e| from_reqwest(&e))?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(BlobError::NotFound(key.to_string()));
            }
            response = response.error_for_status().map_err(|e| from_reqwest(&e))?;

            let mut written = 0u64;
            loop {
                let chunk = tokio::time::timeout(read_timeout, response.chunk())
                    .await
                    .map_err(|_| stalled("read", read_timeout))?
                    .map_err(|e| from_reqwest(&e))?;
                let Some(bytes) = chunk else { break };
                file.write_all(&bytes)?;
                written += bytes.len() as u64;
            }
            Ok(written)
        })?;

        file.flush()?;
        Ok(written)
    }
}

#[derive(Debug, Default, PartialEq)]
struct ListPage {
    keys: Vec<String>,
    next_token: Option<String>,
}

/// Parse a `ListObjectsV2` response body.
fn parse_list_objects(xml: &str) -> Result<ListPage, BlobError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let xml_err = |e: quick_xml::Error| BlobError::Http {
        status: None,
        message: format!("malformed bucket listing: {e}"),
    };

    let mut page = ListPage::default();
    let mut truncated = false;
    let mut token = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) if e.name().as_ref() == b"Key" => {
                page.keys.push(reader.read_text(e.name()).map_err(xml_err)?.into_owned());
            }
            Event::Start(e) if e.name().as_ref() == b"IsTruncated" => {
                truncated = reader.read_text(e.name()).map_err(xml_err)?.trim() == "true";
            }
            Event::Start(e) if e.name().as_ref() == b"NextContinuationToken" => {
                token = Some(reader.read_text(e.name()).map_err(xml_err)?.into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    page.next_token = if truncated { token } else { None };
    Ok(page)
}
