use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nsrl_sync::workdir;
use nsrl_sync::{ArtifactFetcher, BLOCK_SIZE, FetchError, FetchOutcome, SourceDescriptor};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Certificate, Client, RequestBuilder, Response, StatusCode};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::http_date;

/// Idle timeout for connecting and for each read of a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const USER_AGENT: &str = concat!("nsrl-sync/", env!("CARGO_PKG_VERSION"));

/// Downloads source artifacts over HTTP(S), skipping the transfer when the
/// remote copy is no newer than the last successful update.
///
/// A client is built per fetch from the source's own settings, so a proxy
/// or TLS override configured on one source never leaks into another.
/// Custom CA certificates are the exception: once a source has supplied
/// one it stays trusted for every later fetch made through this fetcher.
pub struct HttpFetcher {
    timeout: Duration,
    trust_anchors: Mutex<Vec<(String, Certificate)>>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            trust_anchors: Mutex::new(Vec::new()),
        }
    }

    /// Number of distinct CA certificates trusted so far.
    pub fn trusted_certificates(&self) -> usize {
        self.trust_anchors.lock().unwrap().len()
    }

    fn client_for(&self, source: &SourceDescriptor) -> Result<Client, FetchError> {
        let client_error = |message: String| FetchError::Client {
            uri: source.uri.clone(),
            message,
        };

        let mut builder = Client::builder()
            .connect_timeout(self.timeout)
            .read_timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(header_map(source).map_err(client_error)?);

        if source.ignore_ssl_errors {
            warn!("TLS certificate verification disabled for this source");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(proxy) = &source.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| client_error(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let mut anchors = self.trust_anchors.lock().unwrap();
        let new_anchor = match source.ca_cert.as_deref() {
            Some(pem) if !anchors.iter().any(|(known, _)| known == pem) => {
                let cert = Certificate::from_pem(pem.as_bytes())
                    .map_err(|e| client_error(format!("invalid CA certificate: {e}")))?;
                Some((pem.to_owned(), cert))
            }
            _ => None,
        };

        for (_, cert) in anchors.iter().chain(new_anchor.iter()) {
            builder = builder.add_root_certificate(cert.clone());
        }

        let client = builder.build().map_err(|e| client_error(e.to_string()))?;

        if let Some(anchor) = new_anchor {
            debug!("trusting additional CA certificate");
            anchors.push(anchor);
        }

        Ok(client)
    }

    /// Ask for the remote `Last-Modified` without transferring the body.
    /// `None` means the server could not say.
    async fn probe(
        &self,
        client: &Client,
        source: &SourceDescriptor,
    ) -> Result<Option<DateTime<Utc>>, FetchError> {
        let response = authorized(client.head(&source.uri), source)
            .send()
            .await
            .map_err(|e| transport_error(&source.uri, e))?;

        if !response.status().is_success() {
            debug!(
                status = %response.status(),
                "HEAD not answered, falling back to conditional GET"
            );
            return Ok(None);
        }

        Ok(last_modified(&response))
    }

    async fn download(
        &self,
        client: &Client,
        source: &SourceDescriptor,
        target: &Path,
        previous_update: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut request = authorized(client.get(&source.uri), source);
        if let Some(previous) = previous_update {
            request = request.header(IF_MODIFIED_SINCE, http_date::format(previous));
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| transport_error(&source.uri, e))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            info!("server answered not modified");
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                uri: source.uri.clone(),
                status: status.as_u16(),
            });
        }

        let last_modified = last_modified(&response);
        let part = workdir::part_path(target);
        info!(uri = %source.uri, "downloading");

        let written = match stream_to(&mut response, &source.uri, &part, target).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        info!(bytes = written, target = %target.display(), "download finished");
        Ok(FetchOutcome::Updated { last_modified })
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        target: &Path,
        previous_update: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome, FetchError> {
        let client = self.client_for(source)?;

        if let Some(previous) = previous_update {
            match self.probe(&client, source).await? {
                Some(remote) if remote <= previous => {
                    info!(%remote, %previous, "remote copy is not newer");
                    return Ok(FetchOutcome::NotModified);
                }
                Some(remote) => debug!(%remote, %previous, "remote copy is newer"),
                None => debug!("remote modification time unknown"),
            }
        }

        self.download(&client, source, target, previous_update).await
    }
}

/// Write the response body to `part`, then move it onto `target`.
async fn stream_to(
    response: &mut Response,
    uri: &str,
    part: &Path,
    target: &Path,
) -> Result<u64, FetchError> {
    let io_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source| FetchError::Io { path, source }
    };

    let file = tokio::fs::File::create(part).await.map_err(io_error(part))?;
    let mut writer = BufWriter::with_capacity(BLOCK_SIZE, file);
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(uri, e))? {
        writer.write_all(&chunk).await.map_err(io_error(part))?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(io_error(part))?;
    writer.get_ref().sync_all().await.map_err(io_error(part))?;
    drop(writer);

    tokio::fs::rename(part, target).await.map_err(io_error(target))?;
    Ok(written)
}

fn authorized(request: RequestBuilder, source: &SourceDescriptor) -> RequestBuilder {
    match &source.credentials {
        Some(credentials) => {
            request.basic_auth(&credentials.username, Some(&credentials.password))
        }
        None => request,
    }
}

fn header_map(source: &SourceDescriptor) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    for (name, value) in &source.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("invalid value for header {name}: {e}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn last_modified(response: &Response) -> Option<DateTime<Utc>> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(http_date::parse)
}

fn transport_error(uri: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { uri: uri.to_owned() }
    } else {
        FetchError::Network {
            uri: uri.to_owned(),
            message: e.to_string(),
        }
    }
}
