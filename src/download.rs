//! Range-driven chunked download over HTTP, with total-size discovery from
//! the first response's `Content-Range` header.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::{HeaderMap, HeaderValue, Method};
use tracing::{debug, trace, warn};

use crate::constants::{DEFAULT_CHUNKSIZE, DOWNLOAD_ACCEPTABLE_STATUSES};
use crate::core::TransferCore;
use crate::error::TransferError;
use crate::range;
use crate::stream::Sink;
use crate::transport::{Client, HttpRequest, HttpResponseData, HttpTransport, UrlBuilder};

pub struct Download<S: Sink> {
    core: TransferCore<S>,
    progress: u64,
    total_size: Option<u64>,
    encoding: Option<String>,
    initial_response: Option<HttpResponseData>,
}

impl<S: Sink> Download<S> {
    pub fn new(stream: S) -> Self {
        Download {
            core: TransferCore::new(stream, DEFAULT_CHUNKSIZE),
            progress: 0,
            total_size: None,
            encoding: None,
            initial_response: None,
        }
    }

    pub fn from_stream(stream: S, total_size: Option<u64>) -> Self {
        let mut d = Download::new(stream);
        d.total_size = total_size;
        d
    }

    pub fn with_chunksize(mut self, chunksize: u64) -> Self {
        self.core.chunksize = chunksize;
        self
    }

    pub fn with_num_retries(mut self, num_retries: i64) -> Result<Self, TransferError> {
        self.core.set_num_retries(num_retries)?;
        Ok(self)
    }

    pub fn with_auto_transfer(mut self, auto_transfer: bool) -> Self {
        self.core.auto_transfer = auto_transfer;
        self
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn initialized(&self) -> bool {
        self.core.initialized()
    }

    pub fn url(&self) -> Option<&str> {
        self.core.url()
    }

    /// Borrows the underlying sink, e.g. to inspect bytes written so far.
    pub fn get_ref(&self) -> &S {
        &self.core.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.core.stream
    }

    /// Sets `alt=media` and seeds the first request with a bounded `Range`
    /// header so transports that buffer whole responses in memory don't
    /// have to.
    pub fn configure_request(&self, request: &mut HttpRequest<'_>, url_builder: &mut UrlBuilder) {
        url_builder
            .query_params
            .insert("alt".to_string(), "media".to_string());
        let range_value = range::set_range_header(0, Some(self.core.chunksize as i64 - 1));
        request.headers.insert(
            http::header::RANGE,
            HeaderValue::from_str(&range_value).expect("range header is ASCII"),
        );
    }

    pub fn initialize_download(
        &mut self,
        mut request: HttpRequest<'_>,
        http: Option<Arc<dyn HttpTransport>>,
        client: Option<&dyn Client>,
    ) -> Result<(), TransferError> {
        self.core.ensure_uninitialized()?;
        if http.is_none() && client.is_none() {
            return Err(TransferError::User("must provide client or http".into()));
        }
        let http = http.or_else(|| client.map(|c| c.http()));
        if let Some(client) = client {
            request.url = client.finalize_transfer_url(&request.url);
        }
        let mut url = request.url.clone();

        if self.core.auto_transfer {
            let end_byte = range::compute_end_byte(0, None, self.total_size, self.core.chunksize, true);
            request.headers.insert(
                http::header::RANGE,
                HeaderValue::from_str(&range::set_range_header(0, end_byte))
                    .expect("range header is ASCII"),
            );
            let transport = http
                .clone()
                .ok_or_else(|| TransferError::User("must provide client or http".into()))?;
            debug!(url = %request.url, "issuing initial download range request");
            let response = transport.execute(&mut request, self.core.num_retries())?;
            if !DOWNLOAD_ACCEPTABLE_STATUSES.contains(&response.status_code) {
                return Err(TransferError::http(response.status_code, response.request_url));
            }
            self.set_total(&response.info);
            url = response
                .header("content-location")
                .map(|s| s.to_string())
                .unwrap_or_else(|| response.request_url.clone());
            self.initial_response = Some(response);
        }
        if let Some(client) = client {
            url = client.finalize_transfer_url(&url);
        }
        self.core.initialize(http, url)?;
        if self.core.auto_transfer {
            self.stream_file(true)?;
        }
        Ok(())
    }

    fn set_total(&mut self, info: &HeaderMap) {
        if let Some(cr) = info
            .get(http::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(total) = range::parse_content_range_total(cr) {
                self.total_size = Some(total);
            }
        }
        if self.total_size.is_none() {
            self.total_size = Some(0);
        }
    }

    fn get_chunk(&mut self, start: i64, end: Option<i64>) -> Result<HttpResponseData, TransferError> {
        self.core.ensure_initialized()?;
        let url = self.core.url().unwrap().to_string();
        let mut request = HttpRequest::new(Method::GET, url);
        request.headers.insert(
            http::header::RANGE,
            HeaderValue::from_str(&range::set_range_header(start, end))
                .expect("range header is ASCII"),
        );
        let transport = self
            .core
            .bytes_http()
            .ok_or_else(|| TransferError::User("must provide client or http".into()))?
            .clone();
        trace!(start, ?end, "fetching chunk");
        transport.execute(&mut request, self.core.num_retries())
    }

    /// Writes `response` to the sink and advances `progress`. Returns the
    /// byte length of this response so callers can track local progress in
    /// step.
    fn process_response(&mut self, response: HttpResponseData) -> Result<u64, TransferError> {
        if !DOWNLOAD_ACCEPTABLE_STATUSES.contains(&response.status_code) {
            if response.status_code == 403 || response.status_code == 404 {
                return Err(TransferError::http(response.status_code, response.request_url));
            }
            return Err(TransferError::TransferRetry(format!(
                "unexpected status {} fetching download chunk",
                response.status_code
            )));
        }
        match response.status_code {
            200 | 206 => {
                self.core.stream.write_all(&response.content)?;
                self.progress += response.length;
                if self.encoding.is_none() {
                    if let Some(enc) = response.header("content-encoding") {
                        self.encoding = Some(enc.to_string());
                    }
                }
                Ok(response.length)
            }
            204 => {
                // Writing nothing at all would leave a 0-byte sink
                // unconfirmed by some sinks (e.g. never creating the file).
                self.core.stream.write_all(&[])?;
                Ok(0)
            }
            416 => Ok(0),
            _ => unreachable!("status filtered by acceptable-statuses check above"),
        }
    }

    /// Fetches an inclusive byte range. `start`/`end` follow three forms:
    /// `start >= 0` with no `end` fetches to EOF, `0 <= start <= end`
    /// fetches an exact range, and a negative `start` with no `end` is an
    /// HTTP suffix range ("last `-start` bytes").
    pub fn get_range(&mut self, start: i64, end: Option<i64>, use_chunks: bool) -> Result<(), TransferError> {
        self.core.ensure_initialized()?;
        let mut progress_end_normalized = false;
        let (mut progress, mut end_byte) = if let Some(total_size) = self.total_size {
            let (p, e) = range::normalize_start_end(start, end, total_size)?;
            progress_end_normalized = true;
            (p as i64, Some(e))
        } else {
            (start, end)
        };

        loop {
            if progress_end_normalized {
                if let Some(eb) = end_byte {
                    if progress > eb {
                        break;
                    }
                }
            }
            end_byte = range::compute_end_byte(progress, end_byte, self.total_size, self.core.chunksize, use_chunks);
            let response = self.get_chunk(progress, end_byte)?;
            if !progress_end_normalized {
                self.set_total(&response.info);
                let total = self.total_size.expect("set_total always yields Some");
                let (p, e) = range::normalize_start_end(start, end, total)?;
                progress = p as i64;
                end_byte = Some(e);
                progress_end_normalized = true;
            }
            let length = self.process_response(response)?;
            progress += length as i64;
            if length == 0 {
                return Err(TransferError::TransferRetry(
                    "zero bytes unexpectedly returned in download response".into(),
                ));
            }
        }
        Ok(())
    }

    /// Pumps from the current `progress` to end-of-stream, reusing the
    /// cached initial response on the first iteration.
    pub fn stream_file(&mut self, use_chunks: bool) -> Result<(), TransferError> {
        self.core.ensure_initialized()?;
        loop {
            let response = if let Some(resp) = self.initial_response.take() {
                resp
            } else {
                let end_byte = range::compute_end_byte(
                    self.progress as i64,
                    None,
                    self.total_size,
                    self.core.chunksize,
                    use_chunks,
                );
                self.get_chunk(self.progress as i64, end_byte)?
            };
            if self.total_size.is_none() {
                self.set_total(&response.info);
            }
            let status = response.status_code;
            self.process_response(response)?;
            if status == 200 || self.progress >= self.total_size.unwrap_or(u64::MAX) {
                break;
            }
        }
        Ok(())
    }
}

impl Download<std::fs::File> {
    /// Fails if `path` already exists unless `overwrite` is set.
    pub fn from_file(path: impl AsRef<Path>, overwrite: bool) -> Result<Self, TransferError> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(TransferError::InvalidUserInput(format!(
                "file {} exists and overwrite not specified",
                path.display()
            )));
        }
        let file = std::fs::File::create(path)?;
        let mut download = Download::new(file);
        download.core.close_stream = true;
        Ok(download)
    }
}

impl<S: Sink> fmt::Debug for Download<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.initialized() {
            write!(f, "Download (uninitialized)")
        } else {
            write!(
                f,
                "Download with {}/{} bytes transferred from url {}",
                self.progress,
                self.total_size
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                self.url().unwrap_or_default()
            )
        }
    }
}

impl<S: Sink> Drop for Download<S> {
    fn drop(&mut self) {
        if self.core.close_stream {
            if let Err(err) = self.core.stream.close() {
                warn!(%err, "failed to close download sink on teardown");
            }
        }
    }
}
