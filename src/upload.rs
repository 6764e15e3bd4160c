//! Upload strategy selection, multipart framing, resumable-session
//! initiation, and the chunked send loop with recovery.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use http::{HeaderValue, Method};
use tracing::{debug, trace, warn};

use crate::buffered::BufferedStream;
use crate::constants::{
    DEFAULT_CHUNKSIZE, RESUMABLE_UPLOAD_THRESHOLD, RESUME_INCOMPLETE, UPLOAD_ACCEPTABLE_STATUSES,
};
use crate::core::TransferCore;
use crate::error::TransferError;
use crate::mime_match;
use crate::multipart;
use crate::range;
use crate::slice::StreamSlice;
use crate::stream::Source;
use crate::transport::{Body, Client, HttpRequest, HttpResponseData, HttpTransport, UrlBuilder};

/// Upload transport strategy. Once chosen it is immutable for the
/// lifetime of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Simple,
    Resumable,
}

/// Endpoint configuration a particular API surface hands to
/// `configure_request`.
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    pub simple_path: Option<String>,
    pub resumable_path: Option<String>,
    pub simple_multipart: bool,
    pub max_size: Option<u64>,
    pub accept: Vec<String>,
}

pub struct Upload<S: Source> {
    core: TransferCore<S>,
    mime_type: String,
    total_size: Option<u64>,
    strategy: Option<Strategy>,
    progress: u64,
    complete: bool,
    server_chunk_granularity: Option<u64>,
    final_response: Option<HttpResponseData>,
}

impl<S: Source> Upload<S> {
    pub fn new(stream: S, mime_type: String) -> Self {
        Upload {
            core: TransferCore::new(stream, DEFAULT_CHUNKSIZE),
            mime_type,
            total_size: None,
            strategy: None,
            progress: 0,
            complete: false,
            server_chunk_granularity: None,
            final_response: None,
        }
    }

    pub fn from_stream(stream: S, mime_type: String, total_size: Option<u64>) -> Self {
        let mut u = Upload::new(stream, mime_type);
        u.total_size = total_size;
        u
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

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Only settable before the transfer initializes.
    pub fn set_total_size(&mut self, value: Option<u64>) -> Result<(), TransferError> {
        self.core.ensure_uninitialized()?;
        self.total_size = value;
        Ok(())
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn complete(&self) -> bool {
        self.complete
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    /// Fails if a strategy is already set. Lets a caller force a strategy
    /// before `configure_request` picks one.
    pub fn set_strategy(&mut self, strategy: Strategy) -> Result<(), TransferError> {
        if self.strategy.is_some() {
            return Err(TransferError::User(format!(
                "cannot change strategy once it is set to {:?}",
                self.strategy.unwrap()
            )));
        }
        self.strategy = Some(strategy);
        Ok(())
    }

    pub fn initialized(&self) -> bool {
        self.core.initialized()
    }

    pub fn url(&self) -> Option<&str> {
        self.core.url()
    }

    /// Borrows the underlying source, e.g. to confirm final stream position.
    pub fn get_ref(&self) -> &S {
        &self.core.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.core.stream
    }

    fn select_strategy(&mut self, upload_config: &UploadConfig, has_body: bool) {
        if upload_config.resumable_path.is_none() {
            self.strategy = Some(Strategy::Simple);
        }
        if self.strategy.is_some() {
            return;
        }
        let mut strategy = Strategy::Simple;
        if let Some(total) = self.total_size {
            if total > RESUMABLE_UPLOAD_THRESHOLD {
                strategy = Strategy::Resumable;
            }
        }
        if has_body && !upload_config.simple_multipart {
            strategy = Strategy::Resumable;
        }
        if upload_config.simple_path.is_none() {
            strategy = Strategy::Resumable;
        }
        self.strategy = Some(strategy);
    }

    /// Picks simple vs. resumable and frames `request`/`url_builder`
    /// accordingly. A non-empty `request.body` going in is treated as
    /// object metadata to pair with the media.
    pub fn configure_request(
        &mut self,
        upload_config: &UploadConfig,
        request: &mut HttpRequest<'_>,
        url_builder: &mut UrlBuilder,
    ) -> Result<(), TransferError> {
        if let Some(total) = self.total_size {
            if let Some(max) = upload_config.max_size {
                if total > max {
                    return Err(TransferError::InvalidUserInput(format!(
                        "upload too big: {total} larger than max size {max}"
                    )));
                }
            }
        }
        if !mime_match::acceptable_mime_type(&upload_config.accept, &self.mime_type) {
            return Err(TransferError::InvalidUserInput(format!(
                "MIME type {} does not match any accepted MIME ranges {:?}",
                self.mime_type, upload_config.accept
            )));
        }

        let has_body = !request.body.is_empty();
        self.select_strategy(upload_config, has_body);

        match self.strategy.expect("select_strategy always sets a value") {
            Strategy::Simple => {
                url_builder.relative_path = upload_config.simple_path.clone();
                if has_body {
                    url_builder
                        .query_params
                        .insert("uploadType".into(), "multipart".into());
                    self.configure_multipart_request(request)?;
                } else {
                    url_builder
                        .query_params
                        .insert("uploadType".into(), "media".into());
                    self.configure_media_request(request)?;
                }
            }
            Strategy::Resumable => {
                url_builder.relative_path = upload_config.resumable_path.clone();
                url_builder
                    .query_params
                    .insert("uploadType".into(), "resumable".into());
                self.configure_resumable_request(request)?;
            }
        }
        Ok(())
    }

    fn configure_media_request(&mut self, request: &mut HttpRequest<'_>) -> Result<(), TransferError> {
        request
            .headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_str(&self.mime_type)?);
        let mut data = Vec::new();
        self.core.stream.read_to_end(&mut data)?;
        request.loggable_body = Some("<media body>".to_string());
        request.body = Body::Bytes(data);
        Ok(())
    }

    fn configure_multipart_request(&mut self, request: &mut HttpRequest<'_>) -> Result<(), TransferError> {
        let metadata_content_type = request
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let metadata_bytes = match &request.body {
            Body::Bytes(b) => b.clone(),
            Body::None => Vec::new(),
            Body::Reader(_) => {
                return Err(TransferError::InvalidUserInput(
                    "multipart metadata body must already be in memory".into(),
                ))
            }
        };
        let mut media = Vec::new();
        self.core.stream.read_to_end(&mut media)?;
        let built =
            multipart::build_multipart(&metadata_bytes, &metadata_content_type, &media, &self.mime_type);
        request
            .headers
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_str(&built.content_type)?);
        request.loggable_body = Some(built.loggable_body);
        request.body = Body::Bytes(built.body);
        Ok(())
    }

    fn configure_resumable_request(&self, request: &mut HttpRequest<'_>) -> Result<(), TransferError> {
        request.headers.insert(
            http::HeaderName::from_static("x-upload-content-type"),
            HeaderValue::from_str(&self.mime_type)?,
        );
        if let Some(total) = self.total_size {
            request.headers.insert(
                http::HeaderName::from_static("x-upload-content-length"),
                HeaderValue::from_str(&total.to_string())?,
            );
        }
        Ok(())
    }

    /// Initiates a resumable session; a no-op for the simple strategy. On
    /// success with `auto_transfer` the whole upload is pumped in place.
    pub fn initialize_upload(
        &mut self,
        mut request: HttpRequest<'_>,
        http: Option<Arc<dyn HttpTransport>>,
        client: Option<&dyn Client>,
    ) -> Result<Option<HttpResponseData>, TransferError> {
        let strategy = self
            .strategy
            .ok_or_else(|| TransferError::User("no upload strategy set; call configure_request first".into()))?;
        if http.is_none() && client.is_none() {
            return Err(TransferError::User("must provide client or http".into()));
        }
        if strategy != Strategy::Resumable {
            return Ok(None);
        }
        self.core.ensure_uninitialized()?;
        let http = http.or_else(|| client.map(|c| c.http()));
        if let Some(client) = client {
            request.url = client.finalize_transfer_url(&request.url);
        }
        let transport = http
            .clone()
            .ok_or_else(|| TransferError::User("must provide client or http".into()))?;
        debug!(url = %request.url, "initiating resumable upload session");
        let response = transport.execute(&mut request, self.core.num_retries())?;
        if response.status_code != 200 {
            return Err(TransferError::http(response.status_code, response.request_url));
        }
        if let Some(granularity) = response.header("x-goog-upload-chunk-granularity") {
            self.server_chunk_granularity = granularity.parse::<u64>().ok();
        }
        let mut url = response
            .header("location")
            .ok_or_else(|| {
                TransferError::TransferInvalid("resumable initiation response missing Location header".into())
            })?
            .to_string();
        if let Some(client) = client {
            url = client.finalize_transfer_url(&url);
        }
        self.core.initialize(http, url)?;
        if self.core.auto_transfer {
            self.stream_file(true)?;
            Ok(None)
        } else {
            Ok(Some(response))
        }
    }

    fn validate_chunksize(&self, chunksize: u64) -> Result<(), TransferError> {
        if let Some(granularity) = self.server_chunk_granularity {
            if granularity != 0 && chunksize % granularity != 0 {
                return Err(TransferError::Configuration { chunksize, granularity });
            }
        }
        Ok(())
    }

    /// Re-queries session state via `PUT bytes */*`; this dialect reports
    /// resumable session status with a `PUT`, not a `GET`. Called after a
    /// chunk send lands on an unexpected status.
    pub fn refresh_upload_state(&mut self) -> Result<(), TransferError> {
        if self.strategy != Some(Strategy::Resumable) {
            return Ok(());
        }
        self.core.ensure_initialized()?;
        let transport = self
            .core
            .http()
            .cloned()
            .ok_or_else(|| TransferError::User("must provide client or http".into()))?;
        let num_retries = self.core.num_retries();
        let url = self.core.url().unwrap().to_string();
        let mut request = HttpRequest::new(Method::PUT, url);
        request
            .headers
            .insert(http::header::CONTENT_RANGE, HeaderValue::from_static("bytes */*"));
        warn!("refreshing resumable upload session state");
        let response = transport.execute_no_redirect(&mut request, num_retries)?;
        match response.status_code {
            200 | 201 => {
                self.complete = true;
                let total = self
                    .total_size
                    .ok_or_else(|| TransferError::TransferInvalid("total size unknown at completion".into()))?;
                self.progress = total;
                if self.core.stream.is_seekable() {
                    self.core.stream.seek_to(self.progress)?;
                }
                self.final_response = Some(response);
                Ok(())
            }
            RESUME_INCOMPLETE => {
                let range_header = response
                    .header("range")
                    .or_else(|| response.header("Range"))
                    .map(|s| s.to_string());
                self.progress = match range_header {
                    None => 0,
                    Some(h) => {
                        let last_byte = range::parse_last_byte(&h).ok_or_else(|| {
                            TransferError::TransferInvalid("could not parse Range header".into())
                        })?;
                        (last_byte + 1) as u64
                    }
                };
                if self.core.stream.is_seekable() {
                    self.core.stream.seek_to(self.progress)?;
                }
                Ok(())
            }
            status => Err(TransferError::http(status, response.request_url)),
        }
    }

    /// Status handling shared by `send_chunk` and `send_media_body` once
    /// the HTTP exchange has already completed: refreshes session state on
    /// an unacceptable status, and seeks the stream back if the server
    /// only confirmed a prefix of what was sent.
    fn finish_chunk_send(&mut self, response: HttpResponseData, end: u64) -> Result<HttpResponseData, TransferError> {
        if !UPLOAD_ACCEPTABLE_STATUSES.contains(&response.status_code) {
            self.refresh_upload_state()?;
            return Err(TransferError::http(response.status_code, response.request_url));
        }
        if response.status_code == RESUME_INCOMPLETE {
            let range_header = response
                .header("range")
                .or_else(|| response.header("Range"))
                .ok_or_else(|| {
                    TransferError::TransferInvalid("308 response missing Range header".into())
                })?;
            let last_byte = range::parse_last_byte(range_header)
                .ok_or_else(|| TransferError::TransferInvalid("could not parse Range header".into()))?;
            if last_byte + 1 != end as i64 {
                self.core.stream.seek_to(last_byte.max(0) as u64)?;
            }
        }
        Ok(response)
    }

    /// Sends one chunk starting at `start`. Known total size: the body is
    /// a `StreamSlice` bounded to `min(start+chunksize, total)`. Unknown
    /// total size: reads ahead via `BufferedStream` so EOF mid-chunk can be
    /// detected and folded into `total_size` before sending.
    fn send_chunk(&mut self, start: u64) -> Result<HttpResponseData, TransferError> {
        self.core.ensure_initialized()?;
        let transport = self
            .core
            .bytes_http()
            .cloned()
            .ok_or_else(|| TransferError::User("must provide client or http".into()))?;
        let num_retries = self.core.num_retries();
        let url = self.core.url().unwrap().to_string();
        let mime_type = self.mime_type.clone();

        if let Some(total) = self.total_size {
            let end = (start + self.core.chunksize).min(total);
            let range_value = if end == start {
                format!("bytes */{total}")
            } else {
                format!("bytes {start}-{}/{total}", end - 1)
            };
            trace!(start, end, "sending resumable chunk (known size)");
            let response = {
                let mut slice = StreamSlice::new(&mut self.core.stream, end - start);
                let mut request = HttpRequest::new(Method::PUT, url);
                request
                    .headers
                    .insert(http::header::CONTENT_TYPE, HeaderValue::from_str(&mime_type)?);
                request
                    .headers
                    .insert(http::header::CONTENT_RANGE, HeaderValue::from_str(&range_value)?);
                request.body = Body::Reader(&mut slice);
                transport.execute(&mut request, num_retries)?
            };
            self.finish_chunk_send(response, end)
        } else {
            let mut buffered = BufferedStream::new(&mut self.core.stream, start, self.core.chunksize)?;
            let end = buffered.stream_end_position();
            if buffered.stream_exhausted() {
                self.total_size = Some(end);
            }
            let data = buffered.read(self.core.chunksize as usize);
            let range_value = format!("bytes {start}-{}/*", end as i64 - 1);
            trace!(start, end, "sending resumable chunk (unknown size)");
            let response = {
                let mut request = HttpRequest::new(Method::PUT, url);
                request
                    .headers
                    .insert(http::header::CONTENT_TYPE, HeaderValue::from_str(&mime_type)?);
                request
                    .headers
                    .insert(http::header::CONTENT_RANGE, HeaderValue::from_str(&range_value)?);
                request.loggable_body = Some("<media body>".to_string());
                request.body = Body::Bytes(data);
                transport.execute(&mut request, num_retries)?
            };
            self.finish_chunk_send(response, end)
        }
    }

    /// Sends the entire remaining body in a single request (non-chunked
    /// resumable send path). Requires a known total size.
    fn send_media_body(&mut self, start: u64) -> Result<HttpResponseData, TransferError> {
        self.core.ensure_initialized()?;
        let total = self
            .total_size
            .ok_or_else(|| TransferError::TransferInvalid("total size must be known to send the whole body at once".into()))?;
        let transport = self
            .core
            .bytes_http()
            .cloned()
            .ok_or_else(|| TransferError::User("must provide client or http".into()))?;
        let num_retries = self.core.num_retries();
        let url = self.core.url().unwrap().to_string();
        let mime_type = self.mime_type.clone();

        let range_value = if start == total {
            format!("bytes */{total}")
        } else {
            format!("bytes {start}-{}/{total}", total - 1)
        };
        let response = {
            let mut slice = StreamSlice::new(&mut self.core.stream, total - start);
            let mut request = HttpRequest::new(Method::PUT, url);
            request
                .headers
                .insert(http::header::CONTENT_TYPE, HeaderValue::from_str(&mime_type)?);
            request
                .headers
                .insert(http::header::CONTENT_RANGE, HeaderValue::from_str(&range_value)?);
            request.body = Body::Reader(&mut slice);
            transport.execute(&mut request, num_retries)?
        };
        self.finish_chunk_send(response, total)
    }

    /// Drives the resumable state machine to completion:
    /// `Uninitialized -> Initialized -> (Sending <-> Interrupted) -> Complete`.
    ///
    /// `progress` is tracked as a confirmed byte *count*, so a completed
    /// upload always satisfies `progress == total_size`.
    pub fn stream_file(&mut self, use_chunks: bool) -> Result<Option<HttpResponseData>, TransferError> {
        if self.strategy != Some(Strategy::Resumable) {
            return Err(TransferError::InvalidUserInput(
                "cannot stream a non-resumable upload".into(),
            ));
        }
        if let Some(resp) = self.final_response.take() {
            return Ok(Some(resp));
        }
        if use_chunks {
            self.validate_chunksize(self.core.chunksize)?;
        }
        self.core.ensure_initialized()?;

        let mut last_response = None;
        while !self.complete {
            let start = self.core.stream.tell()?;
            let response = if use_chunks {
                self.send_chunk(start)?
            } else {
                self.send_media_body(start)?
            };
            if response.status_code == 200 || response.status_code == 201 {
                self.complete = true;
                // Match `refresh_upload_state`: a completed upload always
                // reports progress == total_size, even though this response
                // carries no Range header to read it from.
                if let Some(total) = self.total_size {
                    self.progress = total;
                }
                last_response = Some(response);
                break;
            }
            let range_header = response
                .header("range")
                .or_else(|| response.header("Range"))
                .ok_or_else(|| {
                    TransferError::TransferInvalid("308 response missing Range header".into())
                })?
                .to_string();
            let last_byte = range::parse_last_byte(&range_header)
                .ok_or_else(|| TransferError::TransferInvalid("could not parse Range header".into()))?;
            self.progress = (last_byte + 1) as u64;
            let tell = self.core.stream.tell()?;
            if self.progress != tell {
                return Err(TransferError::Communication(format!(
                    "failed to transfer all bytes in chunk, upload paused at byte {}",
                    self.progress
                )));
            }
            last_response = Some(response);
        }

        if self.complete && self.core.stream.is_seekable() {
            let current_pos = self.core.stream.tell()?;
            let end_pos = self.core.stream.seek_to_end()?;
            self.core.stream.seek_to(current_pos)?;
            if current_pos != end_pos {
                return Err(TransferError::TransferInvalid(format!(
                    "upload reported complete with {} bytes left unread in the stream",
                    end_pos - current_pos
                )));
            }
        }
        Ok(last_response)
    }
}

impl Upload<std::fs::File> {
    /// Guesses the MIME type from the extension when `mime_type` is `None`.
    pub fn from_file(path: impl AsRef<Path>, mime_type: Option<String>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TransferError::NotFound(format!(
                "could not find file {}",
                path.display()
            )));
        }
        let mime_type = match mime_type {
            Some(m) => m,
            None => mime_match::guess_mime_from_extension(path).ok_or_else(|| {
                TransferError::InvalidUserInput(format!(
                    "could not guess mime type for {}",
                    path.display()
                ))
            })?,
        };
        let size = std::fs::metadata(path)?.len();
        let file = std::fs::File::open(path)?;
        let mut upload = Upload::new(file, mime_type);
        upload.total_size = Some(size);
        upload.core.close_stream = true;
        Ok(upload)
    }
}

impl<S: Source> fmt::Debug for Upload<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.initialized() {
            write!(f, "Upload (uninitialized)")
        } else {
            write!(
                f,
                "Upload with {}/{} bytes transferred for {:?} object",
                self.progress,
                self.total_size
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                self.mime_type
            )
        }
    }
}

impl<S: Source> Drop for Upload<S> {
    fn drop(&mut self) {
        if self.core.close_stream {
            if let Err(err) = self.core.stream.close() {
                warn!(%err, "failed to close upload source on teardown");
            }
        }
    }
}
