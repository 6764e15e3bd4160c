//! External HTTP surface the engine consumes.
//!
//! Everything in this module is a boundary type, not an implementation;
//! the low-level transport (connection management, TLS, auth refresh,
//! transient-error retry policy) is an external collaborator. `http::HeaderMap`
//! is used for response `info` because it is naturally case-insensitive,
//! which matters here since servers are observed returning `Range` with
//! inconsistent casing.

use std::io::Read;

use http::{HeaderMap, Method};

use crate::error::TransferError;

/// The body of an outgoing request. Bodies that must be read from a
/// stream borrow a `dyn Read` for the duration of the call rather than
/// owning a boxed reader, since `Upload`'s stream slices borrow from the
/// transfer's own stream.
pub enum Body<'a> {
    None,
    Bytes(Vec<u8>),
    Reader(&'a mut dyn Read),
}

impl<'a> Body<'a> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::None)
    }
}

pub struct HttpRequest<'a> {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Body<'a>,
    /// Sanitized representation for logs: media bytes are replaced with
    /// the literal `<media body>`.
    pub loggable_body: Option<String>,
}

impl<'a> HttpRequest<'a> {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: Body::None,
            loggable_body: None,
        }
    }
}

pub struct HttpResponseData {
    pub status_code: u16,
    /// Response body. `Bytes` rather than `Vec<u8>` so a transport that
    /// already holds the payload in a refcounted buffer (as most HTTP
    /// client crates do) doesn't need to copy it just to satisfy this type.
    pub content: bytes::Bytes,
    /// Bytes actually written/received for this response.
    /// Usually `content.len()` but kept distinct because a transport may
    /// stream the body directly into the caller's sink instead of
    /// buffering it into `content`.
    pub length: u64,
    pub info: HeaderMap,
    pub request_url: String,
}

impl HttpResponseData {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.info.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The transport the engine delegates request execution to. `num_retries`
/// bounds transport-level retry attempts for a single exchange; the
/// transfer loop itself never retries except via resumable-upload recovery.
pub trait HttpTransport {
    fn execute(
        &self,
        request: &mut HttpRequest<'_>,
        num_retries: u32,
    ) -> Result<HttpResponseData, TransferError>;

    /// Same request, issued with `redirections: 0` semantics. Used only by
    /// `refresh_upload_state`, which must not follow a redirect while
    /// probing resumable session status. Transports that never redirect on
    /// this endpoint can rely on the default.
    fn execute_no_redirect(
        &self,
        request: &mut HttpRequest<'_>,
        num_retries: u32,
    ) -> Result<HttpResponseData, TransferError> {
        self.execute(request, num_retries)
    }
}

/// Mutable URL-under-construction handed to `configure_request`.
#[derive(Debug, Default, Clone)]
pub struct UrlBuilder {
    pub relative_path: Option<String>,
    pub query_params: std::collections::BTreeMap<String, String>,
}

/// Optional API client collaborator. When supplied, it resolves both the
/// initial request URL and any server-returned session URL.
pub trait Client {
    fn http(&self) -> std::sync::Arc<dyn HttpTransport>;
    fn finalize_transfer_url(&self, url: &str) -> String {
        url.to_string()
    }
}
