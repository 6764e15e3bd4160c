//! Error taxonomy for the transfer engine.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A header value built from caller-supplied data (mime type, range
    /// string) contained bytes the `http` crate won't accept.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// MIME mismatch, oversize, missing mime type, non-resumable `stream_file`.
    #[error("invalid input: {0}")]
    InvalidUserInput(String),

    /// Local file absent in `from_file`.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing transport, missing strategy.
    #[error("user error: {0}")]
    User(String),

    /// Chunk size not a multiple of server-imposed granularity.
    #[error("configuration error: chunksize {chunksize} is not a multiple of server granularity {granularity}")]
    Configuration { chunksize: u64, granularity: u64 },

    /// Negative `num_retries`.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Re-initialization, inconsistent range, residual bytes after "complete".
    #[error("transfer invalid: {0}")]
    TransferInvalid(String),

    /// Zero-length mid-stream response; non-{403,404} bad download status.
    #[error("transfer retry: {0}")]
    TransferRetry(String),

    /// Chunk send left the stream pointer out of sync with reported progress.
    #[error("communication error: {0}")]
    Communication(String),

    /// Raw response surfaced verbatim (403/404 in download; unexpected status in upload).
    #[error("HTTP error: status {status} for {url}")]
    Http { status: u16, url: String },
}

impl TransferError {
    pub fn http(status: u16, url: impl Into<String>) -> Self {
        TransferError::Http {
            status,
            url: url.into(),
        }
    }
}
