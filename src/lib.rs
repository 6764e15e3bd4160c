//! A client-side streaming transfer engine for an HTTP-based object storage
//! API compatible with Google Cloud Storage's JSON upload/download protocol.
//!
//! This crate owns the chunking, range/offset arithmetic, resumable-session
//! state machine, and request framing. It does not own connection
//! management, authentication, or retry policy below the single-exchange
//! level; those are supplied by an [`HttpTransport`] implementation the
//! caller provides.

pub mod buffered;
pub mod constants;
pub mod core;
pub mod download;
pub mod error;
pub mod mime_match;
pub mod multipart;
pub mod range;
pub mod slice;
pub mod stream;
pub mod transport;
pub mod upload;

pub use download::Download;
pub use error::TransferError;
pub use stream::{NonSeekable, Sink, Source};
pub use transport::{Body, Client, HttpRequest, HttpResponseData, HttpTransport, UrlBuilder};
pub use upload::{Strategy, Upload, UploadConfig};
