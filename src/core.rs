//! Shared transfer lifecycle state: initialization guard, retry count,
//! associated transport handle, stream ownership.
//!
//! Modeled as composition rather than inheritance: `Download` and `Upload`
//! each embed a `TransferCore<S>` and have disjoint public operations, so
//! no virtual dispatch is needed.

use std::sync::Arc;

use crate::constants::DEFAULT_NUM_RETRIES;
use crate::error::TransferError;
use crate::transport::HttpTransport;

pub struct TransferCore<S> {
    pub stream: S,
    pub close_stream: bool,
    pub chunksize: u64,
    pub auto_transfer: bool,
    num_retries: u32,
    http: Option<Arc<dyn HttpTransport>>,
    bytes_http: Option<Arc<dyn HttpTransport>>,
    url: Option<String>,
}

impl<S> TransferCore<S> {
    pub fn new(stream: S, chunksize: u64) -> Self {
        TransferCore {
            stream,
            close_stream: false,
            chunksize,
            auto_transfer: true,
            num_retries: DEFAULT_NUM_RETRIES,
            http: None,
            bytes_http: None,
            url: None,
        }
    }

    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    /// Validates the same way the public setter does: the constructor
    /// argument passes through this one path rather than having its own
    /// separate check.
    pub fn set_num_retries(&mut self, value: i64) -> Result<(), TransferError> {
        if value < 0 {
            return Err(TransferError::InvalidData(
                "cannot have negative value for num_retries".into(),
            ));
        }
        self.num_retries = value as u32;
        Ok(())
    }

    pub fn http(&self) -> Option<&Arc<dyn HttpTransport>> {
        self.http.as_ref()
    }

    pub fn bytes_http(&self) -> Option<&Arc<dyn HttpTransport>> {
        self.bytes_http.as_ref().or(self.http.as_ref())
    }

    pub fn set_bytes_http(&mut self, transport: Arc<dyn HttpTransport>) {
        self.bytes_http = Some(transport);
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn initialized(&self) -> bool {
        self.url.is_some() && self.http.is_some()
    }

    pub fn ensure_initialized(&self) -> Result<(), TransferError> {
        if !self.initialized() {
            return Err(TransferError::TransferInvalid(
                "cannot use uninitialized transfer".into(),
            ));
        }
        Ok(())
    }

    pub fn ensure_uninitialized(&self) -> Result<(), TransferError> {
        if self.initialized() {
            return Err(TransferError::TransferInvalid(
                "cannot re-initialize transfer".into(),
            ));
        }
        Ok(())
    }

    /// If a transport was supplied at construction, it is preserved;
    /// otherwise the transport argument here is adopted. `url` and `http`
    /// never change again once set.
    pub fn initialize(
        &mut self,
        http: Option<Arc<dyn HttpTransport>>,
        url: String,
    ) -> Result<(), TransferError> {
        self.ensure_uninitialized()?;
        if self.http.is_none() {
            self.http = http;
        }
        if self.http.is_none() {
            return Err(TransferError::User("must provide client or http".into()));
        }
        self.url = Some(url);
        Ok(())
    }
}
