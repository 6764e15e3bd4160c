//! In-memory scripted `HttpTransport` shared by the integration test files.

use std::cell::RefCell;
use std::collections::VecDeque;

use gcs_transfer_core::{Body, HttpRequest, HttpResponseData, HttpTransport, TransferError};
use http::HeaderMap;

pub struct ScriptedResponse {
    pub status_code: u16,
    pub content: Vec<u8>,
    pub headers: Vec<(&'static str, String)>,
}

impl ScriptedResponse {
    pub fn new(status_code: u16) -> Self {
        ScriptedResponse {
            status_code,
            content: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

pub struct RecordedRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body_len: Option<usize>,
}

pub struct MockTransport {
    responses: RefCell<VecDeque<ScriptedResponse>>,
    pub requests: RefCell<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        MockTransport {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl HttpTransport for MockTransport {
    fn execute(
        &self,
        request: &mut HttpRequest<'_>,
        _num_retries: u32,
    ) -> Result<HttpResponseData, TransferError> {
        let body_len = match &mut request.body {
            Body::None => None,
            Body::Bytes(b) => Some(b.len()),
            Body::Reader(r) => {
                let mut buf = Vec::new();
                std::io::Read::read_to_end(r, &mut buf).expect("mock transport reads body fully");
                Some(buf.len())
            }
        };
        self.requests.borrow_mut().push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body_len,
        });

        let scripted = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {} {}", request.method, request.url));

        let mut info = HeaderMap::new();
        for (name, value) in &scripted.headers {
            info.insert(
                http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                http::HeaderValue::from_str(value).unwrap(),
            );
        }
        Ok(HttpResponseData {
            status_code: scripted.status_code,
            length: scripted.content.len() as u64,
            content: bytes::Bytes::from(scripted.content),
            info,
            request_url: request.url.clone(),
        })
    }
}
