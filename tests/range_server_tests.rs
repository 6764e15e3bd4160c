//! Exercises the download engine against a real socket, in the style of
//! the range-parsing integration tests elsewhere in the corpus: a small
//! `TcpListener`-backed server on a background thread, and a minimal
//! `HttpTransport` that speaks raw HTTP/1.1 the same way the engine's
//! original host process did before the transport boundary existed here.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use gcs_transfer_core::{Download, HttpRequest, HttpResponseData, HttpTransport, TransferError, UrlBuilder};
use http::HeaderMap;

const BODY: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn spawn_range_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            handle_connection(&mut stream);
        }
    });
    addr
}

fn handle_connection(stream: &mut TcpStream) {
    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).unwrap_or(0);
    if n == 0 {
        return;
    }
    let request = String::from_utf8_lossy(&buf[..n]);
    let (start, end) = request
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("range:"))
        .map(parse_range)
        .unwrap_or((0, BODY.len() - 1));
    let slice = &BODY[start..=end];
    let response = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {start}-{end}/{}\r\nContent-Length: {}\r\n\r\n",
        BODY.len(),
        slice.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(slice);
}

fn parse_range(line: &str) -> (usize, usize) {
    let spec = line.split_once(':').unwrap().1.trim().trim_start_matches("bytes=");
    let mut parts = spec.split('-');
    let start: usize = parts.next().unwrap().parse().unwrap_or(0);
    let end: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(BODY.len() - 1);
    (start, end.min(BODY.len() - 1))
}

/// Speaks just enough HTTP/1.1 to drive the range server above.
struct RawSocketTransport {
    addr: SocketAddr,
}

impl HttpTransport for RawSocketTransport {
    fn execute(
        &self,
        request: &mut HttpRequest<'_>,
        _num_retries: u32,
    ) -> Result<HttpResponseData, TransferError> {
        let mut stream = TcpStream::connect(self.addr)?;
        let mut head = format!("{} / HTTP/1.1\r\nHost: 127.0.0.1\r\n", request.method);
        for (name, value) in request.headers.iter() {
            head.push_str(&format!("{}: {}\r\n", name, value.to_str().unwrap_or("")));
        }
        head.push_str("\r\n");
        stream.write_all(head.as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        let split_at = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map(|i| i + 4)
            .ok_or_else(|| TransferError::Communication("malformed HTTP response".into()))?;
        let header_text = String::from_utf8_lossy(&raw[..split_at]);
        let body = raw[split_at..].to_vec();

        let mut lines = header_text.lines();
        let status_code = lines
            .next()
            .unwrap_or("")
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let mut info = HeaderMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if let (Ok(name), Ok(value)) = (
                    http::HeaderName::from_bytes(name.trim().as_bytes()),
                    http::HeaderValue::from_str(value.trim()),
                ) {
                    info.insert(name, value);
                }
            }
        }

        Ok(HttpResponseData {
            status_code,
            length: body.len() as u64,
            content: bytes::Bytes::from(body),
            info,
            request_url: request.url.clone(),
        })
    }
}

#[test]
fn downloads_a_byte_range_over_a_real_socket() {
    let addr = spawn_range_server();
    let transport: Arc<dyn HttpTransport> = Arc::new(RawSocketTransport { addr });

    let mut download = Download::from_stream(Vec::<u8>::new(), None).with_chunksize(1024);
    let mut request = HttpRequest::new(http::Method::GET, format!("http://{addr}/"));
    let mut url_builder = UrlBuilder::default();
    download.configure_request(&mut request, &mut url_builder);
    download
        .initialize_download(request, Some(transport), None)
        .unwrap();

    assert_eq!(download.get_ref().as_slice(), BODY);
    assert_eq!(download.total_size(), Some(BODY.len() as u64));
}
