//! Protocol-mandated constants for the GCS JSON upload/download dialect:
//! thresholds and status sets fixed by the server, not configurable per call.

/// Default chunk size used for both downloads and resumable upload chunks: 1 MiB.
pub const DEFAULT_CHUNKSIZE: u64 = 1 << 20;

/// Uploads with a known size above this threshold are forced onto the
/// resumable strategy.
pub const RESUMABLE_UPLOAD_THRESHOLD: u64 = 5 << 20;

/// Default number of retries handed to the transport per HTTP exchange.
pub const DEFAULT_NUM_RETRIES: u32 = 5;

/// Statuses a download chunk fetch may return without being an error.
pub const DOWNLOAD_ACCEPTABLE_STATUSES: [u16; 4] = [200, 204, 206, 416];

/// Statuses a resumable upload chunk send may return without being an error.
pub const UPLOAD_ACCEPTABLE_STATUSES: [u16; 3] = [200, 201, 308];

/// HTTP 308, "Resume Incomplete" in the GCS dialect.
pub const RESUME_INCOMPLETE: u16 = 308;
