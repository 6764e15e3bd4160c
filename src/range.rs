//! Pure functions over `(start, end, total_size, chunksize, use_chunks)`
//! for computing and rendering HTTP byte ranges (RFC 7233).
//!
//! `start`/`end` are signed: a negative `start` with no `end` is the HTTP
//! suffix-range sentinel ("last `-start` bytes"), so one signed field can
//! carry both an absolute offset and the suffix-range case. Transfer sizes
//! never approach `i64::MAX` bytes in practice, so this costs nothing over
//! `u64` and keeps the suffix sentinel representable without an `Option`
//! wrapper.

use crate::error::TransferError;

/// Resolve `(start, end)` into a concrete inclusive byte range once
/// `total_size` is known.
pub fn normalize_start_end(
    start: i64,
    end: Option<i64>,
    total_size: u64,
) -> Result<(u64, i64), TransferError> {
    let total_size_i = total_size as i64;
    if let Some(end) = end {
        if start < 0 {
            return Err(TransferError::TransferInvalid(
                "cannot have end index with negative start index".into(),
            ));
        }
        if start >= total_size_i {
            return Err(TransferError::TransferInvalid(
                "cannot have start index greater than total size".into(),
            ));
        }
        let end = end.min(total_size_i - 1);
        if end < start {
            return Err(TransferError::TransferInvalid(format!(
                "range requested with end[{end}] < start[{start}]"
            )));
        }
        Ok((start as u64, end))
    } else {
        let start = if start < 0 {
            (start + total_size_i).max(0)
        } else {
            start
        };
        Ok((start as u64, total_size_i - 1))
    }
}

/// Compute the last byte (inclusive) to request for a chunk starting at
/// `start`.
///
/// May return `None` only when `total_size` is unknown, chunking is
/// disabled, and no explicit `end` was supplied (suffix request case).
pub fn compute_end_byte(
    start: i64,
    end: Option<i64>,
    total_size: Option<u64>,
    chunksize: u64,
    use_chunks: bool,
) -> Option<i64> {
    let mut end_byte = end;

    if start < 0 && total_size.is_none() {
        return end_byte;
    }

    if use_chunks {
        let alternate = start + chunksize as i64 - 1;
        end_byte = Some(match end_byte {
            Some(e) => e.min(alternate),
            None => alternate,
        });
    }

    // A total size of 0 is treated the same as unknown here: a freshly
    // created zero-length object reports Content-Range total 0, and a
    // chunk request against it should still fall back to the chunksize
    // bound rather than clamping to an empty range.
    if let Some(total_size) = total_size {
        if total_size > 0 {
            let alternate = total_size as i64 - 1;
            end_byte = Some(match end_byte {
                Some(e) => e.min(alternate),
                None => alternate,
            });
        }
    }

    end_byte
}

/// Render the `Range` request header value. Mirrors `_set_range_header`.
pub fn set_range_header(start: i64, end: Option<i64>) -> String {
    if start < 0 {
        format!("bytes={start}")
    } else if let Some(end) = end {
        format!("bytes={start}-{end}")
    } else {
        format!("bytes={start}-")
    }
}

/// Parse the `total` suffix of a `Content-Range: bytes <range>/<total>` header
/// value. `*` means "unknown"; absence of any `/` is treated the same way.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    if total == "*" {
        None
    } else {
        total.parse::<u64>().ok()
    }
}

/// Parse the last byte of a (request-header-shaped, but served on a
/// response) `Range: bytes=<start>-<end>` value, as emitted by a resumable
/// upload's 308 response.
pub fn parse_last_byte(value: &str) -> Option<i64> {
    let (_, end) = value.rsplit_once('-')?;
    end.trim().parse::<i64>().ok()
}
