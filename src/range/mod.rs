//! RFC 7233 byte-range parsing and response construction.
//!
//! Only the single-range form is accepted; anything else (no prefix,
//! multiple ranges, non-numeric positions) is treated as "no range" and
//! served in full.
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Parse a `Range` header value against a resource of `size` bytes.
///
/// Returns `None` when the header is absent/malformed (full body should be
/// served), `Some(Err(()))` when the range is syntactically valid but
/// unsatisfiable against `size` (416 should be returned), or
/// `Some(Ok(range))` otherwise.
pub fn parse_range(header: Option<&str>, size: u64) -> Option<Result<ByteRange, ()>> {
    let raw = header?;
    let spec = raw.strip_prefix("bytes=")?;

    // Reject multi-range requests outright (treated as "no range").
    if spec.contains(',') {
        return None;
    }

    let (first, last) = spec.split_once('-')?;

    if first.is_empty() && last.is_empty() {
        return None;
    }

    if first.is_empty() {
        // suffix range: bytes=-N
        let suffix_len: u64 = last.parse().ok()?;
        if size == 0 {
            return Some(Err(()));
        }
        let start = size.saturating_sub(suffix_len);
        return Some(Ok(ByteRange { start, end: size - 1 }));
    }

    let start: u64 = first.parse().ok()?;

    if last.is_empty() {
        // open range: bytes=A-
        if start >= size {
            return Some(Err(()));
        }
        return Some(Ok(ByteRange { start, end: size - 1 }));
    }

    // closed range: bytes=A-B
    let requested_end: u64 = last.parse().ok()?;
    if start > requested_end {
        return Some(Err(()));
    }
    let end = requested_end.min(size.saturating_sub(1));
    if start >= size || start > end {
        return Some(Err(()));
    }
    Some(Ok(ByteRange { start, end }))
}

pub struct StreamerSettings {
    pub content_type: String,
    pub cache_control: String,
}

/// Build the full (200) or partial (206) response for `body`, which must
/// already be sliced to the requested range when one was satisfied.
pub fn build_response(
    range: Option<Result<ByteRange, ()>>,
    size: u64,
    body: Option<Bytes>,
    settings: &StreamerSettings,
) -> HttpResponse {
    match range {
        Some(Err(())) => HttpResponse::build(StatusCode::RANGE_NOT_SATISFIABLE)
            .insert_header(("Content-Range", format!("bytes */{}", size)))
            .insert_header(("Accept-Ranges", "bytes"))
            .finish(),
        Some(Ok(r)) => {
            let mut builder = HttpResponse::build(StatusCode::PARTIAL_CONTENT);
            apply_common_headers(&mut builder, settings);
            builder
                .insert_header((
                    "Content-Range",
                    format!("bytes {}-{}/{}", r.start, r.end, size),
                ))
                .insert_header(("Content-Length", (r.end - r.start + 1).to_string()))
                .body(body.unwrap_or_default())
        }
        None => {
            let mut builder = HttpResponse::Ok();
            apply_common_headers(&mut builder, settings);
            builder
                .insert_header(("Content-Length", size.to_string()))
                .body(body.unwrap_or_default())
        }
    }
}

fn apply_common_headers(builder: &mut HttpResponseBuilder, settings: &StreamerSettings) {
    builder
        .insert_header(("Accept-Ranges", "bytes"))
        .insert_header(("Content-Type", settings.content_type.clone()))
        .insert_header(("Cache-Control", settings.cache_control.clone()));
}
