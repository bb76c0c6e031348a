//! Response sinks and the capture wrapper.
//!
//! Stages and handlers never build a response value. They write into a
//! [`ResponseSink`]: headers first, then a status, then body bytes. The
//! transport owns the real sink; [`BufferedResponse`] is the in-memory one
//! used by [`crate::Pipeline::serve`] and by tests.
//!
//! [`ResponseCapture`] decorates any sink to observe what was written:
//!
//! | Call | Recorded | Forwarded |
//! |------|----------|-----------|
//! | `write_status` | before forwarding, last write wins | always |
//! | `write` | after forwarding, only the accepted byte count | always |
//! | `headers_mut` | nothing | always |

use bytes::BytesMut;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use std::io;

use crate::types::Response;

/// Write capability for an HTTP response.
///
/// Mirrors the usual server-side response writer: header mutation, a status
/// line, and body writes that may be partial or fail.
pub trait ResponseSink: Send {
    /// Returns the response headers.
    fn headers(&self) -> &HeaderMap;

    /// Returns the response headers for mutation.
    ///
    /// Headers must be set before the first status or body write.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the response status.
    fn write_status(&mut self, status: StatusCode);

    /// Writes body bytes, returning how many the sink accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes the whole buffer, retrying partial writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ));
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// A sink that keeps the whole response in memory.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status, or `200 OK` if none was written.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Returns `true` if a status was written explicitly.
    #[must_use]
    pub const fn status_written(&self) -> bool {
        self.status.is_some()
    }

    /// Returns the body written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts into an `http::Response`.
    #[must_use]
    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for BufferedResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// Snapshot of what a [`ResponseCapture`] has observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureState {
    /// Last status written, `200 OK` if none was.
    pub status: StatusCode,

    /// Body bytes confirmed written by the underlying sink.
    pub bytes_written: u64,

    /// Whether a status was written explicitly.
    pub status_written: bool,
}

impl CaptureState {
    /// Returns `true` if anything reached the underlying sink.
    #[must_use]
    pub const fn wrote_anything(&self) -> bool {
        self.status_written || self.bytes_written > 0
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            bytes_written: 0,
            status_written: false,
        }
    }
}

/// Decorates a sink to record status and byte count.
///
/// One capture exists per request per stage that needs it; it borrows the
/// sink exclusively for its lifetime.
pub struct ResponseCapture<'a> {
    inner: &'a mut dyn ResponseSink,
    state: CaptureState,
}

impl<'a> ResponseCapture<'a> {
    /// Wraps `inner`.
    pub fn new(inner: &'a mut dyn ResponseSink) -> Self {
        Self {
            inner,
            state: CaptureState::default(),
        }
    }

    /// Returns what has been observed so far.
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Returns the recorded status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.state.status
    }

    /// Returns the confirmed byte count.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.state.bytes_written
    }
}

impl ResponseSink for ResponseCapture<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.state.status = status;
        self.state.status_written = true;
        self.inner.write_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.state.bytes_written += n as u64;
        Ok(n)
    }
}

impl std::fmt::Debug for ResponseCapture<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCapture")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Accepts at most `chunk` bytes per call and fails after `budget` bytes.
    struct ChunkedSink {
        inner: BufferedResponse,
        chunk: usize,
        budget: usize,
    }

    impl ResponseSink for ChunkedSink {
        fn headers(&self) -> &HeaderMap {
            self.inner.headers()
        }

        fn headers_mut(&mut self) -> &mut HeaderMap {
            self.inner.headers_mut()
        }

        fn write_status(&mut self, status: StatusCode) {
            self.inner.write_status(status);
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            let n = buf.len().min(self.chunk).min(self.budget);
            self.budget -= n;
            self.inner.write(&buf[..n])
        }
    }

    #[test]
    fn test_buffered_defaults_to_ok() {
        let sink = BufferedResponse::new();
        assert_eq!(sink.status(), StatusCode::OK);
        assert!(!sink.status_written());

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_buffered_into_response() {
        let mut sink = BufferedResponse::new();
        sink.headers_mut()
            .insert("x-test", http::HeaderValue::from_static("1"));
        sink.write_status(StatusCode::CREATED);
        sink.write_all(b"hello").unwrap();

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-test").unwrap(), "1");
    }

    #[test]
    fn test_capture_defaults() {
        let mut sink = BufferedResponse::new();
        let capture = ResponseCapture::new(&mut sink);
        assert_eq!(capture.status(), StatusCode::OK);
        assert_eq!(capture.bytes_written(), 0);
        assert!(!capture.state().wrote_anything());
    }

    #[test]
    fn test_capture_status_last_write_wins() {
        let mut sink = BufferedResponse::new();
        let mut capture = ResponseCapture::new(&mut sink);
        capture.write_status(StatusCode::ACCEPTED);
        capture.write_status(StatusCode::NOT_FOUND);
        assert_eq!(capture.status(), StatusCode::NOT_FOUND);
        assert!(capture.state().status_written);
        drop(capture);

        assert_eq!(sink.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_capture_headers_reach_inner_sink() {
        let mut sink = BufferedResponse::new();
        let mut capture = ResponseCapture::new(&mut sink);
        capture
            .headers_mut()
            .insert("x-frame-options", http::HeaderValue::from_static("DENY"));
        assert!(capture.headers().contains_key("x-frame-options"));
        drop(capture);

        assert_eq!(sink.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[test]
    fn test_capture_counts_only_confirmed_bytes() {
        let mut sink = ChunkedSink {
            inner: BufferedResponse::new(),
            chunk: 4,
            budget: 6,
        };
        let mut capture = ResponseCapture::new(&mut sink);

        let err = capture.write_all(b"0123456789").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(capture.bytes_written(), 6);
        drop(capture);

        assert_eq!(sink.inner.body(), b"012345");
    }

    #[test]
    fn test_nested_captures_agree() {
        let mut sink = BufferedResponse::new();
        let mut outer = ResponseCapture::new(&mut sink);
        {
            let mut inner = ResponseCapture::new(&mut outer);
            inner.write_status(StatusCode::IM_A_TEAPOT);
            inner.write_all(b"short and stout").unwrap();
            assert_eq!(inner.bytes_written(), 15);
        }
        assert_eq!(outer.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(outer.bytes_written(), 15);
    }

    proptest! {
        #[test]
        fn prop_capture_matches_writes(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..16),
            status in proptest::option::of(200u16..600),
        ) {
            let mut sink = BufferedResponse::new();
            let mut capture = ResponseCapture::new(&mut sink);

            let expected_status = match status.and_then(|s| StatusCode::from_u16(s).ok()) {
                Some(s) => {
                    capture.write_status(s);
                    s
                }
                None => StatusCode::OK,
            };

            let mut total = 0u64;
            for chunk in &chunks {
                capture.write_all(chunk).unwrap();
                total += chunk.len() as u64;
            }

            prop_assert_eq!(capture.bytes_written(), total);
            prop_assert_eq!(capture.status(), expected_status);
            drop(capture);
            prop_assert_eq!(sink.body().len() as u64, total);
        }
    }
}
