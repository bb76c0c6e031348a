//! Test request building.

use crate::error::TestError;
use bulwark_middleware::{PeerAddr, Request};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::Full;
use std::net::SocketAddr;

/// A test request that can be sent to a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Transport peer address, if the request should carry one
    pub peer: Option<SocketAddr>,
    /// Request body
    pub body: Bytes,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Converts this request to a pipeline request.
    ///
    /// The peer address, if any, becomes a [`PeerAddr`] extension.
    pub fn into_http_request(self) -> Request {
        let mut request = http::Request::new(Full::new(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        if let Some(peer) = self.peer {
            request.extensions_mut().insert(PeerAddr(peer));
        }
        request
    }
}

/// Builder for constructing test requests.
///
/// Invalid input is reported by [`TestRequestBuilder::build`].
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    peer: Option<SocketAddr>,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            peer: None,
            body: None,
            error: None,
        }
    }

    /// Sets a header on the request, replacing earlier values.
    ///
    /// ```ignore
    /// let request = TestRequest::get("/orders")
    ///     .header("X-Forwarded-For", "203.0.113.5")
    ///     .header("X-Trace-Id", "abc")
    ///     .build()?;
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = match HeaderName::try_from(name.as_ref()) {
            Ok(name) => name,
            Err(e) => return self.fail(TestError::InvalidHeader(e.to_string())),
        };
        let value = match HeaderValue::try_from(value.as_ref()) {
            Ok(value) => value,
            Err(e) => return self.fail(TestError::InvalidHeader(e.to_string())),
        };
        self.headers.insert(name, value);
        self
    }

    /// Sets the trace id header.
    pub fn trace_id(self, trace_id: impl AsRef<str>) -> Self {
        self.header("x-trace-id", trace_id)
    }

    /// Sets the forwarded-for header.
    pub fn forwarded_for(self, value: impl AsRef<str>) -> Self {
        self.header("x-forwarded-for", value)
    }

    /// Sets the real-ip header.
    pub fn real_ip(self, value: impl AsRef<str>) -> Self {
        self.header("x-real-ip", value)
    }

    /// Sets the transport peer address (e.g. `"10.0.0.1:5000"`).
    pub fn peer(mut self, addr: impl AsRef<str>) -> Self {
        match addr.as_ref().parse() {
            Ok(addr) => self.peer = Some(addr),
            Err(e) => return self.fail(TestError::RequestBuild(format!("Invalid peer: {e}"))),
        }
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builds the test request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            peer: self.peer,
            body: self.body.unwrap_or_default(),
        })
    }

    fn fail(mut self, error: TestError) -> Self {
        self.error.get_or_insert(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_request() {
        let request = TestRequest::get("/users").build().unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.uri.path(), "/users");
        assert!(request.peer.is_none());
    }

    #[test]
    fn test_post_request() {
        let request = TestRequest::post("/users").body("raw").build().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_ref(), b"raw");
    }

    #[test]
    fn test_proxy_headers() {
        let request = TestRequest::get("/")
            .trace_id("t-1")
            .forwarded_for("203.0.113.5")
            .real_ip("192.0.2.1")
            .build()
            .unwrap();

        assert_eq!(request.headers.get("x-trace-id").unwrap(), "t-1");
        assert_eq!(request.headers.get("x-forwarded-for").unwrap(), "203.0.113.5");
        assert_eq!(request.headers.get("x-real-ip").unwrap(), "192.0.2.1");
    }

    #[test]
    fn test_invalid_header_reported_at_build() {
        let result = TestRequest::get("/").header("bad header", "v").build();
        assert!(matches!(result, Err(TestError::InvalidHeader(_))));
    }

    #[test]
    fn test_invalid_peer_reported_at_build() {
        let result = TestRequest::get("/").peer("nowhere").build();
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }

    #[test]
    fn test_into_http_request_carries_peer() {
        let request = TestRequest::delete("/users/1")
            .peer("10.0.0.1:5000")
            .header("X-Test", "value")
            .build()
            .unwrap()
            .into_http_request();

        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.uri().path(), "/users/1");
        assert_eq!(request.headers().get("X-Test").unwrap(), "value");
        assert_eq!(
            request.extensions().get::<PeerAddr>(),
            Some(&PeerAddr("10.0.0.1:5000".parse().unwrap()))
        );
    }
}
