//! Common types used throughout the middleware pipeline.

use bytes::Bytes;
use http_body_util::Full;
use std::net::SocketAddr;

/// The HTTP request type used in the middleware pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by [`crate::Pipeline::serve`].
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Transport-level peer address of the connection a request arrived on.
///
/// The transport inserts this as a request extension. It is the last
/// fallback when deriving the client identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddr(pub SocketAddr);

impl PeerAddr {
    /// Returns the wrapped socket address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}
