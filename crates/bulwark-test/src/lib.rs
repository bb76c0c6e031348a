//! # Bulwark Test
//!
//! Test utilities for bulwark pipelines. Requests run in memory through the
//! full chain; no sockets are opened.
//!
//! ## Key Features
//!
//! - **Request Builder**: fluent [`TestRequest`] including the transport
//!   peer address
//! - **Client**: [`TestClient`] drives a [`Pipeline`](bulwark_middleware::Pipeline)
//!   and returns a collected [`TestResponse`]
//! - **Failing Doubles**: sinks and counter stores that fail on demand
//! - **Event Capture**: [`EventCapture`] records `tracing` events for
//!   assertions
//!
//! ## Example
//!
//! ```ignore
//! use bulwark_test::{EventCapture, TestClient, TestRequest};
//!
//! #[tokio::test]
//! async fn test_logs_request() {
//!     let events = EventCapture::new();
//!     let _guard = events.install();
//!
//!     let client = TestClient::new(pipeline);
//!     let response = client
//!         .send(TestRequest::get("/orders").peer("10.0.0.1:4000").build().unwrap())
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(response.status(), 200);
//!     assert_eq!(events.with_message("done").len(), 1);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/bulwark-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod doubles;
mod error;
mod events;
mod request;
mod response;

pub use client::TestClient;
pub use doubles::{ExpireFailingStore, FailingCounterStore, FailingSink};
pub use error::TestError;
pub use events::{CapturedEvent, EventCapture};
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
