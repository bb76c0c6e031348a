//! In-memory test client.

use crate::error::TestError;
use crate::request::TestRequest;
use crate::response::TestResponse;
use bulwark_middleware::Pipeline;

/// Sends requests through a pipeline without a network.
#[derive(Debug, Clone)]
pub struct TestClient {
    pipeline: Pipeline,
}

impl TestClient {
    /// Creates a client for `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Returns the pipeline under test.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Runs `request` through the full chain and collects the response.
    pub async fn send(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let response = self.pipeline.serve(request.into_http_request()).await;
        TestResponse::from_http(response).await
    }

    /// Sends a GET to `path` from `peer`.
    pub async fn get_from(&self, path: &str, peer: &str) -> Result<TestResponse, TestError> {
        let request = TestRequest::get(path).peer(peer).build()?;
        self.send(request).await
    }
}
