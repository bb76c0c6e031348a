//! Ordered middleware pipeline.
//!
//! A [`Pipeline`] composes an ordered list of stages around a terminal
//! [`Handler`]. Index 0 is outermost: requests enter stages in declaration
//! order and unwind in reverse.
//!
//! ```text
//! Request → stage[0] → stage[1] → … → stage[n-1] → Handler
//!                                                     ↓
//!   done  ← stage[0] ← stage[1] ← … ← stage[n-1] ←────┘
//! ```
//!
//! An empty pipeline behaves exactly like its handler.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Handler, Middleware, Next};
use crate::sink::{BufferedResponse, ResponseSink};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, composed chain of stages ending in a handler.
///
/// Construction is the only place ordering is decided; nothing can be
/// inserted or skipped afterwards.
///
/// # Example
///
/// ```ignore
/// use bulwark_middleware::{Pipeline, handler_fn};
/// use bulwark_middleware::stages::{SecurityHeadersMiddleware, TraceMiddleware};
///
/// let pipeline = Pipeline::builder()
///     .stage(SecurityHeadersMiddleware::new())
///     .stage(TraceMiddleware::new())
///     .build(handler_fn(|_ctx, _req, sink| Box::pin(async move {
///         let _ = sink.write_all(b"ok");
///     })));
///
/// let response = pipeline.serve(request).await;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs a request through every stage and the handler.
    ///
    /// This is the transport entry point: the caller supplies the real sink.
    pub async fn process(&self, ctx: RequestContext, request: Request, sink: &mut dyn ResponseSink) {
        self.build_chain().run(ctx, request, sink).await;
    }

    /// Runs a request against an in-memory sink and returns the response.
    pub async fn serve(&self, request: Request) -> Response {
        let mut sink = BufferedResponse::new();
        self.process(RequestContext::new(), request, &mut sink).await;
        sink.into_response()
    }

    /// Builds the continuation chain for one request.
    fn build_chain(&self) -> Next<'_> {
        let mut next = Next::handler(self.handler.as_ref());

        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }

        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// A pipeline is itself a handler, so pipelines nest.
impl Handler for Pipeline {
    fn call<'a>(
        &'a self,
        ctx: RequestContext,
        request: Request,
        sink: &'a mut dyn ResponseSink,
    ) -> BoxFuture<'a, ()> {
        Box::pin(self.process(ctx, request, sink))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage; it will sit inside every stage added before it.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Finishes the pipeline with its terminal handler.
    #[must_use]
    pub fn build<H: Handler>(self, handler: H) -> Pipeline {
        Pipeline {
            stages: self.stages,
            handler: Arc::new(handler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::{BodyExt, Full};
    use proptest::prelude::*;
    use std::sync::Mutex;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        journal: Journal,
    }

    impl Middleware for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: RequestContext,
            request: Request,
            sink: &'a mut dyn ResponseSink,
            next: Next<'a>,
        ) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.journal.lock().unwrap().push(format!("{}-enter", self.name));
                next.run(ctx, request, sink).await;
                self.journal.lock().unwrap().push(format!("{}-exit", self.name));
            })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn name(&self) -> &'static str {
            "short_circuit"
        }

        fn process<'a>(
            &'a self,
            _ctx: RequestContext,
            _request: Request,
            sink: &'a mut dyn ResponseSink,
            _next: Next<'a>,
        ) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                sink.write_status(StatusCode::FORBIDDEN);
            })
        }
    }

    fn recording_handler(journal: Journal) -> impl Handler {
        handler_fn(move |_ctx, _request, sink| {
            let journal = journal.clone();
            Box::pin(async move {
                journal.lock().unwrap().push("H".to_string());
                sink.write_status(StatusCode::OK);
                let _ = sink.write_all(b"handled");
            })
        })
    }

    fn request() -> Request {
        http::Request::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn pipeline_of(names: &[&'static str], journal: &Journal) -> Pipeline {
        names
            .iter()
            .fold(Pipeline::builder(), |builder, &name| {
                builder.stage(Recording {
                    name,
                    journal: journal.clone(),
                })
            })
            .build(recording_handler(journal.clone()))
    }

    #[tokio::test]
    async fn test_enter_and_exit_order() {
        let journal = Journal::default();
        let pipeline = pipeline_of(&["A", "B", "C"], &journal);

        let response = pipeline.serve(request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["A-enter", "B-enter", "C-enter", "H", "C-exit", "B-exit", "A-exit"]
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_the_handler() {
        let journal = Journal::default();
        let pipeline = pipeline_of(&[], &journal);
        assert_eq!(pipeline.stage_count(), 0);

        let response = pipeline.serve(request()).await;
        let body = response.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(body, Bytes::from_static(b"handled"));
        assert_eq!(*journal.lock().unwrap(), vec!["H"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_stages() {
        let journal = Journal::default();
        let pipeline = Pipeline::builder()
            .stage(Recording {
                name: "outer",
                journal: journal.clone(),
            })
            .stage(ShortCircuit)
            .stage(Recording {
                name: "inner",
                journal: journal.clone(),
            })
            .build(recording_handler(journal.clone()));

        let response = pipeline.serve(request()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(*journal.lock().unwrap(), vec!["outer-enter", "outer-exit"]);
    }

    #[tokio::test]
    async fn test_pipelines_nest() {
        let journal = Journal::default();
        let inner = pipeline_of(&["inner"], &journal);
        let outer = Pipeline::builder()
            .stage(Recording {
                name: "outer",
                journal: journal.clone(),
            })
            .build(inner);

        outer.serve(request()).await;
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["outer-enter", "inner-enter", "H", "inner-exit", "outer-exit"]
        );
    }

    #[test]
    fn test_stage_names() {
        let journal = Journal::default();
        let pipeline = pipeline_of(&["x", "y"], &journal);
        assert_eq!(pipeline.stage_names(), vec!["x", "y"]);
        assert_eq!(pipeline.stage_count(), 2);
    }

    const NAMES: [&str; 8] = ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"];

    proptest! {
        #[test]
        fn prop_unwind_mirrors_entry(picks in proptest::collection::vec(0usize..NAMES.len(), 0..8)) {
            let names: Vec<&'static str> = picks.iter().map(|&i| NAMES[i]).collect();
            let journal = Journal::default();
            let pipeline = pipeline_of(&names, &journal);

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(pipeline.serve(request()));

            let mut expected: Vec<String> = names.iter().map(|n| format!("{n}-enter")).collect();
            expected.push("H".to_string());
            expected.extend(names.iter().rev().map(|n| format!("{n}-exit")));

            prop_assert_eq!(journal.lock().unwrap().clone(), expected);
        }
    }
}
