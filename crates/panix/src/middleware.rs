//! Axum integration: report panics raised by request handlers.
//!
//! ```ignore
//! let reporter = Arc::new(Reporter::init("staging", Some(config))?);
//! let app = Router::new()
//!     .route("/test", get(handler))
//!     .layer(PanicReportLayer::new(reporter));
//! ```

use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::notifier::ContextMap;
use crate::reporter::Reporter;
use crate::request::RequestContext;

/// Middleware function for use with `axum::middleware::from_fn_with_state`.
pub async fn catch_panic(
    State(reporter): State<Arc<Reporter>>,
    request: Request,
    next: Next,
) -> Response {
    let result = run_guarded(&reporter, request, |request| async move {
        Ok::<_, Infallible>(next.run(request).await)
    })
    .await;

    match result {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Dumps the request, runs the handler under an operation guard and turns a
/// panic into `500 Internal Server Error`.
///
/// A request whose dump fails is still served; a panic in its handler is
/// reported under the generic title with no context.
async fn run_guarded<F, Fut, E>(
    reporter: &Reporter,
    request: Request,
    run: F,
) -> Result<Response, E>
where
    F: FnOnce(Request) -> Fut,
    Fut: Future<Output = Result<Response, E>>,
{
    let (ctx, request) = reporter.extract_title_and_context(request).await;
    let ctx = ctx.unwrap_or_else(|e| {
        warn!(error = %e, "Request dump unavailable, guarding without context");
        RequestContext {
            title: reporter.title(None),
            context: ContextMap::new(),
        }
    });

    match reporter.guard_operation(ctx.title, ctx.context, run(request)).await {
        Some(result) => result,
        None => Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response()),
    }
}

/// Layer reporting handler panics through a shared [`Reporter`].
#[derive(Clone)]
pub struct PanicReportLayer {
    reporter: Arc<Reporter>,
}

impl PanicReportLayer {
    pub fn new(reporter: Arc<Reporter>) -> Self {
        Self { reporter }
    }
}

impl<S> Layer<S> for PanicReportLayer {
    type Service = PanicReportService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PanicReportService {
            inner,
            reporter: self.reporter.clone(),
        }
    }
}

/// Service produced by [`PanicReportLayer`].
#[derive(Clone)]
pub struct PanicReportService<S> {
    inner: S,
    reporter: Arc<Reporter>,
}

impl<S> Service<Request> for PanicReportService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The ready service is the one that must handle this request.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let reporter = self.reporter.clone();

        Box::pin(async move {
            run_guarded(&reporter, request, |request| inner.call(request)).await
        })
    }
}
