use futures::future::BoxFuture;
use std::fmt::Display;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tower_layer::Layer;
use tracing::{debug, warn};

/// Logs the round trip of every call made through the wrapped service.
#[derive(Debug, Clone)]
pub struct InstrumentLayer {
    name: &'static str,
}

impl InstrumentLayer {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl<S> Layer<S> for InstrumentLayer {
    type Service = Instrumented<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Instrumented {
            inner,
            name: self.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instrumented<S> {
    inner: S,
    name: &'static str,
}

impl<S, Request> Service<Request> for Instrumented<S>
where
    S: Service<Request>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Display + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let name = self.name;
        let start = Instant::now();
        let future = self.inner.call(request);
        Box::pin(async move {
            let result = future.await;
            let elapsed_ms = start.elapsed().as_millis();
            match &result {
                Ok(_) => debug!("{} completed in {}ms", name, elapsed_ms),
                Err(e) => warn!("{} failed after {}ms: {}", name, elapsed_ms, e),
            }
            result
        })
    }
}
