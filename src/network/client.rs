use futures::future::BoxFuture;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

use crate::common::EncodedFrame;
use crate::error::{AppError, SubmitError};
use crate::inference::InferenceResult;

pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";
pub const PREDICT_PATH: &str = "/predict";
pub const LATEST_SUMMARY_PATH: &str = "/latest_summary";

/// Request for the most recent server-side summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestSummary;

#[derive(Serialize)]
struct PredictRequest<'a> {
    image: &'a str,
}

/// HTTP client for the inference endpoint.
///
/// One request per call and no retries; the scheduler owns retry timing.
#[derive(Clone, Debug)]
pub struct InferenceClient {
    http: reqwest::Client,
    base: Arc<str>,
}

impl InferenceClient {
    pub fn new(api_base: Option<&str>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::HttpClient(e.to_string()))?;
        Ok(Self::with_http(http, api_base))
    }

    pub fn with_http(http: reqwest::Client, api_base: Option<&str>) -> Self {
        let base = api_base.unwrap_or(DEFAULT_ORIGIN);
        let base = base.strip_suffix('/').unwrap_or(base);
        Self {
            http,
            base: Arc::from(base),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// `POST /predict` with the frame's data URL.
    pub async fn predict(&self, frame: &EncodedFrame) -> Result<InferenceResult, SubmitError> {
        debug!("Submitting frame {}", frame.id());
        let response = self
            .http
            .post(self.url(PREDICT_PATH))
            .json(&PredictRequest {
                image: frame.data_url(),
            })
            .send()
            .await?;
        classify(response.status())?;
        Ok(response.json::<InferenceResult>().await?)
    }

    /// `GET /latest_summary`. The body may be `{}`.
    pub async fn latest_summary(&self) -> Result<InferenceResult, SubmitError> {
        let response = self.http.get(self.url(LATEST_SUMMARY_PATH)).send().await?;
        classify(response.status())?;
        Ok(response.json::<InferenceResult>().await?)
    }
}

fn classify(status: StatusCode) -> Result<(), SubmitError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(SubmitError::RateLimited)
    } else {
        Err(SubmitError::ServerError(status.as_u16()))
    }
}

impl Service<EncodedFrame> for InferenceClient {
    type Response = InferenceResult;
    type Error = SubmitError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: EncodedFrame) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.predict(&frame).await })
    }
}

impl Service<LatestSummary> for InferenceClient {
    type Response = InferenceResult;
    type Error = SubmitError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _request: LatestSummary) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.latest_summary().await })
    }
}
