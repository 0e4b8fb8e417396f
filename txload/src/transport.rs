use crate::metrics::{Counter, MetricsRecorder, Rate, RecordError, Trend};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::CONTENT_TYPE;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};
use txload_core::metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON encoded body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json<T: serde::Serialize>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: Method::Post,
            url: url.into(),
            body: Some(serde_json::to_vec(body)?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Time from sending the request until the whole body was read.
    pub elapsed: Duration,
}

impl HttpResponse {
    /// Body parsed as JSON, `None` if it is not.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Other(String),
}

/// Sends one HTTP request. Implemented over reqwest for real runs and by in-memory fakes
/// in tests.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        let builder = match request.body {
            Some(body) => builder.header(CONTENT_TYPE, "application/json").body(body),
            None => builder,
        };

        let start = Instant::now();
        let res = builder.send().await.map_err(|e| self.classify(e))?;
        let status = res.status().as_u16();
        let body = res.bytes().await.map_err(|e| self.classify(e))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
            elapsed: start.elapsed(),
        })
    }
}

/// Wraps a transport so every request is paced, bounded by the request timeout and
/// accounted in the built-in HTTP metrics. Only answered requests have a duration.
pub(crate) struct Session<T> {
    transport: Arc<T>,
    limiter: Option<DefaultDirectRateLimiter>,
    timeout: Duration,
    reqs: Counter,
    duration: Trend,
    failed: Rate,
}

impl<T: Transport + Sync> Session<T> {
    pub fn new(
        transport: Arc<T>,
        recorder: &MetricsRecorder,
        timeout: Duration,
        rps: Option<NonZeroU32>,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            transport,
            limiter: rps.map(|rps| RateLimiter::direct(Quota::per_second(rps))),
            timeout,
            reqs: recorder.counter(metric::HTTP_REQS)?,
            duration: recorder.trend(metric::HTTP_REQ_DURATION)?,
            failed: recorder.rate(metric::HTTP_REQ_FAILED)?,
        })
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let url = request.url.clone();
        let exchange = Transport::execute(&*self.transport, request);
        let res = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(res) => res,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };

        self.reqs.add(1);
        match &res {
            Ok(response) => {
                self.duration.add_duration(response.elapsed);
                self.failed.add(!(200..400).contains(&response.status));
            }
            Err(err) => {
                self.failed.add(true);
                debug!("Request to {url} failed: {err}");
            }
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};
    use time::OffsetDateTime;

    struct Fixed {
        status: AtomicU16,
        delay: Duration,
    }

    impl Transport for Fixed {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(HttpResponse {
                status: self.status.load(Ordering::Relaxed),
                body: vec![],
                elapsed: self.delay,
            })
        }
    }

    fn session(status: u16, delay: Duration) -> (Session<Fixed>, MetricsRecorder) {
        let recorder = MetricsRecorder::new();
        let transport = Arc::new(Fixed {
            status: AtomicU16::new(status),
            delay,
        });
        let session =
            Session::new(transport, &recorder, Duration::from_secs(1), None).unwrap();
        (session, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn records_builtin_http_metrics() {
        let (session, recorder) = session(200, Duration::from_millis(20));
        session.send(HttpRequest::get("http://x/health")).await.unwrap();
        session.transport.status.store(503, Ordering::Relaxed);
        session.send(HttpRequest::get("http://x/health")).await.unwrap();
        session.transport.status.store(302, Ordering::Relaxed);
        session.send(HttpRequest::get("http://x/health")).await.unwrap();

        let summary =
            recorder.summarize("t", OffsetDateTime::UNIX_EPOCH, Duration::from_secs(1), 1);
        assert_eq!(summary.counter(metric::HTTP_REQS), Some(3));
        assert_eq!(summary.rate(metric::HTTP_REQ_FAILED), Some(1. / 3.));
        let trend = summary.trend(metric::HTTP_REQ_DURATION).unwrap();
        assert_eq!(trend.count(), 3);
        assert_eq!(trend.stats.unwrap().max, 20.);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out() {
        let (session, recorder) = session(200, Duration::from_secs(5));
        let res = session.send(HttpRequest::get("http://x/slow")).await;
        assert_eq!(res.unwrap_err(), TransportError::Timeout(Duration::from_secs(1)));

        let summary =
            recorder.summarize("t", OffsetDateTime::UNIX_EPOCH, Duration::from_secs(1), 1);
        assert_eq!(summary.rate(metric::HTTP_REQ_FAILED), Some(1.));
    }

    #[test]
    fn post_json_encodes_body() {
        let req = HttpRequest::post_json("http://x/api", &serde_json::json!({"a": 1})).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    }
}
