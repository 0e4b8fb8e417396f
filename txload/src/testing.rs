use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// In-memory stand-in for the transaction validation service.
pub(crate) struct FakeService {
    pub validate_status: u16,
    pub echo_transaction_id: bool,
    pub healthy: bool,
    pub latency: Duration,
    /// Fail every request after `latency` as if the connection was refused.
    pub refuse: bool,
    pub requests: AtomicU64,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            validate_status: 200,
            echo_transaction_id: true,
            healthy: true,
            latency: Duration::ZERO,
            refuse: false,
            requests: AtomicU64::new(0),
        }
    }
}

impl FakeService {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Transport for FakeService {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.refuse {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let path = request
            .url
            .split_once("://")
            .and_then(|(_, rest)| rest.find('/').map(|i| rest[i..].to_string()))
            .unwrap_or_default();

        let (status, body) = match (request.method, path.as_str()) {
            (Method::Get, "/health") => {
                let status = if self.healthy { "healthy" } else { "degraded" };
                (200, serde_json::json!({ "status": status }))
            }
            (Method::Post, "/api/v1/validate") => {
                let sent: serde_json::Value = request
                    .body
                    .as_deref()
                    .and_then(|b| serde_json::from_slice(b).ok())
                    .unwrap_or_default();
                let body = if self.echo_transaction_id {
                    serde_json::json!({
                        "transaction_id": sent["transaction_id"],
                        "is_valid": true,
                    })
                } else {
                    serde_json::json!({ "is_valid": true })
                };
                (self.validate_status, body)
            }
            (Method::Get, "/api/v1/stats") => (200, serde_json::json!({ "total_validations": 1 })),
            _ => (404, serde_json::json!({ "detail": "Not Found" })),
        };

        Ok(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
            elapsed: self.latency,
        })
    }
}
