use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::json;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info};
use txload_core::{Transaction, HEALTH_PATH, STATS_PATH, VALIDATE_PATH};

/// How the fake validation service answers.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Status returned for every validation when not 200.
    pub validate_status: u16,
    /// Mean added latency of a validation.
    pub latency: Duration,
    /// Standard deviation of the added latency.
    pub jitter: Duration,
    /// Fraction of validations answered with a 500.
    pub error_rate: f64,
    /// Validations above this rate are answered with a 500, like a saturated service.
    pub max_rps: Option<NonZeroU32>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            validate_status: 200,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
            error_rate: 0.,
            max_rps: None,
        }
    }
}

struct AppState {
    behavior: Behavior,
    limiter: Option<DefaultDirectRateLimiter>,
    total: AtomicU64,
    valid: AtomicU64,
    invalid: AtomicU64,
}

pub fn router(behavior: Behavior) -> Router {
    let state = Arc::new(AppState {
        limiter: behavior
            .max_rps
            .map(|rps| RateLimiter::direct(Quota::per_second(rps))),
        behavior,
        total: AtomicU64::new(0),
        valid: AtomicU64::new(0),
        invalid: AtomicU64::new(0),
    });

    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(VALIDATE_PATH, post(validate))
        .route(STATS_PATH, get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr, behavior: Behavior) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock validation service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(behavior)).await?;
    Ok(())
}

/// Serve on an ephemeral local port in the background.
pub async fn spawn(behavior: Behavior) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router(behavior)).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    Ok(addr)
}

#[debug_handler]
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "mock-validation" }))
}

#[debug_handler]
async fn validate(
    State(state): State<Arc<AppState>>,
    Json(tx): Json<Transaction>,
) -> Response {
    counter!("mock_service.validations").increment(1);
    state.total.fetch_add(1, Ordering::Relaxed);

    let (delay, inject_error) = {
        let behavior = &state.behavior;
        let mut rng = rand::thread_rng();
        let delay = match Normal::new(
            behavior.latency.as_secs_f64(),
            behavior.jitter.as_secs_f64(),
        ) {
            Ok(normal) => normal.sample(&mut rng).max(0.),
            Err(_) => behavior.latency.as_secs_f64(),
        };
        let inject_error = behavior.error_rate > 0. && rng.gen_bool(behavior.error_rate.min(1.));
        (Duration::from_secs_f64(delay), inject_error)
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let overloaded = state
        .limiter
        .as_ref()
        .is_some_and(|limiter| limiter.check().is_err());
    if overloaded || inject_error {
        debug!("Failing validation of {}", tx.transaction_id);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Validation service unavailable" })),
        )
            .into_response();
    }

    if state.behavior.validate_status != 200 {
        let status = StatusCode::from_u16(state.behavior.validate_status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "detail": "Configured failure" }))).into_response();
    }

    let mut errors = vec![];
    if tx.amount == 0 {
        errors.push("amount must be positive");
    }
    if tx.sender_account == tx.receiver_account {
        errors.push("sender and receiver must differ");
    }
    let is_valid = errors.is_empty();
    if is_valid {
        state.valid.fetch_add(1, Ordering::Relaxed);
    } else {
        state.invalid.fetch_add(1, Ordering::Relaxed);
    }

    Json(json!({
        "transaction_id": tx.transaction_id,
        "is_valid": is_valid,
        "risk_score": if tx.amount > 100_000 { 0.6 } else { 0.1 },
        "errors": errors,
    }))
    .into_response()
}

#[debug_handler]
async fn stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "total_validations": state.total.load(Ordering::Relaxed),
        "valid": state.valid.load(Ordering::Relaxed),
        "invalid": state.invalid.load(Ordering::Relaxed),
    }))
}
