#![doc = include_str!("../README.md")]

mod error;
pub mod generator;
pub mod metrics;
pub mod report;
pub mod scenario;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::RunError;
pub use generator::TransactionGenerator;
pub use load_test::LoadTest;
pub use self::metrics::{MetricsRecorder, RecordError};
pub use report::{evaluate, render_report, RunReport};
pub use scenario::{IterationOutcome, ScenarioRunner, ValidationOutcome};
pub use scheduler::{concurrency_at, StageScheduler};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport, TransportError};
