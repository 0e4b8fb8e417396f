mod utils;
#[allow(unused)]
use utils::*;

use mock_service::Behavior;
use std::time::Duration;
use txload::LoadTest;
use txload_core::{metric, RunConfig, Schedule, ThresholdStatus};

#[tokio::test]
#[ntest::timeout(30_000)]
async fn single_iteration_against_healthy_service() {
    init();
    let addr = mock(Behavior::default()).await;

    let report = LoadTest::new(quick_config(addr, Schedule::iterations(1, 1)))
        .unwrap()
        .run()
        .await;

    let summary = &report.summary;
    assert!(report.passed(), "{}", report.render());
    assert_eq!(summary.peak_concurrency, 1);
    assert_eq!(summary.counter(metric::SUCCESSFUL_VALIDATIONS), Some(1));
    assert_eq!(summary.counter(metric::FAILED_VALIDATIONS), Some(0));
    assert_eq!(summary.counter(metric::HTTP_REQS), Some(2));
    assert_eq!(summary.rate(metric::ERRORS), Some(0.));
    assert_eq!(summary.checks["health check is healthy"].passes, 1);
    assert_eq!(summary.checks["validation has transaction_id"].passes, 1);
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn server_errors_fail_thresholds_but_not_the_run() {
    init();
    let addr = mock(Behavior {
        validate_status: 500,
        ..Behavior::default()
    })
    .await;

    let report = LoadTest::new(quick_config(addr, Schedule::iterations(1, 1)))
        .unwrap()
        .run()
        .await;

    assert!(!report.passed());
    assert_eq!(report.summary.counter(metric::FAILED_VALIDATIONS), Some(1));
    assert_eq!(report.summary.rate(metric::ERRORS), Some(1.));
    assert_eq!(report.summary.rate(metric::HTTP_REQ_FAILED), Some(0.5));

    let text = report.render();
    assert!(text.contains("errors rate<0.001: FAIL ✗"));
    assert!(text.contains("Result: FAIL"));
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn stress_profile_tolerates_saturation_errors() {
    init();
    let addr = mock(Behavior {
        validate_status: 500,
        ..Behavior::default()
    })
    .await;

    let mut config = RunConfig::stress_profile();
    config.set_base_url(&format!("http://{addr}")).unwrap();
    config.schedule = Schedule::iterations(2, 3);
    config.scenario = config.scenario.without_pauses();

    let report = LoadTest::new(config).unwrap().run().await;
    let by_metric = |name: &str| {
        report
            .thresholds
            .iter()
            .find(|t| t.metric == name)
            .map(|t| t.status)
    };

    assert_eq!(report.summary.counter(metric::SUCCESSFUL_VALIDATIONS), Some(6));
    assert_eq!(by_metric(metric::ERRORS), Some(ThresholdStatus::Pass));
    assert_eq!(by_metric(metric::HTTP_REQ_FAILED), Some(ThresholdStatus::Fail));
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn unreachable_service_is_reported_not_raised() {
    init();
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let mut config = quick_config(addr, Schedule::iterations(1, 2));
    config.request_timeout = Duration::from_secs(2);
    let report = LoadTest::new(config).unwrap().run().await;

    assert_eq!(report.summary.counter(metric::FAILED_VALIDATIONS), Some(2));
    assert_eq!(report.summary.rate(metric::HTTP_REQ_FAILED), Some(1.));
    assert_eq!(report.summary.checks["health check status 200"].fails, 2);
    // Refused requests are still timed, so the latency thresholds have data to judge.
    assert_eq!(
        report
            .summary
            .trend(metric::VALIDATION_DURATION)
            .map(|t| t.count()),
        Some(2)
    );
    assert!(report
        .thresholds
        .iter()
        .filter(|t| t.metric == metric::VALIDATION_DURATION)
        .all(|t| t.status != ThresholdStatus::Skipped));
    assert!(!report.passed());
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn rps_ceiling_paces_requests() {
    init();
    let addr = mock(Behavior::default()).await;

    let mut config = quick_config(addr, Schedule::iterations(4, 10));
    config.rps = std::num::NonZeroU32::new(40);
    let report = LoadTest::new(config).unwrap().run().await;

    // 80 requests, the first 40 as a burst, the rest at 40 per second.
    assert_eq!(report.summary.counter(metric::HTTP_REQS), Some(80));
    assert!(report.summary.duration >= Duration::from_millis(800));
}

#[cfg(feature = "integration")]
mod integration {
    use super::*;
    use txload_core::Stage;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(60_000)]
    async fn ramps_through_stages_against_slow_service() {
        init();
        let addr = mock(Behavior {
            latency: Duration::from_millis(20),
            jitter: Duration::from_millis(5),
            ..Behavior::default()
        })
        .await;

        let schedule = Schedule::ramping(vec![
            Stage::new(Duration::from_secs(2), 10),
            Stage::new(Duration::from_secs(2), 10),
            Stage::new(Duration::from_secs(2), 0),
        ]);
        let report = LoadTest::new(quick_config(addr, schedule))
            .unwrap()
            .run()
            .await;

        assert!(report.passed(), "{}", report.render());
        assert_eq!(report.summary.peak_concurrency, 10);
        let p95 = report
            .summary
            .trend(metric::VALIDATION_DURATION)
            .and_then(|t| t.percentile(95.))
            .unwrap();
        assert!(p95 >= 15., "p95 {p95}");
    }
}
