mod utils;
#[allow(unused)]
use utils::*;

use clap::Parser;
use mock_service::Behavior;
use txload_runtime::Cli;

fn scratch(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("txload-e2e-{}-{name}", std::process::id()))
}

/// No pauses and no stats probes so a smoke run finishes immediately.
fn quick_overlay(name: &str) -> std::path::PathBuf {
    let path = scratch(&format!("{name}.json"));
    std::fs::write(
        &path,
        r#"{
            "scenario": {
                "pre_validation_sleep": "0s",
                "think_time": {"kind": "fixed", "duration": "0s"},
                "trailing_sleep": "0s"
            },
            "stats_probability": 0.0
        }"#,
    )
    .unwrap();
    path
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn smoke_run_writes_summary() -> anyhow::Result<()> {
    init();
    let addr = mock(Behavior::default()).await;
    let summary_path = scratch("out").join("load-test-summary.json");
    let overlay = quick_overlay("smoke");

    let cli = Cli::try_parse_from([
        "txload",
        "--smoke",
        "--config",
        overlay.to_str().unwrap(),
        "--summary-path",
        summary_path.to_str().unwrap(),
    ])?;
    txload_runtime::execute(&cli, Some(format!("http://{addr}"))).await?;

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path)?)?;
    assert_eq!(written["name"], "PayFlow MX - Load Test");
    assert_eq!(written["peak_concurrency"], 1);
    assert_eq!(written["metrics"]["successful_validations"]["count"], 1);
    let statuses: Vec<_> = written["thresholds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses.len(), 6);
    assert!(statuses.iter().all(|s| s == "pass"));

    std::fs::remove_dir_all(scratch("out"))?;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn failed_thresholds_still_write_summary() -> anyhow::Result<()> {
    init();
    let addr = mock(Behavior {
        validate_status: 500,
        ..Behavior::default()
    })
    .await;
    let summary_path = scratch("failing").join("summary.json");
    let overlay = quick_overlay("failing");
    let base_url = format!("http://{addr}");

    let cli = Cli::try_parse_from([
        "txload",
        "--smoke",
        "--config",
        overlay.to_str().unwrap(),
        "--summary-path",
        summary_path.to_str().unwrap(),
        "--base-url",
        base_url.as_str(),
    ])?;
    // The CLI flag wins over the environment.
    txload_runtime::execute(&cli, Some("http://127.0.0.1:1".to_string())).await?;

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path)?)?;
    assert_eq!(written["metrics"]["failed_validations"]["count"], 1);
    assert!(written["thresholds"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["status"] == "fail"));

    std::fs::remove_dir_all(scratch("failing"))?;
    Ok(())
}

#[tokio::test]
async fn invalid_base_url_is_an_error() {
    let cli = Cli::try_parse_from(["txload", "--smoke", "--base-url", "ftp://nowhere"]).unwrap();
    assert!(txload_runtime::execute(&cli, None).await.is_err());
}
