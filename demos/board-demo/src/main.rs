use std::time::Duration;

use serde_json::json;
use tracing::info;

use taskboard_core::{ReportRepository, ReportStore, StoreConfig, TaskStateStore};
use taskboard_model::{Report, ReportType, TaskId, TaskState};
use taskboard_observe::{LoggerConfig, logger_init};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1) Logger
    let cfg = LoggerConfig::default()
        .with_level("info,taskboard_core=debug")
        .with_env_overrides()?;
    logger_init(&cfg)?;
    info!("logger initialized");

    // 2) Stores; short limits so the demo shows evictions
    let config = StoreConfig::default()
        .with_capacity(8)
        .with_max_completed_age(Duration::from_secs(2))
        .with_reap_interval(Duration::from_secs(1));
    let (store, reaper) = TaskStateStore::spawn(config)?;
    let reports = ReportStore::new();
    info!("task store ready");

    // 3) Simulated scans moving through their lifecycle
    let producer = {
        let store = store.clone();
        let reports = reports.clone();
        tokio::spawn(async move {
            for round in 0u32.. {
                let id = TaskId::from(format!("scan-{round}"));
                store.save_all([(id.clone(), TaskState::Running)])?;
                tokio::time::sleep(Duration::from_millis(300)).await;

                let outcome = if round % 5 == 4 {
                    TaskState::Failed
                } else {
                    TaskState::Completed
                };
                store.save_all([(id.clone(), outcome)])?;

                let report = Report::new(ReportType::Metrics, format!("{id} summary"))
                    .with_content(json!({ "round": round }));
                reports.save_report(report)?;
            }
            Ok::<(), taskboard_core::StoreError>(())
        })
    };

    // 4) UI-side polling until Ctrl+C
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    info!("press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let stats = store.stats();
                let report_count = reports.list_reports(Some(&ReportType::Metrics))?.len();
                info!(
                    total = stats.total_tasks,
                    active = stats.active_tasks,
                    completed = stats.completed_tasks,
                    memory_bytes = store.memory_usage_estimate(),
                    reports = report_count,
                    "task board"
                );
            }
        }
    }

    info!("shutting down...");
    producer.abort();
    reaper.shutdown().await?;
    Ok(())
}
