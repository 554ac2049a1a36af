//! `newsflow runs`: List submitted runs.

use console::style;

use newsflow_core::flow::run_report;
use newsflow_core::AppState;

pub async fn list(state: &AppState) -> Result<(), String> {
    let runs = state.run_store.list().await.map_err(|e| e.to_string())?;
    if runs.is_empty() {
        println!("No runs yet.");
        return Ok(());
    }

    for run in runs {
        let report = run_report(state, &run.run_id)
            .await
            .map_err(|e| e.to_string())?;
        let seed = if run.inputs.has_topic() {
            run.inputs.topic.clone()
        } else {
            format!("{} URL(s)", run.inputs.news_urls.len())
        };
        println!(
            "{}  {:<12} {:<15} {}  {}",
            style(&run.run_id).cyan(),
            report.status,
            report.last_completed_step,
            run.updated_at.format("%Y-%m-%d %H:%M:%S"),
            seed
        );
    }
    Ok(())
}
