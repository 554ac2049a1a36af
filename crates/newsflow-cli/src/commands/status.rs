//! `newsflow status`: Show where a run stands.

use newsflow_core::flow::run_report;
use newsflow_core::AppState;

use super::print_json;

pub async fn show(state: &AppState, run_id: &str, full: bool) -> Result<(), String> {
    let mut report = run_report(state, run_id).await.map_err(|e| e.to_string())?;
    if !full {
        report.state = None;
    }
    let value = serde_json::to_value(&report).map_err(|e| e.to_string())?;
    print_json(&value);
    Ok(())
}
