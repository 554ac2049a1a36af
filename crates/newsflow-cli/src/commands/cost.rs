//! `newsflow cost`: Per-step token usage and estimated cost of a run.

use console::style;

use newsflow_core::flow::run_cost;
use newsflow_core::AppState;

pub async fn show(state: &AppState, run_id: &str) -> Result<(), String> {
    let report = run_cost(state, run_id).await.map_err(|e| e.to_string())?;

    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>12}",
        "STEP", "PROMPT", "COMPLETION", "TOTAL", "COST (USD)"
    );
    for step in &report.steps {
        println!(
            "{:<16} {:>10} {:>10} {:>10} {:>12.6}",
            step.step, step.prompt_tokens, step.completion_tokens, step.total_tokens, step.cost
        );
    }
    println!(
        "{}",
        style(format!(
            "{:<16} {:>10} {:>10} {:>10} {:>12.6}",
            "total", "", "", report.total_tokens, report.total_cost
        ))
        .bold()
    );
    Ok(())
}
