//! `newsflow checkpoints`: Show a run's checkpoint history.

use newsflow_core::AppState;

pub async fn list(state: &AppState, run_id: &str) -> Result<(), String> {
    let checkpoints = state
        .checkpoint_store
        .list(run_id)
        .await
        .map_err(|e| e.to_string())?;
    if checkpoints.is_empty() {
        return Err(format!("No checkpoints for run {}", run_id));
    }

    for cp in checkpoints {
        println!(
            "#{:<6} {:<15} {}",
            cp.id,
            cp.step,
            cp.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
