//! `newsflow crews`: List the crews the pipeline delegates to.

use console::style;

use newsflow_core::crew::CrewCatalog;
use newsflow_core::FlowConfig;

pub fn list(config: &FlowConfig) -> Result<(), String> {
    let catalog = CrewCatalog::with_dir(config.crews_dir.as_deref()).map_err(|e| e.to_string())?;

    for crew in catalog.all() {
        let models = crew
            .models
            .clone()
            .unwrap_or_else(|| config.llm.models.clone());
        println!("{} ({})", style(&crew.id).cyan().bold(), crew.name);
        if let Some(description) = &crew.description {
            println!("  {}", description);
        }
        println!("  models: {}", models.join(", "));
    }
    Ok(())
}
