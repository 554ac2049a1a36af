//! `newsflow run`: Start or resume a pipeline run.

use clap::Args;
use console::style;

use newsflow_core::flow::RunOutcome;
use newsflow_core::models::FlowInputs;
use newsflow_core::{AppState, FlowStep, NewsFlow, RunRequest};

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Run ID. Reusing the id of an unfinished run resumes it.
    #[arg(long)]
    pub run_id: Option<String>,

    /// Discover news about this topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Scrape these news URLs instead of discovering (repeatable)
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// Number of candidate news items to discover
    #[arg(long)]
    pub pool_size: Option<u32>,

    /// Maximum number of news items to research and write about
    #[arg(long)]
    pub max_news: Option<u32>,

    /// Editorial perspective of the articles
    #[arg(long, default_value = "")]
    pub perspective: String,

    /// Tone of the articles
    #[arg(long, default_value = "")]
    pub tone: String,

    /// Reference date for discovery (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<String>,

    /// Article language
    #[arg(long)]
    pub language: Option<String>,

    /// Rewind the progress marker to this step and continue after it
    #[arg(long)]
    pub resume_from: Option<String>,
}

impl RunArgs {
    pub fn into_request(self) -> Result<RunRequest, String> {
        let resume_from = self
            .resume_from
            .as_deref()
            .map(str::parse::<FlowStep>)
            .transpose()
            .map_err(|e| e.to_string())?;

        let defaults = FlowInputs::default();
        let inputs = FlowInputs {
            topic: self.topic.unwrap_or_default(),
            news_urls: self.urls,
            num_starting_pool_news: self.pool_size.unwrap_or(defaults.num_starting_pool_news),
            num_max_news: self.max_news.unwrap_or(defaults.num_max_news),
            perspective: self.perspective,
            tone: self.tone,
            current_date: self.date.unwrap_or(defaults.current_date),
            language: self.language.unwrap_or(defaults.language),
        };

        Ok(RunRequest {
            run_id: self.run_id,
            inputs,
            resume_from,
        })
    }
}

pub async fn run(state: &AppState, args: RunArgs) -> Result<RunOutcome, String> {
    let request = args.into_request()?;
    let flow = NewsFlow::new(state.clone());
    let outcome = flow.kickoff(request).await.map_err(|e| e.to_string())?;
    print_outcome(state, &outcome);
    Ok(outcome)
}

fn print_outcome(state: &AppState, outcome: &RunOutcome) {
    let run = &outcome.state;
    println!("{} Run {}", style("✓").green().bold(), style(&run.id).cyan());

    if outcome.executed.is_empty() {
        println!("  Nothing to do: already completed.");
    } else {
        let steps: Vec<&str> = outcome.executed.iter().map(|s| s.as_str()).collect();
        println!("  Executed: {}", steps.join(" → "));
    }

    let researched = run
        .consolidated
        .as_ref()
        .map(|c| c.news_list.len())
        .unwrap_or(0);
    println!("  News researched: {}", researched);
    println!("  Articles written: {}", run.articles.len());
    println!(
        "  Outputs: {}",
        state.artifacts.for_run(&run.id).base_dir().display()
    );
    println!(
        "  Cost: {} tokens, ~${:.4}",
        outcome.cost.total_tokens, outcome.cost.total_cost
    );
}
