//! News Flow CLI: run, resume and inspect news pipeline runs.
//!
//! Reuses the same core domain logic (newsflow-core) and server bootstrap
//! (newsflow-server) as the HTTP API.

use clap::{Parser, Subcommand};

use newsflow_cli::commands::{self, run::RunArgs, GlobalOpts};

/// News Flow CLI: resumable news research and writing pipeline
#[derive(Parser)]
#[command(name = "newsflow", version, about = "News Flow CLI: resumable news research and writing pipeline")]
pub struct Cli {
    /// Path to the YAML config file (defaults to ./newsflow.yaml when present)
    #[arg(long, env = "NEWSFLOW_CONFIG")]
    config: Option<String>,

    /// Path to the SQLite checkpoint database (overrides the config file)
    #[arg(long, env = "NEWSFLOW_DB_PATH")]
    db: Option<String>,

    /// Directory for step output artifacts (overrides the config file)
    #[arg(long)]
    output_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new run, or resume an existing one by id
    Run(RunArgs),

    /// Show the status report of a run
    Status {
        /// Run ID
        run_id: String,
        /// Include the full checkpointed state
        #[arg(long)]
        full: bool,
    },

    /// List submitted runs, most recently updated first
    Runs,

    /// List the checkpoint history of a run
    Checkpoints {
        /// Run ID
        run_id: String,
    },

    /// Show the per-step token usage and cost of a run
    Cost {
        /// Run ID
        run_id: String,
    },

    /// List the crews the pipeline delegates to
    Crews,

    /// Start the News Flow HTTP server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3210)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env.local first, then .env; variables already set are never overridden.
    for filename in [".env.local", ".env"] {
        let _ = dotenvy::from_filename(filename);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsflow_core=info,newsflow_server=warn,newsflow_cli=info".into()),
        )
        .init();

    let opts = GlobalOpts {
        config: cli.config,
        db: cli.db,
        output_dir: cli.output_dir,
    };

    let result = match cli.command {
        Some(Commands::Run(args)) => {
            let state = commands::init_state(&opts);
            commands::run::run(&state, args).await.map(|_| ())
        }
        Some(Commands::Status { run_id, full }) => {
            let state = commands::init_state(&opts);
            commands::status::show(&state, &run_id, full).await
        }
        Some(Commands::Runs) => {
            let state = commands::init_state(&opts);
            commands::runs::list(&state).await
        }
        Some(Commands::Checkpoints { run_id }) => {
            let state = commands::init_state(&opts);
            commands::checkpoints::list(&state, &run_id).await
        }
        Some(Commands::Cost { run_id }) => {
            let state = commands::init_state(&opts);
            commands::cost::show(&state, &run_id).await
        }
        Some(Commands::Crews) => match commands::load_config(&opts) {
            Ok(config) => commands::crews::list(&config),
            Err(e) => Err(e),
        },
        Some(Commands::Server { host, port }) => commands::server::run(host, port, &opts).await,
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
