//! `newsflow server`: Start the News Flow HTTP server.

use super::{load_config, GlobalOpts};

pub async fn run(host: String, port: u16, opts: &GlobalOpts) -> Result<(), String> {
    let config = newsflow_server::ServerConfig {
        host: host.clone(),
        port,
        flow: load_config(opts)?,
    };

    println!("Starting News Flow server on {}:{}...", host, port);

    let addr = newsflow_server::start_server(config).await?;
    println!("News Flow server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
