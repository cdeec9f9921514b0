use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{config::load_settings, transport::HttpDataSource, CacheClient};
use shared::domain::StatePath;

#[derive(Parser, Debug)]
struct Cli {
    /// Base URL of the data API; defaults to client.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a dotted path twice; the second call is served from cache.
    Fetch { path: String },
    /// Send a JSON body through the cache to a dotted path.
    Update { path: String, body: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    let source = HttpDataSource::new(&settings)?;
    let client = CacheClient::new(Arc::new(source));

    match cli.command {
        Command::Fetch { path } => {
            let path: StatePath = path.parse()?;
            let first = client.fetch(&path, &path).await;
            let second = client.fetch(&path, &path).await;
            println!("first fetch: {}", render(first));
            println!("second fetch (cached): {}", render(second));
            println!("request state: {:?}", client.request_state(&path));
        }
        Command::Update { path, body } => {
            let path: StatePath = path.parse()?;
            let body = serde_json::from_str(&body)?;
            let result = client.update(&path, &path, body).await;
            println!("result: {}", render(result));
            println!("request state: {:?}", client.request_state(&path));
        }
    }

    Ok(())
}

fn render(value: Option<serde_json::Value>) -> String {
    value.map_or_else(|| "<none>".to_string(), |value| value.to_string())
}
