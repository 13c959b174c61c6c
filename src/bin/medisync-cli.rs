use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "medisync-cli")]
#[command(about = "Command-line client for the MediSync API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Origin header sent with every request (must match the frontend domain
    /// unless the caller's IP is whitelisted).
    #[arg(short, long)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server liveness
    Health,
    /// List records of a collection
    List {
        collection: String,
        /// Raw query string, e.g. "page=2&limit=5&sort=-createdAt&status=ACTIVE"
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Fetch one record
    Get {
        collection: String,
        id: String,
        /// Raw query string, e.g. "populate=doctor:name|email"
        #[arg(short, long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(origin) = &cli.origin {
        headers.insert(ORIGIN, HeaderValue::from_str(origin)?);
    }

    let url = match &cli.command {
        Commands::Health => format!("{base}/health"),
        Commands::List { collection, query } => with_query(format!("{base}/api/{collection}"), query),
        Commands::Get { collection, id, query } => {
            with_query(format!("{base}/api/{collection}/{id}"), query)
        }
    };

    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

fn with_query(url: String, query: &Option<String>) -> String {
    match query.as_deref().map(|q| q.trim_start_matches('?')) {
        Some(q) if !q.is_empty() => format!("{url}?{q}"),
        _ => url,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if status.is_success() {
        println!("{body}");
    } else {
        eprintln!("Error: API returned status {status}");
        eprintln!("{body}");
    }
    Ok(())
}
