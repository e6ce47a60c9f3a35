use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Inspect circuit breakers through the proxy's admin API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "BREAKER_ADMIN_URL", default_value = "http://127.0.0.1:8086")]
    url: String,

    #[arg(short, long, env = "BREAKER_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy status and registry occupancy
    Status,
    /// Show the breaker record for one host
    Host {
        /// Host identifier, `hostname[:port]`
        host: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let path = match &cli.command {
        Commands::Status => "/admin/status".to_string(),
        Commands::Host { host } => format!("/admin/hosts/{host}"),
    };

    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        eprintln!("Host is not tracked");
        return Ok(());
    }
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
