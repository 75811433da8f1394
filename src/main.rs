use anyhow::Result;
use clap::Parser;
use plant_diagnosis::app::App;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "plant-diagnosis")]
#[command(about = "Serve AI plant disease diagnoses over HTTP")]
struct CliArgs {
    /// Listen address, overriding BIND_ADDR (e.g. 127.0.0.1:8080).
    #[arg(long, value_name = "ADDR", value_parser = parse_bind_arg)]
    bind: Option<String>,
}

fn parse_bind_arg(input: &str) -> std::result::Result<String, String> {
    input
        .parse::<std::net::SocketAddr>()
        .map(|addr| addr.to_string())
        .map_err(|_| format!("Invalid address '{}'. Expected format: HOST:PORT", input))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plant_diagnosis=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting plant-diagnosis");

    let args = CliArgs::parse();

    match App::new() {
        Ok(app) => match app.serve(args.bind).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Server failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}
